//! Envelope path arguments of `MAIL FROM` and `RCPT TO`.

use crate::error::{Error, Result};

/// Parses a path argument such as `FROM:<a@example.com> SIZE=123`.
///
/// `keyword` is the part before the colon (`FROM` or `TO`), matched
/// case-insensitively. Returns the path (without angle brackets, possibly
/// empty for the null sender `<>`) and the remaining ESMTP parameters.
/// A bare path without brackets is accepted as well.
///
/// # Errors
///
/// Returns [`Error::Syntax`] if the keyword or colon is missing, or a
/// bracket is unbalanced.
pub fn parse_path<'a>(arg: &'a str, keyword: &str) -> Result<(String, Vec<&'a str>)> {
    let arg = arg.trim_start();
    let Some((prefix, rest)) = arg.split_once(':') else {
        return Err(Error::Syntax(format!("expected {keyword}:<address>")));
    };
    if !prefix.trim().eq_ignore_ascii_case(keyword) {
        return Err(Error::Syntax(format!("expected {keyword}:<address>")));
    }

    let rest = rest.trim_start();
    let (path, params) = if let Some(inner) = rest.strip_prefix('<') {
        let Some(end) = inner.find('>') else {
            return Err(Error::Syntax("unbalanced '<'".to_string()));
        };
        (&inner[..end], &inner[end + 1..])
    } else {
        rest.split_once(char::is_whitespace).unwrap_or((rest, ""))
    };

    if path.contains(['<', '>']) {
        return Err(Error::Syntax(format!("malformed path: {path}")));
    }

    Ok((path.trim().to_string(), params.split_whitespace().collect()))
}

/// Finds the `SIZE=` declaration among ESMTP parameters.
///
/// # Errors
///
/// Returns [`Error::Syntax`] if the value is not a number.
pub fn declared_size(params: &[&str]) -> Result<Option<usize>> {
    for param in params {
        if let Some((name, value)) = param.split_once('=')
            && name.eq_ignore_ascii_case("SIZE")
        {
            return value
                .parse()
                .map(Some)
                .map_err(|_| Error::Syntax(format!("invalid SIZE value: {value}")));
        }
    }
    Ok(None)
}
