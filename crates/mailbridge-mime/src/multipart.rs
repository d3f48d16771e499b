//! Multipart body splitting (RFC 2046 §5.1.1).

use crate::error::{Error, Result};

/// The raw parts of one multipart body.
#[derive(Debug)]
pub struct Multipart<'a> {
    /// Raw bytes of each body part, headers included, in order.
    pub parts: Vec<&'a [u8]>,
    /// Whether the closing `--boundary--` delimiter was seen.
    pub terminated: bool,
}

/// Splits a multipart body on its boundary delimiter.
///
/// The preamble before the first delimiter and the epilogue after the
/// closing delimiter are discarded. The line break preceding a delimiter
/// belongs to the delimiter, not to the part. Trailing whitespace on
/// delimiter lines (transport padding) is tolerated. A body that ends
/// without the closing delimiter keeps its last part, with `terminated`
/// set to false.
///
/// # Errors
///
/// Returns [`Error::InvalidMultipart`] if no delimiter line occurs at all.
pub fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Multipart<'a>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut seen_delimiter = false;
    let mut terminated = false;
    let mut line_start = 0;

    while line_start < body.len() {
        let line_end = body[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |p| line_start + p);
        let line = trim_padding(&body[line_start..line_end]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest == b"--";
            if rest.is_empty() || closing {
                seen_delimiter = true;
                if let Some(start) = current_start.take() {
                    let end = strip_preceding_break(body, start, line_start);
                    parts.push(&body[start..end]);
                }
                if closing {
                    terminated = true;
                    break;
                }
                current_start = Some((line_end + 1).min(body.len()));
            }
        }

        line_start = line_end + 1;
    }

    if !seen_delimiter {
        return Err(Error::InvalidMultipart(format!(
            "no delimiter line for boundary {boundary:?}"
        )));
    }

    if let Some(start) = current_start {
        parts.push(&body[start..]);
    }

    Ok(Multipart { parts, terminated })
}

/// Strips trailing `\r`, spaces and tabs.
fn trim_padding(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b' ' | b'\t'))
        .map_or(0, |p| p + 1);
    &line[..end]
}

/// Returns the end of a part that is followed by a delimiter line at
/// `delimiter_start`, excluding the CRLF (or LF) before the delimiter.
fn strip_preceding_break(body: &[u8], part_start: usize, delimiter_start: usize) -> usize {
    let mut end = delimiter_start;
    if end > part_start && body[end - 1] == b'\n' {
        end -= 1;
        if end > part_start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}
