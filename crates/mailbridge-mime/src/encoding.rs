//! MIME transfer encoding decoders.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 encoded words. The
//! decoders are lenient: soft line breaks, stray whitespace, missing padding
//! and invalid escapes are tolerated.

use crate::charset::{Charset, decode_charset};
use crate::error::{Error, Result};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Standard alphabet, padding optional.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks (`=` at end of line) are removed, literal trailing
/// whitespace before a hard line break is dropped, and malformed escapes are
/// kept literally. Whitespace written as `=20` or `=09` is kept.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    // Start of the run of unescaped spaces and tabs at the end of `result`.
    let mut literal_ws_start: Option<usize> = None;
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'=' => {
                let rest = &data[i + 1..];
                if let Some(skip) = soft_break_len(rest) {
                    i += 1 + skip;
                } else if let (Some(hi), Some(lo)) = (
                    rest.first().and_then(|b| hex_value(*b)),
                    rest.get(1).and_then(|b| hex_value(*b)),
                ) {
                    result.push((hi << 4) | lo);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
                literal_ws_start = None;
            }
            b'\r' | b'\n' => {
                if let Some(start) = literal_ws_start.take() {
                    result.truncate(start);
                }
                result.push(data[i]);
                i += 1;
            }
            byte @ (b' ' | b'\t') => {
                literal_ws_start.get_or_insert(result.len());
                result.push(byte);
                i += 1;
            }
            byte => {
                result.push(byte);
                literal_ws_start = None;
                i += 1;
            }
        }
    }

    result
}

/// Length of a soft line break following `=`: optional transport padding,
/// then CRLF or LF. End of input also counts as a soft break.
fn soft_break_len(rest: &[u8]) -> Option<usize> {
    let padding = rest
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t'))
        .count();
    match &rest[padding..] {
        [] => Some(padding),
        [b'\r', b'\n', ..] => Some(padding + 2),
        [b'\n', ..] => Some(padding + 1),
        _ => None,
    }
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Decodes a header value containing RFC 2047 encoded words.
///
/// Format of each word: `=?charset?encoding?encoded-text?=`. Any number of
/// encoded words may be mixed with plain text; whitespace separating two
/// adjacent encoded words is dropped.
///
/// # Errors
///
/// Returns an error if an encoded word uses an unknown encoding, carries
/// undecodable data, names a charset this crate cannot decode, or does not
/// yield valid text in its declared charset.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut last_was_encoded = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        let Some((decoded, consumed)) = parse_encoded_word(candidate)? else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            last_was_encoded = false;
            continue;
        };

        if !(last_was_encoded && before.chars().all(char::is_whitespace)) {
            out.push_str(before);
        }
        out.push_str(&decoded);
        rest = &candidate[consumed..];
        last_was_encoded = true;
    }

    out.push_str(rest);
    Ok(out)
}

/// Parses one encoded word at the start of `s`.
///
/// Returns `Ok(None)` when `s` does not have encoded-word structure, so the
/// caller can treat it as plain text.
fn parse_encoded_word(s: &str) -> Result<Option<(String, usize)>> {
    let Some(body) = s.strip_prefix("=?") else {
        return Ok(None);
    };
    let Some((charset, after_charset)) = body.split_once('?') else {
        return Ok(None);
    };
    let Some((encoding, after_encoding)) = after_charset.split_once('?') else {
        return Ok(None);
    };
    let Some(end) = after_encoding.find("?=") else {
        return Ok(None);
    };
    let payload = &after_encoding[..end];

    if charset.is_empty()
        || encoding.len() != 1
        || charset.contains(char::is_whitespace)
        || payload.contains(char::is_whitespace)
    {
        return Ok(None);
    }

    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes())?,
        "Q" | "q" => decode_quoted_printable(payload.replace('_', " ").as_bytes()),
        other => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoded-word encoding: {other}"
            )));
        }
    };

    let text = match Charset::from_label(charset) {
        Charset::Unsupported(label) => {
            return Err(Error::InvalidEncoding(format!(
                "Unsupported encoded-word charset: {label}"
            )));
        }
        supported => {
            let (text, lossy) = decode_charset(&bytes, &supported);
            if lossy {
                return Err(Error::InvalidEncoding(format!(
                    "Invalid {charset} data in encoded word"
                )));
            }
            text
        }
    };

    // "=?" + charset + "?" + encoding + "?" + payload + "?="
    let consumed = 2 + body.len() - after_encoding.len() + end + 2;
    Ok(Some((text, consumed)))
}
