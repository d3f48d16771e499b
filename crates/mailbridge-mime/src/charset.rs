//! Declared-charset decoding.
//!
//! Only UTF-8 (with US-ASCII as its subset) and ISO-8859-1 are decoded
//! exactly. Everything else is reinterpreted as UTF-8 with replacement
//! characters and reported by the caller as a limitation.

/// A charset label resolved to what this crate can do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Charset {
    /// `utf-8`, `us-ascii` and their aliases.
    Utf8,
    /// `iso-8859-1` / `latin1`: every byte maps to the same code point.
    Latin1,
    /// Any other label, lowercased (e.g. `gb2312`, `gbk`, `gb18030`).
    Unsupported(String),
}

impl Charset {
    /// Resolves a charset label (case-insensitive, surrounding quotes and
    /// whitespace ignored).
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().trim_matches('"').to_ascii_lowercase();
        match label.as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" | "ansi_x3.4-1968" => Self::Utf8,
            "iso-8859-1" | "iso8859-1" | "latin1" | "l1" => Self::Latin1,
            _ => Self::Unsupported(label),
        }
    }
}

/// Decodes `bytes` as `charset`.
///
/// Returns the text and whether replacement characters had to be
/// substituted. Unsupported charsets are always reported as lossy since the
/// bytes were not interpreted in their real encoding.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: &Charset) -> (String, bool) {
    match charset {
        Charset::Utf8 => match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (String::from_utf8_lossy(bytes).into_owned(), true),
        },
        Charset::Latin1 => (bytes.iter().map(|&b| char::from(b)).collect(), false),
        Charset::Unsupported(_) => (String::from_utf8_lossy(bytes).into_owned(), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label() {
        assert_eq!(Charset::from_label("UTF-8"), Charset::Utf8);
        assert_eq!(Charset::from_label(" us-ascii "), Charset::Utf8);
        assert_eq!(Charset::from_label("\"utf8\""), Charset::Utf8);
        assert_eq!(Charset::from_label("ISO-8859-1"), Charset::Latin1);
        assert_eq!(
            Charset::from_label("GB2312"),
            Charset::Unsupported("gb2312".to_string())
        );
    }

    #[test]
    fn test_decode_utf8() {
        let (text, lossy) = decode_charset("héllo".as_bytes(), &Charset::Utf8);
        assert_eq!(text, "héllo");
        assert!(!lossy);
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let (text, lossy) = decode_charset(b"ok\xffok", &Charset::Utf8);
        assert_eq!(text, "ok\u{fffd}ok");
        assert!(lossy);
    }

    #[test]
    fn test_decode_latin1() {
        let (text, lossy) = decode_charset(b"caf\xe9", &Charset::Latin1);
        assert_eq!(text, "café");
        assert!(!lossy);
    }

    #[test]
    fn test_decode_unsupported_passes_through() {
        let (text, lossy) = decode_charset(
            b"plain ascii",
            &Charset::Unsupported("gbk".to_string()),
        );
        assert_eq!(text, "plain ascii");
        assert!(lossy);
    }
}
