//! Subject and readable body extraction from a raw message.
//!
//! [`decode`] never fails. Every step that cannot be carried out as the
//! message declares falls back to the best content still available and
//! records a [`Degradation`] on the result.

use crate::charset::{Charset, decode_charset};
use crate::content_type::ContentType;
use crate::encoding::decode_rfc2047;
use crate::header::Headers;
use crate::html::{html_to_markdown, strip_style_blocks};
use crate::message::{Part, split_header_body};
use crate::multipart::split_multipart;
use std::fmt;

/// Maximum multipart nesting below the top-level entity.
pub const MAX_NESTING_DEPTH: usize = 8;

/// Maximum number of body parts examined in one message.
pub const MAX_PARTS: usize = 128;

/// The outcome of decoding one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Decoded `Subject` header, empty if absent.
    pub subject: String,
    /// Readable body: Markdown when derived from HTML, plain text otherwise.
    pub body: String,
    /// Every fallback taken while decoding, in the order it happened.
    pub degradations: Vec<Degradation>,
}

impl DecodedMessage {
    /// Returns true if any decoding step fell back.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// A decoding step that could not be completed as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// A header block could not be parsed.
    HeaderParse(String),
    /// The subject carried undecodable encoded words; the raw value is kept.
    SubjectEncoding(String),
    /// A `Content-Type` header could not be parsed.
    ContentType(String),
    /// A multipart entity has no `boundary` parameter.
    MissingBoundary,
    /// A multipart body contains no delimiter line at all.
    MalformedMultipart(String),
    /// A multipart body ended without its closing delimiter.
    UnterminatedMultipart,
    /// A body could not be transfer-decoded; the raw bytes are kept.
    TransferEncoding(String),
    /// A body declared a charset that is not decoded; bytes were read as UTF-8.
    UnsupportedCharset(String),
    /// A body declared as UTF-8 contained invalid sequences.
    InvalidUtf8,
    /// HTML conversion failed; style blocks were stripped from the raw HTML.
    HtmlConversion(String),
    /// Multipart nesting exceeded [`MAX_NESTING_DEPTH`].
    NestingTooDeep,
    /// The message has more than [`MAX_PARTS`] parts.
    TooManyParts,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderParse(e) => write!(f, "header parse failed: {e}"),
            Self::SubjectEncoding(e) => write!(f, "subject decoding failed: {e}"),
            Self::ContentType(e) => write!(f, "content type unparsable: {e}"),
            Self::MissingBoundary => write!(f, "multipart without boundary"),
            Self::MalformedMultipart(e) => write!(f, "multipart unreadable: {e}"),
            Self::UnterminatedMultipart => write!(f, "multipart missing closing delimiter"),
            Self::TransferEncoding(e) => write!(f, "transfer decoding failed: {e}"),
            Self::UnsupportedCharset(label) => write!(f, "unsupported charset {label}"),
            Self::InvalidUtf8 => write!(f, "invalid UTF-8 replaced"),
            Self::HtmlConversion(e) => write!(f, "HTML conversion failed: {e}"),
            Self::NestingTooDeep => write!(f, "multipart nesting too deep"),
            Self::TooManyParts => write!(f, "too many body parts"),
        }
    }
}

/// Decodes a raw RFC 5322 message into a subject and a readable body.
#[must_use]
pub fn decode(raw: &[u8]) -> DecodedMessage {
    let mut degradations = Vec::new();
    let (head, body) = split_header_body(raw);

    let headers = match Headers::parse(&String::from_utf8_lossy(head)) {
        Ok(headers) => headers,
        Err(e) => {
            return DecodedMessage {
                subject: String::new(),
                body: String::from_utf8_lossy(raw).into_owned(),
                degradations: vec![Degradation::HeaderParse(e.to_string())],
            };
        }
    };

    let subject = decode_subject(&headers, &mut degradations);
    let body = extract_body(&Part::new(headers, body.to_vec()), &mut degradations);

    DecodedMessage {
        subject,
        body,
        degradations,
    }
}

fn decode_subject(headers: &Headers, degradations: &mut Vec<Degradation>) -> String {
    let Some(raw) = headers.get("subject") else {
        return String::new();
    };
    match decode_rfc2047(raw) {
        Ok(subject) => subject.trim().to_string(),
        Err(e) => {
            degradations.push(Degradation::SubjectEncoding(e.to_string()));
            raw.trim().to_string()
        }
    }
}

fn extract_body(root: &Part, degradations: &mut Vec<Degradation>) -> String {
    let content_type = match root.content_type() {
        None => return verbatim(&root.body, degradations),
        Some(Err(e)) => {
            degradations.push(Degradation::ContentType(e.to_string()));
            return verbatim(&root.body, degradations);
        }
        Some(Ok(ct)) => ct,
    };

    if !content_type.is_multipart() {
        let text = leaf_text(root, &content_type, degradations);
        return if content_type.is_html() {
            render_html(&text, degradations)
        } else {
            text
        };
    }

    let Some(boundary) = content_type.boundary() else {
        degradations.push(Degradation::MissingBoundary);
        return verbatim(&root.body, degradations);
    };
    if let Err(e) = split_multipart(&root.body, boundary) {
        degradations.push(Degradation::MalformedMultipart(e.to_string()));
        return verbatim(&root.body, degradations);
    }

    let candidates = walk(root.clone(), degradations);
    if let Some(html) = candidates.html {
        let markdown = render_html(&html, degradations);
        if !markdown.trim().is_empty() {
            return markdown;
        }
    }
    candidates.plain.unwrap_or_default()
}

/// First usable HTML and plain-text leaves, in document order.
#[derive(Default)]
struct Candidates {
    html: Option<String>,
    plain: Option<String>,
}

/// Walks a multipart tree depth-first without recursion.
fn walk(root: Part, degradations: &mut Vec<Degradation>) -> Candidates {
    let mut candidates = Candidates::default();
    let mut stack = vec![(root, 0_usize)];
    let mut seen_parts = 0_usize;

    while let Some((part, depth)) = stack.pop() {
        if part.is_attachment() {
            continue;
        }

        let content_type = match part.content_type() {
            None => ContentType::text_plain(),
            Some(Ok(ct)) => ct,
            Some(Err(e)) => {
                degradations.push(Degradation::ContentType(e.to_string()));
                continue;
            }
        };

        if content_type.is_multipart() {
            if depth >= MAX_NESTING_DEPTH {
                degradations.push(Degradation::NestingTooDeep);
                continue;
            }
            let Some(boundary) = content_type.boundary() else {
                degradations.push(Degradation::MissingBoundary);
                continue;
            };
            let multipart = match split_multipart(&part.body, boundary) {
                Ok(multipart) => multipart,
                Err(e) => {
                    degradations.push(Degradation::MalformedMultipart(e.to_string()));
                    continue;
                }
            };
            if !multipart.terminated {
                degradations.push(Degradation::UnterminatedMultipart);
            }

            let mut children = Vec::with_capacity(multipart.parts.len());
            for raw in multipart.parts {
                if seen_parts >= MAX_PARTS {
                    degradations.push(Degradation::TooManyParts);
                    break;
                }
                seen_parts += 1;
                match Part::parse(raw) {
                    Ok(child) => children.push(child),
                    Err(e) => degradations.push(Degradation::HeaderParse(e.to_string())),
                }
            }
            // Reversed so that pops follow document order.
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
            continue;
        }

        if content_type.is_html() && candidates.html.is_none() {
            candidates.html = Some(leaf_text(&part, &content_type, degradations));
        } else if content_type.is_plain_text() && candidates.plain.is_none() {
            candidates.plain = Some(leaf_text(&part, &content_type, degradations));
        }

        if candidates.html.is_some() && candidates.plain.is_some() {
            break;
        }
    }

    candidates
}

/// Transfer-decodes a leaf and interprets it in its declared charset.
fn leaf_text(part: &Part, content_type: &ContentType, degradations: &mut Vec<Degradation>) -> String {
    let bytes = match part.decode_body() {
        Ok(bytes) => bytes,
        Err(e) => {
            degradations.push(Degradation::TransferEncoding(format!(
                "{}: {e}",
                part.transfer_encoding()
            )));
            part.body.clone()
        }
    };

    let charset = Charset::from_label(content_type.charset().unwrap_or("us-ascii"));
    let (text, lossy) = decode_charset(&bytes, &charset);
    if lossy {
        degradations.push(match charset {
            Charset::Unsupported(label) => Degradation::UnsupportedCharset(label),
            Charset::Utf8 | Charset::Latin1 => Degradation::InvalidUtf8,
        });
    }
    text
}

fn verbatim(body: &[u8], degradations: &mut Vec<Degradation>) -> String {
    let (text, lossy) = decode_charset(body, &Charset::Utf8);
    if lossy {
        degradations.push(Degradation::InvalidUtf8);
    }
    text
}

fn render_html(html: &str, degradations: &mut Vec<Degradation>) -> String {
    html_to_markdown(html).unwrap_or_else(|e| {
        degradations.push(Degradation::HtmlConversion(e.to_string()));
        strip_style_blocks(html)
    })
}
