//! SMTP command parsing.

use crate::error::{Error, Result};
use crate::types::{AuthMechanism, declared_size, parse_path};

/// SMTP command received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Initial response (optional, for SASL-IR)
        initial_response: Option<String>,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender path, empty for the null sender
        from: String,
        /// SIZE parameter
        size: Option<usize>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient path
        to: String,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// VRFY - Verify address
    Vrfy {
        /// Address to verify
        address: String,
    },
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Parses a command line (without its line terminator).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] for an unrecognized verb,
    /// [`Error::UnsupportedMechanism`] for an AUTH mechanism that is not
    /// offered, and [`Error::Syntax`] for malformed arguments.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, args) = line
            .split_once(' ')
            .map_or((line, ""), |(verb, args)| (verb, args.trim()));

        match verb.to_ascii_uppercase().as_str() {
            "HELO" => Ok(Self::Helo {
                hostname: required(args, "HELO requires a hostname")?,
            }),
            "EHLO" => Ok(Self::Ehlo {
                hostname: required(args, "EHLO requires a hostname")?,
            }),
            "MAIL" => {
                let (from, params) = parse_path(args, "FROM")?;
                let size = declared_size(&params)?;
                Ok(Self::MailFrom { from, size })
            }
            "RCPT" => {
                let (to, _) = parse_path(args, "TO")?;
                if to.is_empty() {
                    return Err(Error::Syntax("empty recipient".to_string()));
                }
                Ok(Self::RcptTo { to })
            }
            "AUTH" => {
                let mut parts = args.split_whitespace();
                let name = parts
                    .next()
                    .ok_or_else(|| Error::Syntax("AUTH requires a mechanism".to_string()))?;
                let mechanism = AuthMechanism::parse(name)
                    .ok_or_else(|| Error::UnsupportedMechanism(name.to_string()))?;
                Ok(Self::Auth {
                    mechanism,
                    initial_response: parts.next().map(str::to_string),
                })
            }
            "VRFY" => Ok(Self::Vrfy {
                address: required(args, "VRFY requires an address")?,
            }),
            "DATA" => Ok(Self::Data),
            "RSET" => Ok(Self::Rset),
            "NOOP" => Ok(Self::Noop),
            "QUIT" => Ok(Self::Quit),
            "STARTTLS" => Ok(Self::StartTls),
            _ => Err(Error::UnknownCommand(verb.to_string())),
        }
    }

    /// Returns the command verb.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Vrfy { .. } => "VRFY",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }
}

fn required(args: &str, message: &str) -> Result<String> {
    if args.is_empty() {
        Err(Error::Syntax(message.to_string()))
    } else {
        Ok(args.to_string())
    }
}
