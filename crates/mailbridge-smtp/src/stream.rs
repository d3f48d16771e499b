//! Line-oriented SMTP stream with timeouts.

use crate::error::{Error, Result};
use crate::types::Reply;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

/// Longest accepted command line, terminator included (RFC 5321 §4.5.3.1.4
/// allows 512; AUTH initial responses need more).
pub const MAX_COMMAND_LINE: usize = 4096;

/// Read size for message data lines. Longer lines are read in pieces.
const DATA_CHUNK: u64 = 8192;

/// SMTP stream over any async byte transport.
#[derive(Debug)]
pub struct SmtpStream<S> {
    inner: BufReader<S>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SmtpStream<S> {
    /// Wraps a transport.
    pub fn new(stream: S, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            inner: BufReader::new(stream),
            read_timeout,
            write_timeout,
        }
    }

    /// Reads one command line, without its terminator.
    ///
    /// Returns `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LineTooLong`] after discarding the rest of an
    /// overlong line, [`Error::Timeout`] if the peer stays silent past the
    /// read timeout, or an I/O error.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        self.read_limited(&mut buf, MAX_COMMAND_LINE as u64).await?;
        if buf.is_empty() {
            return Ok(None);
        }

        if !buf.ends_with(b"\n") && buf.len() >= MAX_COMMAND_LINE {
            // Skip the remainder of the line.
            loop {
                buf.clear();
                self.read_limited(&mut buf, MAX_COMMAND_LINE as u64).await?;
                if buf.is_empty() || buf.ends_with(b"\n") {
                    break;
                }
            }
            return Err(Error::LineTooLong(MAX_COMMAND_LINE));
        }

        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Reads message data up to the `.` terminator line, undoing dot
    /// stuffing.
    ///
    /// The returned data keeps its line endings; the terminator is not
    /// included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] once the terminator is reached if
    /// the data exceeded `max_bytes`, [`Error::Timeout`] on a stalled peer,
    /// or an I/O error (including end of stream before the terminator).
    pub async fn read_data(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut chunk = Vec::new();
        let mut at_line_start = true;
        let mut too_large = false;

        loop {
            chunk.clear();
            self.read_limited(&mut chunk, DATA_CHUNK).await?;
            if chunk.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "EOF reached within message data",
                )));
            }

            let mut content = chunk.as_slice();
            if at_line_start {
                if content == b".\r\n" || content == b".\n" {
                    break;
                }
                if let Some(unstuffed) = content.strip_prefix(b".") {
                    content = unstuffed;
                }
            }
            at_line_start = chunk.ends_with(b"\n");

            if too_large || data.len() + content.len() > max_bytes {
                too_large = true;
                data.clear();
            } else {
                data.extend_from_slice(content);
            }
        }

        if too_large {
            return Err(Error::MessageTooLarge(max_bytes));
        }
        Ok(data)
    }

    /// Sends a reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the peer does not accept the data in
    /// time, or an I/O error.
    pub async fn write_reply(&mut self, reply: &Reply) -> Result<()> {
        let bytes = reply.serialize();
        let stream = self.inner.get_mut();
        timeout(self.write_timeout, async {
            stream.write_all(&bytes).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout("writing a reply"))??;
        Ok(())
    }

    /// Shuts down the write half.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.get_mut().shutdown().await?;
        Ok(())
    }

    async fn read_limited(&mut self, buf: &mut Vec<u8>, limit: u64) -> Result<usize> {
        let mut limited = (&mut self.inner).take(limit);
        let read = limited.read_until(b'\n', buf);
        let n = timeout(self.read_timeout, read)
            .await
            .map_err(|_| Error::Timeout("waiting for the client"))??;
        Ok(n)
    }
}
