//! Inbound SMTP listener.

use crate::command::Command;
use crate::error::{Error, Result};
use crate::session::{IngestionSession, MessageHandler};
use crate::stream::SmtpStream;
use crate::types::{AuthMechanism, Extension, Reply, ReplyCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Default message size limit (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;
/// Default recipient limit per transaction.
pub const DEFAULT_MAX_RECIPIENTS: usize = 50;
/// Default per-operation read and write timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);
/// Default time in-flight sessions get to finish on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0:2525`.
    pub listen_addr: String,
    /// Domain announced in the greeting and EHLO reply.
    pub domain: String,
    /// Largest accepted message, in bytes.
    pub max_message_bytes: usize,
    /// Most recipients accepted per transaction.
    pub max_recipients: usize,
    /// How long to wait for client input.
    pub read_timeout: Duration,
    /// How long to wait for the client to accept a reply.
    pub write_timeout: Duration,
    /// How long in-flight sessions may run after shutdown is requested.
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new(listen_addr: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            domain: domain.into(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_recipients: DEFAULT_MAX_RECIPIENTS,
            read_timeout: DEFAULT_IO_TIMEOUT,
            write_timeout: DEFAULT_IO_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// SMTP listener running one task per connection.
pub struct Server<H> {
    config: Arc<ServerConfig>,
    handler: Arc<H>,
}

impl<H: MessageHandler + 'static> Server<H> {
    /// Creates a listener that hands every message to `handler`.
    #[must_use]
    pub fn new(config: ServerConfig, handler: Arc<H>) -> Self {
        Self {
            config: Arc::new(config),
            handler,
        }
    }

    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(&self.config.listen_addr).await?)
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Then stops accepting, gives in-flight sessions the configured grace
    /// period, and aborts whatever is still running.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener address cannot be read.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, domain = %self.config.domain, "SMTP listener started");

        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        let connection = Connection::new(
                            stream,
                            peer.to_string(),
                            Arc::clone(&self.config),
                            Arc::clone(&self.handler),
                        );
                        sessions.spawn(connection.run());
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => log_session_end(joined),
            }
        }

        drop(listener);
        if !sessions.is_empty() {
            info!(
                in_flight = sessions.len(),
                grace_ms = u64::try_from(self.config.shutdown_grace.as_millis()).unwrap_or(u64::MAX),
                "waiting for sessions to finish"
            );
        }

        let drained = tokio::time::timeout(self.config.shutdown_grace, async {
            while let Some(joined) = sessions.join_next().await {
                log_session_end(joined);
            }
        })
        .await;
        if drained.is_err() {
            warn!(aborted = sessions.len(), "shutdown grace period elapsed, aborting sessions");
            sessions.shutdown().await;
        }

        info!("SMTP listener stopped");
        Ok(())
    }
}

fn log_session_end(joined: std::result::Result<Result<()>, JoinError>) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "session ended with error"),
        Err(e) if e.is_cancelled() => {}
        Err(e) => warn!(error = %e, "session task failed"),
    }
}

/// Maps a command-level error to its reply.
fn error_reply(error: &Error) -> Reply {
    match error {
        Error::UnknownCommand(_) => Reply::single(ReplyCode::SYNTAX_ERROR, "Command unrecognized"),
        Error::Syntax(message) => Reply::single(ReplyCode::PARAMETER_ERROR, message.clone()),
        Error::UnsupportedMechanism(_) => Reply::single(
            ReplyCode::PARAMETER_NOT_IMPLEMENTED,
            "Unrecognized authentication type",
        ),
        Error::Session(_) => Reply::single(ReplyCode::BAD_SEQUENCE, "Bad sequence of commands"),
        Error::LineTooLong(_) => Reply::single(ReplyCode::SYNTAX_ERROR, "Line too long"),
        Error::MessageTooLarge(_) => Reply::single(
            ReplyCode::EXCEEDED_STORAGE,
            "Message exceeds fixed maximum message size",
        ),
        Error::Io(_) | Error::Timeout(_) => {
            Reply::single(ReplyCode::SERVICE_UNAVAILABLE, "Closing connection")
        }
    }
}

/// One client connection driving one ingestion session.
struct Connection<S, H> {
    stream: SmtpStream<S>,
    session: IngestionSession<H>,
    config: Arc<ServerConfig>,
    peer: String,
    greeted: bool,
    authenticated: bool,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    H: MessageHandler,
{
    fn new(stream: S, peer: String, config: Arc<ServerConfig>, handler: Arc<H>) -> Self {
        Self {
            stream: SmtpStream::new(stream, config.read_timeout, config.write_timeout),
            session: IngestionSession::new(handler),
            config,
            peer,
            greeted: false,
            authenticated: false,
        }
    }

    async fn run(mut self) -> Result<()> {
        let result = self.converse().await;
        if let Err(Error::Timeout(what)) = &result {
            debug!(peer = %self.peer, "timed out while {what}");
            let closing = format!("{} Timeout, closing connection", self.config.domain);
            let _ = self
                .stream
                .write_reply(&Reply::single(ReplyCode::SERVICE_UNAVAILABLE, closing))
                .await;
        }
        let _ = self.stream.shutdown().await;
        debug!(peer = %self.peer, "connection closed");
        result
    }

    async fn converse(&mut self) -> Result<()> {
        let greeting = format!("{} ESMTP mailbridge ready", self.config.domain);
        self.reply(ReplyCode::SERVICE_READY, greeting).await?;

        loop {
            let line = match self.stream.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(()),
                Err(e @ Error::LineTooLong(_)) => {
                    self.stream.write_reply(&error_reply(&e)).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "rejected command");
                    self.stream.write_reply(&error_reply(&e)).await?;
                    continue;
                }
            };

            debug!(peer = %self.peer, verb = command.verb(), "command");
            if !self.execute(command).await? {
                return Ok(());
            }
        }
    }

    /// Runs one command. Returns false once the connection should close.
    async fn execute(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Helo { hostname } => {
                self.greeted = true;
                self.session.reset();
                let text = format!("{} Hello {hostname}", self.config.domain);
                self.reply(ReplyCode::OK, text).await?;
            }
            Command::Ehlo { hostname } => {
                self.greeted = true;
                self.session.reset();
                let lines = vec![
                    format!("{} Hello {hostname}", self.config.domain),
                    Extension::Size(self.config.max_message_bytes).to_string(),
                    Extension::EightBitMime.to_string(),
                    Extension::Auth(vec![AuthMechanism::Plain, AuthMechanism::Login]).to_string(),
                ];
                self.stream
                    .write_reply(&Reply::new(ReplyCode::OK, lines))
                    .await?;
            }
            Command::MailFrom { from, size } => {
                if !self.greeted {
                    self.reply(ReplyCode::BAD_SEQUENCE, "Send HELO/EHLO first").await?;
                } else if size.is_some_and(|s| s > self.config.max_message_bytes) {
                    self.stream
                        .write_reply(&error_reply(&Error::MessageTooLarge(
                            self.config.max_message_bytes,
                        )))
                        .await?;
                } else {
                    match self.session.begin_transaction(from) {
                        Ok(()) => self.reply(ReplyCode::OK, "OK").await?,
                        Err(e) => self.stream.write_reply(&error_reply(&e.into())).await?,
                    }
                }
            }
            Command::RcptTo { to } => {
                if self.session.accepts_body()
                    && self.session.envelope().recipients.len() >= self.config.max_recipients
                {
                    self.reply(ReplyCode::INSUFFICIENT_STORAGE, "Too many recipients")
                        .await?;
                } else {
                    match self.session.add_recipient(to) {
                        Ok(()) => self.reply(ReplyCode::OK, "OK").await?,
                        Err(e) => self.stream.write_reply(&error_reply(&e.into())).await?,
                    }
                }
            }
            Command::Data => self.receive_data().await?,
            Command::Rset => {
                self.session.reset();
                self.reply(ReplyCode::OK, "OK").await?;
            }
            Command::Noop => self.reply(ReplyCode::OK, "OK").await?,
            Command::Vrfy { .. } => {
                self.reply(
                    ReplyCode::CANNOT_VERIFY,
                    "Cannot VRFY user, but will accept message and attempt delivery",
                )
                .await?;
            }
            Command::StartTls => {
                self.reply(ReplyCode::NOT_IMPLEMENTED, "TLS not available").await?;
            }
            Command::Auth {
                mechanism,
                initial_response,
            } => return self.authenticate(mechanism, initial_response).await,
            Command::Quit => {
                let text = format!("{} Service closing transmission channel", self.config.domain);
                self.reply(ReplyCode::CLOSING, text).await?;
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn receive_data(&mut self) -> Result<()> {
        if !self.session.accepts_body() {
            return self.reply(ReplyCode::BAD_SEQUENCE, "Need MAIL command").await;
        }

        self.reply(ReplyCode::START_DATA, "Start mail input; end with <CRLF>.<CRLF>")
            .await?;

        let data = match self.stream.read_data(self.config.max_message_bytes).await {
            Ok(data) => data,
            Err(e @ Error::MessageTooLarge(_)) => {
                warn!(
                    peer = %self.peer,
                    limit = self.config.max_message_bytes,
                    "message rejected: too large"
                );
                self.session.reset();
                return self.stream.write_reply(&error_reply(&e)).await;
            }
            Err(e) => return Err(e),
        };

        debug!(peer = %self.peer, bytes = data.len(), "message received");
        let outcome = self.session.submit_body(data).await?;
        let reply = self.session.reply_for(&outcome);
        self.stream.write_reply(&reply).await
    }

    /// Runs an AUTH exchange. Any credentials are accepted.
    async fn authenticate(
        &mut self,
        mechanism: AuthMechanism,
        initial_response: Option<String>,
    ) -> Result<bool> {
        if self.authenticated {
            self.reply(ReplyCode::BAD_SEQUENCE, "Already authenticated").await?;
            return Ok(true);
        }
        if self.session.accepts_body() {
            self.reply(ReplyCode::BAD_SEQUENCE, "AUTH not permitted during a mail transaction")
                .await?;
            return Ok(true);
        }

        let prompts: &[&str] = match (mechanism, initial_response.is_some()) {
            (AuthMechanism::Plain, true) => &[],
            (AuthMechanism::Plain, false) => &[""],
            (AuthMechanism::Login, true) => &["UGFzc3dvcmQ6"],
            (AuthMechanism::Login, false) => &["VXNlcm5hbWU6", "UGFzc3dvcmQ6"],
        };

        for prompt in prompts {
            self.reply(ReplyCode::AUTH_CONTINUE, *prompt).await?;
            match self.stream.read_line().await? {
                None => return Ok(false),
                Some(answer) if answer.trim() == "*" => {
                    self.reply(ReplyCode::PARAMETER_ERROR, "Authentication cancelled")
                        .await?;
                    return Ok(true);
                }
                Some(_) => {}
            }
        }

        self.authenticated = true;
        debug!(peer = %self.peer, mechanism = mechanism.as_str(), "client authenticated");
        self.reply(ReplyCode::AUTH_SUCCEEDED, "Authentication succeeded")
            .await?;
        Ok(true)
    }

    async fn reply(&mut self, code: ReplyCode, text: impl Into<String>) -> Result<()> {
        self.stream.write_reply(&Reply::single(code, text)).await
    }
}
