//! Loopback tests for the SMTP listener.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use mailbridge_smtp::{Envelope, MessageHandler, Reply, ReplyCode, Server, ServerConfig};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<(Envelope, Vec<u8>)>>,
}

#[async_trait]
impl MessageHandler for Recorder {
    type Outcome = bool;

    async fn deliver(&self, envelope: &Envelope, data: Vec<u8>) -> bool {
        let rejected = data.windows(6).any(|w| w == b"REJECT");
        self.messages.lock().unwrap().push((envelope.clone(), data));
        !rejected
    }

    fn reply_for(&self, outcome: &bool) -> Reply {
        if *outcome {
            Reply::single(ReplyCode::OK, "OK: queued")
        } else {
            Reply::single(ReplyCode::TRANSACTION_FAILED, "Delivery failed")
        }
    }
}

struct Harness {
    addr: SocketAddr,
    recorder: Arc<Recorder>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<mailbridge_smtp::Result<()>>,
}

impl Harness {
    async fn start(configure: impl FnOnce(&mut ServerConfig)) -> Self {
        let mut config = ServerConfig::new("127.0.0.1:0", "bridge.test");
        configure(&mut config);
        let recorder = Arc::new(Recorder::default());
        let server = Server::new(config, Arc::clone(&recorder));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(server.serve(listener, async {
            let _ = stopped.await;
        }));
        Self {
            addr,
            recorder,
            stop: Some(stop),
            task,
        }
    }

    async fn shutdown(mut self) {
        self.stop.take().unwrap().send(()).unwrap();
        self.task.await.unwrap().unwrap();
    }
}

struct SmtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl SmtpClient {
    async fn connect(addr: SocketAddr) -> (Self, Vec<String>) {
        let (read, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut client = Self {
            reader: BufReader::new(read),
            writer,
        };
        let greeting = client.reply().await;
        (client, greeting)
    }

    /// Reads one (possibly multi-line) reply.
    async fn reply(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await.unwrap();
            assert!(n > 0, "connection closed mid-reply");
            let line = line.trim_end().to_string();
            let last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line);
            if last {
                return lines;
            }
        }
    }

    async fn send(&mut self, line: &str) -> Vec<String> {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
        self.reply().await
    }

    async fn code(&mut self, line: &str) -> u16 {
        code_of(&self.send(line).await)
    }

    async fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap_or(0) == 0
    }
}

fn code_of(reply: &[String]) -> u16 {
    reply.last().unwrap()[..3].parse().unwrap()
}

#[tokio::test]
async fn test_full_dialogue() {
    let harness = Harness::start(|_| {}).await;
    let (mut client, greeting) = SmtpClient::connect(harness.addr).await;
    assert_eq!(code_of(&greeting), 220);
    assert!(greeting[0].contains("bridge.test"));

    let ehlo = client.send("EHLO ci.local").await;
    assert_eq!(code_of(&ehlo), 250);
    assert!(ehlo.iter().any(|l| l.ends_with("SIZE 1048576")));
    assert!(ehlo.iter().any(|l| l.ends_with("8BITMIME")));
    assert!(ehlo.iter().any(|l| l.ends_with("AUTH PLAIN LOGIN")));

    assert_eq!(client.code("MAIL FROM:<ci@example.com>").await, 250);
    assert_eq!(client.code("RCPT TO:<alice@example.com>").await, 250);
    assert_eq!(client.code("RCPT TO:<bob@example.com>").await, 250);
    assert_eq!(client.code("DATA").await, 354);
    let reply = client
        .send("Subject: Build\r\n\r\n..dotted\r\nbody\r\n.")
        .await;
    assert_eq!(reply, vec!["250 OK: queued"]);
    assert_eq!(client.code("QUIT").await, 221);
    assert!(client.is_closed().await);

    {
        let messages = harness.recorder.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        let (envelope, data) = &messages[0];
        assert_eq!(envelope.sender, "ci@example.com");
        assert_eq!(envelope.recipients.len(), 2);
        assert_eq!(envelope.recipients[0], "alice@example.com");
        assert_eq!(data, b"Subject: Build\r\n\r\n.dotted\r\nbody\r\n");
    }
    harness.shutdown().await;
}

#[tokio::test]
async fn test_handler_reply_is_forwarded() {
    let harness = Harness::start(|_| {}).await;
    let (mut client, _) = SmtpClient::connect(harness.addr).await;
    client.send("HELO ci").await;
    client.send("MAIL FROM:<a@x>").await;
    client.send("RCPT TO:<b@x>").await;
    client.send("DATA").await;
    assert_eq!(client.code("REJECT me\r\n.").await, 554);

    // A new transaction may start right away.
    assert_eq!(client.code("MAIL FROM:<a@x>").await, 250);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_sequence_errors() {
    let harness = Harness::start(|_| {}).await;
    let (mut client, _) = SmtpClient::connect(harness.addr).await;

    assert_eq!(client.code("MAIL FROM:<a@x>").await, 503);
    client.send("EHLO ci").await;
    assert_eq!(client.code("RCPT TO:<b@x>").await, 503);
    assert_eq!(client.code("DATA").await, 503);
    assert_eq!(client.code("MAIL FROM:<a@x>").await, 250);
    assert_eq!(client.code("MAIL FROM:<a@x>").await, 503);
    assert_eq!(client.code("RSET").await, 250);
    assert_eq!(client.code("DATA").await, 503);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_command_errors() {
    let harness = Harness::start(|_| {}).await;
    let (mut client, _) = SmtpClient::connect(harness.addr).await;

    assert_eq!(client.code("EXPN staff").await, 500);
    assert_eq!(client.code("HELO").await, 501);
    assert_eq!(client.code("AUTH CRAM-MD5").await, 504);
    assert_eq!(client.code("STARTTLS").await, 502);
    assert_eq!(client.code("VRFY bob").await, 252);
    assert_eq!(client.code("NOOP").await, 250);

    let long = "X".repeat(5000);
    assert_eq!(client.code(&long).await, 500);
    assert_eq!(client.code("NOOP").await, 250);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_auth_accepts_any_credentials() {
    let harness = Harness::start(|_| {}).await;
    let (mut client, _) = SmtpClient::connect(harness.addr).await;
    client.send("EHLO ci").await;

    assert_eq!(client.code("AUTH LOGIN").await, 334);
    assert_eq!(client.code("dXNlcg==").await, 334);
    assert_eq!(client.code("cGFzcw==").await, 235);
    assert_eq!(client.code("AUTH PLAIN AHUAcA==").await, 503);

    let (mut other, _) = SmtpClient::connect(harness.addr).await;
    other.send("EHLO ci").await;
    assert_eq!(other.code("AUTH PLAIN").await, 334);
    assert_eq!(other.code("*").await, 501);
    assert_eq!(other.code("AUTH PLAIN AHUAcA==").await, 235);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_recipient_limit() {
    let harness = Harness::start(|config| config.max_recipients = 2).await;
    let (mut client, _) = SmtpClient::connect(harness.addr).await;
    client.send("EHLO ci").await;
    client.send("MAIL FROM:<a@x>").await;

    assert_eq!(client.code("RCPT TO:<1@x>").await, 250);
    assert_eq!(client.code("RCPT TO:<2@x>").await, 250);
    assert_eq!(client.code("RCPT TO:<3@x>").await, 452);
    client.send("DATA").await;
    assert_eq!(client.code("hi\r\n.").await, 250);

    let messages = harness.recorder.messages.lock().unwrap();
    assert_eq!(messages[0].0.recipients, vec!["1@x", "2@x"]);
    drop(messages);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_message_size_limit() {
    let harness = Harness::start(|config| config.max_message_bytes = 64).await;
    let (mut client, _) = SmtpClient::connect(harness.addr).await;
    client.send("EHLO ci").await;

    assert_eq!(client.code("MAIL FROM:<a@x> SIZE=65").await, 552);
    assert_eq!(client.code("MAIL FROM:<a@x>").await, 250);
    client.send("RCPT TO:<b@x>").await;
    client.send("DATA").await;
    let body = format!("{}\r\n.", "y".repeat(100));
    assert_eq!(client.code(&body).await, 552);

    // The transaction was discarded.
    assert_eq!(client.code("DATA").await, 503);
    assert!(harness.recorder.messages.lock().unwrap().is_empty());
    harness.shutdown().await;
}

#[tokio::test]
async fn test_idle_client_times_out() {
    let harness = Harness::start(|config| config.read_timeout = Duration::from_millis(100)).await;
    let (mut client, _) = SmtpClient::connect(harness.addr).await;

    let reply = client.reply().await;
    assert_eq!(code_of(&reply), 421);
    assert!(client.is_closed().await);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_waits_for_sessions_then_aborts() {
    let harness = Harness::start(|config| {
        config.shutdown_grace = Duration::from_millis(200);
        config.read_timeout = Duration::from_secs(30);
    })
    .await;
    let (mut client, _) = SmtpClient::connect(harness.addr).await;
    client.send("EHLO ci").await;

    let addr = harness.addr;
    let started = tokio::time::Instant::now();
    harness.shutdown().await;
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(10));

    assert!(client.is_closed().await);
    assert!(TcpStream::connect(addr).await.is_err());
}
