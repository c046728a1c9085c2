//! Submission-server session tests driven over an in-memory stream

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use push_storage::NotificationStore;
use smtp_relay::{serve_connection, AuthConfig, RelayConfig, RelayService};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

struct Client {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Client {
    async fn connect() -> Self {
        let (client, server) = tokio::io::duplex(4096);

        let relay = Arc::new(RelayService::new(
            RelayConfig {
                enabled: false,
                ..RelayConfig::default()
            },
            Arc::new(NotificationStore::new(8)),
        ));
        let auth = AuthConfig {
            username: "relay-user".to_string(),
            password: "relay-pass".to_string(),
        };
        tokio::spawn(serve_connection(server, relay, "relay.test".to_string(), auth));

        let (read_half, write_half) = tokio::io::split(client);
        let mut session = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        };
        // Greeting
        session.expect("220").await;
        session
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end().to_string()
    }

    async fn expect(&mut self, prefix: &str) -> String {
        let line = self.recv().await;
        assert!(
            line.starts_with(prefix),
            "expected reply starting with {prefix:?}, got {line:?}"
        );
        line
    }

    async fn authenticate(&mut self) {
        let blob = BASE64.encode(b"\0relay-user\0relay-pass");
        self.send(&format!("AUTH PLAIN {blob}")).await;
        self.expect("235").await;
    }
}

#[tokio::test]
async fn greeting_and_ehlo_advertise_capabilities() {
    let mut client = Client::connect().await;

    client.send("EHLO client.example").await;
    client.expect("250-relay.test").await;
    client.expect("250-AUTH PLAIN LOGIN").await;
    client.expect("250-STARTTLS").await;
    client.expect("250 8BITMIME").await;
}

#[tokio::test]
async fn mail_before_auth_is_rejected_with_530() {
    let mut client = Client::connect().await;

    client.send("EHLO client.example").await;
    for _ in 0..4 {
        client.recv().await;
    }

    client.send("MAIL FROM:<a@example.com>").await;
    client.expect("530").await;
}

#[tokio::test]
async fn auth_plain_accepts_valid_credentials() {
    let mut client = Client::connect().await;
    client.authenticate().await;

    client.send("MAIL FROM:<a@example.com>").await;
    client.expect("250").await;
}

#[tokio::test]
async fn auth_plain_rejects_bad_credentials() {
    let mut client = Client::connect().await;

    let blob = BASE64.encode(b"\0relay-user\0wrong");
    client.send(&format!("AUTH PLAIN {blob}")).await;
    client.expect("535").await;
}

#[tokio::test]
async fn auth_login_runs_the_two_challenge_exchange() {
    let mut client = Client::connect().await;

    client.send("AUTH LOGIN").await;
    let challenge = client.expect("334").await;
    assert!(challenge.contains("VXNlcm5hbWU6"));
    client.send(&BASE64.encode("relay-user")).await;
    let challenge = client.expect("334").await;
    assert!(challenge.contains("UGFzc3dvcmQ6"));
    client.send(&BASE64.encode("relay-pass")).await;
    client.expect("235").await;
}

#[tokio::test]
async fn rcpt_before_mail_is_rejected_with_503() {
    let mut client = Client::connect().await;
    client.authenticate().await;

    client.send("RCPT TO:<b@example.com>").await;
    client.expect("503").await;
}

#[tokio::test]
async fn data_before_rcpt_is_rejected_with_503() {
    let mut client = Client::connect().await;
    client.authenticate().await;

    client.send("MAIL FROM:<a@example.com>").await;
    client.expect("250").await;
    client.send("DATA").await;
    client.expect("503").await;
}

#[tokio::test]
async fn data_with_disabled_relay_returns_550() {
    let mut client = Client::connect().await;
    client.authenticate().await;

    client.send("MAIL FROM:<a@example.com>").await;
    client.expect("250").await;
    client.send("RCPT TO:<b@example.com>").await;
    client.expect("250").await;
    client.send("DATA").await;
    client.expect("354").await;

    client.send("Subject: hello").await;
    client.send("").await;
    client.send("body line").await;
    client.send("..leading dot").await;
    client.send(".").await;

    let reply = client.expect("550").await;
    assert!(reply.contains("Relay failed"));
}

#[tokio::test]
async fn rset_clears_the_envelope() {
    let mut client = Client::connect().await;
    client.authenticate().await;

    client.send("MAIL FROM:<a@example.com>").await;
    client.expect("250").await;
    client.send("RSET").await;
    client.expect("250").await;

    // The envelope is gone, so RCPT is out of sequence again.
    client.send("RCPT TO:<b@example.com>").await;
    client.expect("503").await;
}

#[tokio::test]
async fn quit_closes_the_session() {
    let mut client = Client::connect().await;

    client.send("QUIT").await;
    client.expect("221").await;

    // The server side is gone; reads now return EOF.
    let mut line = String::new();
    let read = client.reader.read_line(&mut line).await.unwrap();
    assert_eq!(read, 0);
}

#[tokio::test]
async fn unknown_commands_get_500() {
    let mut client = Client::connect().await;

    client.send("VRFY ops").await;
    client.expect("500").await;
}
