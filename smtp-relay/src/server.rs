//! Minimal RFC 5321 submission server
//!
//! Accepts authenticated sessions over TCP, assembles the submitted
//! message, and hands it to the relay core. The per-session handler is
//! generic over the stream so tests can drive it in memory.

use std::io;
use std::sync::Arc;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::relay::{AuthConfig, EmailMessage, RelayConfig, RelayService};

/// The submission server
pub struct SmtpServer {
    config: RelayConfig,
    relay: Arc<RelayService>,
}

impl SmtpServer {
    #[must_use]
    pub const fn new(config: RelayConfig, relay: Arc<RelayService>) -> Self {
        Self { config, relay }
    }

    /// Accepts sessions until the token is cancelled
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind.
    pub async fn run(self, token: CancellationToken) -> anyhow::Result<()> {
        if !self.config.enabled {
            info!("smtp relay server disabled");
            return Ok(());
        }

        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind smtp listener on {addr}"))?;
        info!(%addr, "smtp relay server listening");

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    info!("smtp relay server stopped");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "smtp session accepted");
                            let relay = self.relay.clone();
                            let hostname = self.config.server.host.clone();
                            let auth = self.config.auth.clone();
                            tokio::spawn(async move {
                                if let Err(err) =
                                    serve_connection(stream, relay, hostname, auth).await
                                {
                                    debug!(error = %err, "smtp session ended with error");
                                }
                            });
                        }
                        Err(err) => warn!(error = %err, "failed to accept smtp connection"),
                    }
                }
            }
        }
    }
}

/// Runs one SMTP session over the given stream
///
/// Generic over the transport so tests can exercise the state machine
/// through `tokio::io::duplex`.
///
/// # Errors
///
/// Returns the underlying I/O error when the connection breaks.
pub async fn serve_connection<S>(
    stream: S,
    relay: Arc<RelayService>,
    hostname: String,
    auth: AuthConfig,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut session = Session {
        reader: BufReader::new(read_half),
        writer: write_half,
        relay,
        hostname,
        auth,
        authenticated: false,
        mail_from: None,
        rcpt_to: Vec::new(),
    };
    session.run().await
}

enum Flow {
    Continue,
    Quit,
}

struct Session<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    relay: Arc<RelayService>,
    hostname: String,
    auth: AuthConfig,
    authenticated: bool,
    mail_from: Option<String>,
    rcpt_to: Vec<String>,
}

impl<S: AsyncRead + AsyncWrite> Session<S> {
    async fn run(&mut self) -> io::Result<()> {
        let greeting = format!("220 {} SMTP Relay Server Ready", self.hostname);
        self.reply(&greeting).await?;

        while let Some(line) = self.read_line().await? {
            match self.handle_command(&line).await? {
                Flow::Continue => {}
                Flow::Quit => break,
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, line: &str) -> io::Result<Flow> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(verb) = parts.first() else {
            self.reply("500 Command not recognized").await?;
            return Ok(Flow::Continue);
        };

        match verb.to_ascii_uppercase().as_str() {
            "HELO" | "EHLO" => self.handle_helo(&parts).await?,
            "AUTH" => self.handle_auth(&parts).await?,
            "MAIL" => self.handle_mail(&parts).await?,
            "RCPT" => self.handle_rcpt(&parts).await?,
            "DATA" => self.handle_data().await?,
            "RSET" => {
                self.reset_envelope();
                self.reply("250 OK").await?;
            }
            "QUIT" => {
                self.reply("221 Bye").await?;
                return Ok(Flow::Quit);
            }
            _ => self.reply("500 Command not recognized").await?,
        }
        Ok(Flow::Continue)
    }

    async fn handle_helo(&mut self, parts: &[&str]) -> io::Result<()> {
        if parts.len() < 2 {
            return self.reply("501 Syntax error").await;
        }

        if parts[0].eq_ignore_ascii_case("EHLO") {
            let banner = format!("250-{}", self.hostname);
            self.reply(&banner).await?;
            self.reply("250-AUTH PLAIN LOGIN").await?;
            self.reply("250-STARTTLS").await?;
            self.reply("250 8BITMIME").await
        } else {
            let banner = format!("250 {}", self.hostname);
            self.reply(&banner).await
        }
    }

    async fn handle_auth(&mut self, parts: &[&str]) -> io::Result<()> {
        let Some(mechanism) = parts.get(1) else {
            return self.reply("501 Syntax error").await;
        };

        match mechanism.to_ascii_uppercase().as_str() {
            "PLAIN" => self.handle_auth_plain(parts.get(2).copied()).await,
            "LOGIN" => self.handle_auth_login().await,
            _ => {
                self.reply("504 Authentication mechanism not supported")
                    .await
            }
        }
    }

    async fn handle_auth_plain(&mut self, blob: Option<&str>) -> io::Result<()> {
        let Some(blob) = blob else {
            return self.reply("501 Syntax error").await;
        };

        // The PLAIN blob is base64("authzid\0authcid\0password").
        let Ok(decoded) = BASE64.decode(blob) else {
            return self.reply("535 Authentication failed").await;
        };
        let fields: Vec<&[u8]> = decoded.split(|b| *b == 0).collect();
        if fields.len() != 3 {
            return self.reply("535 Authentication failed").await;
        }

        let username = String::from_utf8_lossy(fields[1]);
        let password = String::from_utf8_lossy(fields[2]);
        self.finish_auth(&username, &password).await
    }

    async fn handle_auth_login(&mut self) -> io::Result<()> {
        // "Username:" in base64
        self.reply("334 VXNlcm5hbWU6").await?;
        let Some(username) = self.read_base64_line().await? else {
            return self.reply("535 Authentication failed").await;
        };

        // "Password:" in base64
        self.reply("334 UGFzc3dvcmQ6").await?;
        let Some(password) = self.read_base64_line().await? else {
            return self.reply("535 Authentication failed").await;
        };

        self.finish_auth(&username, &password).await
    }

    async fn finish_auth(&mut self, username: &str, password: &str) -> io::Result<()> {
        let expected_set = !self.auth.username.is_empty() && !self.auth.password.is_empty();
        if expected_set && username == self.auth.username && password == self.auth.password {
            self.authenticated = true;
            info!(username, "smtp client authenticated");
            self.reply("235 Authentication successful").await
        } else {
            warn!(username, "smtp authentication failed");
            self.reply("535 Authentication failed").await
        }
    }

    async fn handle_mail(&mut self, parts: &[&str]) -> io::Result<()> {
        if !self.authenticated {
            return self.reply("530 Authentication required").await;
        }
        if parts.len() < 2 {
            return self.reply("501 Syntax error").await;
        }

        let argument = parts[1..].join(" ");
        let Some(address) = strip_path_prefix(&argument, "FROM:") else {
            return self.reply("501 Syntax error").await;
        };

        self.mail_from = Some(address);
        self.rcpt_to.clear();
        self.reply("250 OK").await
    }

    async fn handle_rcpt(&mut self, parts: &[&str]) -> io::Result<()> {
        if self.mail_from.is_none() {
            return self.reply("503 Bad sequence of commands").await;
        }
        if parts.len() < 2 {
            return self.reply("501 Syntax error").await;
        }

        let argument = parts[1..].join(" ");
        let Some(address) = strip_path_prefix(&argument, "TO:") else {
            return self.reply("501 Syntax error").await;
        };

        self.rcpt_to.push(address);
        self.reply("250 OK").await
    }

    async fn handle_data(&mut self) -> io::Result<()> {
        if self.rcpt_to.is_empty() {
            return self.reply("503 Bad sequence of commands").await;
        }

        self.reply("354 Start mail input; end with <CRLF>.<CRLF>")
            .await?;

        let mut lines = Vec::new();
        loop {
            let Some(line) = self.read_line().await? else {
                // Connection dropped mid-DATA.
                return Ok(());
            };
            if line == "." {
                break;
            }
            // Undo transparency escaping of leading dots.
            if let Some(stripped) = line.strip_prefix("..") {
                lines.push(format!(".{stripped}"));
            } else {
                lines.push(line);
            }
        }

        let message = assemble_message(&lines, std::mem::take(&mut self.rcpt_to));
        self.mail_from = None;

        match self.relay.send(&message).await {
            Ok(()) => self.reply("250 OK: Message accepted for delivery").await,
            Err(err) => {
                warn!(error = %err, "relay rejected submitted message");
                let line = format!("550 Relay failed: {err}");
                self.reply(&line).await
            }
        }
    }

    fn reset_envelope(&mut self) {
        self.mail_from = None;
        self.rcpt_to.clear();
    }

    async fn read_base64_line(&mut self) -> io::Result<Option<String>> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };
        Ok(BASE64
            .decode(line.trim())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok()))
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    async fn reply(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await
    }
}

/// Strips `FROM:` / `TO:` (case-insensitive) and angle brackets
fn strip_path_prefix(argument: &str, prefix: &str) -> Option<String> {
    let upper = argument.to_ascii_uppercase();
    let rest = if upper.starts_with(prefix) {
        &argument[prefix.len()..]
    } else {
        argument
    };
    let address = rest.trim().trim_start_matches('<').trim_end_matches('>');
    (!address.is_empty()).then(|| address.to_string())
}

/// Parses the accumulated DATA lines into a relayable message
///
/// `Subject:` (case-insensitive) fills the subject; `text/html` anywhere
/// in the header block marks the body as HTML; the body is everything
/// after the first blank line, or the whole payload when no header block
/// is present.
fn assemble_message(lines: &[String], to: Vec<String>) -> EmailMessage {
    let mut subject = "No Subject".to_string();
    let mut is_html = false;

    let header_end = lines.iter().position(String::is_empty);
    let header_count = header_end.unwrap_or(lines.len());

    for line in &lines[..header_count] {
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("subject:") {
            // Preserve the original casing of the value.
            subject = line[line.len() - value.len()..].trim().to_string();
        } else if lower.contains("text/html") {
            is_html = true;
        }
    }

    let body = header_end.map_or_else(
        || lines.join("\n"),
        |end| lines[end + 1..].join("\n"),
    );

    EmailMessage {
        to,
        subject,
        body,
        is_html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn assemble_parses_subject_and_body() {
        let message = assemble_message(
            &lines(&[
                "From: a@example.com",
                "SUBJECT: Weekly Report",
                "",
                "first line",
                "second line",
            ]),
            vec!["ops@example.com".to_string()],
        );

        assert_eq!(message.subject, "Weekly Report");
        assert_eq!(message.body, "first line\nsecond line");
        assert!(!message.is_html);
    }

    #[test]
    fn assemble_detects_html_content_type() {
        let message = assemble_message(
            &lines(&[
                "Subject: hi",
                "Content-Type: text/html; charset=UTF-8",
                "",
                "<p>hello</p>",
            ]),
            vec![],
        );
        assert!(message.is_html);
        assert_eq!(message.body, "<p>hello</p>");
    }

    #[test]
    fn assemble_without_header_block_keeps_everything_as_body() {
        let message = assemble_message(&lines(&["just text", "more text"]), vec![]);
        assert_eq!(message.subject, "No Subject");
        assert_eq!(message.body, "just text\nmore text");
    }

    #[test]
    fn path_prefix_stripping() {
        assert_eq!(
            strip_path_prefix("FROM:<a@example.com>", "FROM:").as_deref(),
            Some("a@example.com")
        );
        assert_eq!(
            strip_path_prefix("to:<b@example.com>", "TO:").as_deref(),
            Some("b@example.com")
        );
        assert_eq!(strip_path_prefix("FROM:<>", "FROM:"), None);
    }
}
