//! Account-rotation relay core
//!
//! Picks a random enabled upstream account and falls over to the next on
//! failure until the pool or the retry budget is exhausted. Exhaustion
//! records a system notification so the failure is never silent.

use std::sync::Arc;

use common_types::{MessageContent, MessageType, PushRequest, Strategy, Style};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use push_storage::NotificationStore;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Relay configuration, loaded from the `smtp_relay` config section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    /// Whether the relay (and its submission server) runs at all
    #[serde(default)]
    pub enabled: bool,
    /// Attempt budget per message; `0` means "try the whole pool"
    #[serde(default)]
    pub max_retries: usize,
    /// Submission server listen address
    #[serde(default)]
    pub server: ListenConfig,
    /// Credentials the submission server requires from clients
    #[serde(default)]
    pub auth: AuthConfig,
    /// Upstream account pool
    #[serde(default)]
    pub accounts: Vec<SmtpAccount>,
}

/// Listen address for the submission server
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen_host")]
    pub host: String,
    #[serde(default = "default_listen_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_listen_host(),
            port: default_listen_port(),
        }
    }
}

fn default_listen_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_listen_port() -> u16 {
    2525
}

/// Client credentials accepted by the submission server
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// One upstream SMTP credential set
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpAccount {
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub enabled: bool,
}

const fn default_smtp_port() -> u16 {
    587
}

/// An assembled mail ready for relaying
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

/// Relay failure modes
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The relay is switched off in configuration
    #[error("smtp relay is disabled")]
    Disabled,
    /// The enabled-account pool is empty
    #[error("no smtp accounts available")]
    NoAccounts,
    /// A mail address failed to parse
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    /// The message could not be assembled
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    /// The SMTP transport failed
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    /// Every attempted account failed
    #[error("all smtp accounts failed, last error: {0}")]
    Exhausted(String),
}

/// Point-in-time view of the relay for the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatistics {
    pub enabled: bool,
    pub total_accounts: usize,
    pub available_accounts: usize,
    pub max_retries: usize,
    pub accounts: Vec<AccountInfo>,
}

/// Per-account summary inside [`RelayStatistics`]
#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub from: String,
    pub enabled: bool,
}

/// The relay core
pub struct RelayService {
    config: RelayConfig,
    notifications: Arc<NotificationStore>,
}

impl RelayService {
    #[must_use]
    pub const fn new(config: RelayConfig, notifications: Arc<NotificationStore>) -> Self {
        Self {
            config,
            notifications,
        }
    }

    /// Whether the relay is switched on and has at least one usable account
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.available_accounts().is_empty()
    }

    /// Relay a message through the account pool
    ///
    /// The pool is randomly permuted per message so load spreads across
    /// accounts; the first success wins. On exhaustion a system
    /// notification is recorded and the last error is returned.
    ///
    /// # Errors
    ///
    /// [`RelayError::Disabled`] when the relay is off,
    /// [`RelayError::NoAccounts`] when the pool is empty, and
    /// [`RelayError::Exhausted`] when every attempted account failed.
    pub async fn send(&self, message: &EmailMessage) -> Result<(), RelayError> {
        if !self.config.enabled {
            return Err(RelayError::Disabled);
        }

        let mut pool = self.available_accounts();
        if pool.is_empty() {
            return Err(RelayError::NoAccounts);
        }
        pool.shuffle(&mut rand::thread_rng());

        let attempts = self.attempt_budget(pool.len());
        let mut last_error = String::new();

        for account in pool.into_iter().take(attempts) {
            info!(account = %account.name, host = %account.host, "attempting smtp relay");
            match self.send_via_account(account, message).await {
                Ok(()) => {
                    info!(account = %account.name, "mail relayed");
                    return Ok(());
                }
                Err(err) => {
                    warn!(account = %account.name, error = %err, "smtp account failed");
                    last_error = err.to_string();
                }
            }
        }

        self.record_exhaustion(message, &last_error);
        Err(RelayError::Exhausted(last_error))
    }

    /// Point-in-time statistics for the HTTP API
    #[must_use]
    pub fn statistics(&self) -> RelayStatistics {
        RelayStatistics {
            enabled: self.config.enabled,
            total_accounts: self.config.accounts.len(),
            available_accounts: self.available_accounts().len(),
            max_retries: self.config.max_retries,
            accounts: self
                .config
                .accounts
                .iter()
                .map(|account| AccountInfo {
                    name: account.name.clone(),
                    host: account.host.clone(),
                    port: account.port,
                    from: account.from.clone(),
                    enabled: account.enabled,
                })
                .collect(),
        }
    }

    fn available_accounts(&self) -> Vec<&SmtpAccount> {
        self.config
            .accounts
            .iter()
            .filter(|account| account.enabled && !account.host.is_empty() && !account.from.is_empty())
            .collect()
    }

    fn attempt_budget(&self, pool_size: usize) -> usize {
        if self.config.max_retries > 0 {
            self.config.max_retries.min(pool_size)
        } else {
            pool_size
        }
    }

    async fn send_via_account(
        &self,
        account: &SmtpAccount,
        message: &EmailMessage,
    ) -> Result<(), RelayError> {
        let email = Self::build_message(account, message)?;
        let params = TlsParameters::new(account.host.clone())?;

        // Implicit TLS first; a plain connection with opportunistic
        // STARTTLS is the fallback for servers that only listen in clear.
        let wrapped = Self::transport(account, Tls::Wrapper(params.clone()));
        match wrapped.send(email.clone()).await {
            Ok(_) => Ok(()),
            Err(err) => {
                debug!(
                    account = %account.name,
                    error = %err,
                    "implicit tls failed, retrying with starttls"
                );
                let opportunistic = Self::transport(account, Tls::Opportunistic(params));
                opportunistic.send(email).await?;
                Ok(())
            }
        }
    }

    fn transport(account: &SmtpAccount, tls: Tls) -> AsyncSmtpTransport<Tokio1Executor> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(account.host.as_str())
            .port(account.port)
            .tls(tls)
            .timeout(Some(std::time::Duration::from_secs(30)));

        if !account.username.is_empty() && !account.password.is_empty() {
            builder = builder.credentials(Credentials::new(
                account.username.clone(),
                account.password.clone(),
            ));
        }

        builder.build()
    }

    fn build_message(account: &SmtpAccount, message: &EmailMessage) -> Result<Message, RelayError> {
        let mut builder = Message::builder()
            .from(account.from.parse()?)
            .subject(&message.subject);
        for recipient in &message.to {
            builder = builder.to(recipient.parse()?);
        }

        let content_type = if message.is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        Ok(builder.header(content_type).body(message.body.clone())?)
    }

    fn record_exhaustion(&self, message: &EmailMessage, last_error: &str) {
        let request = PushRequest {
            recipient_alias: "smtp_relay".to_string(),
            message_type: MessageType::Error,
            platform: None,
            strategy: Strategy::Failover,
            style: Style::Card,
            content: MessageContent {
                title: "SMTP relay delivery failed".to_string(),
                msg: format!(
                    "Every smtp account failed to deliver the message.\n\nTo: {}\nSubject: {}\n\nLast error: {last_error}",
                    message.to.join(", "),
                    message.subject,
                ),
            },
        };

        let id = self
            .notifications
            .add("", &request, "smtp relay exhausted all accounts");
        error!(notification_id = %id, "smtp relay exhausted, system notification recorded");
    }
}
