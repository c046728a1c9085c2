//! SMTP relay for the push gateway
//!
//! Two halves: a relay core that forwards mail through a rotating pool
//! of upstream SMTP accounts, and a minimal authenticated submission
//! server that accepts mail over RFC 5321 and hands it to the core.

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

pub mod relay;
pub mod server;

pub use relay::{
    AccountInfo, AuthConfig, EmailMessage, ListenConfig, RelayConfig, RelayError, RelayService,
    RelayStatistics, SmtpAccount,
};
pub use server::{serve_connection, SmtpServer};
