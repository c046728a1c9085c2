//! Types shared across the push gateway workspace
//!
//! Wire types for the push API, delivery outcome records, and the
//! recipient/platform endpoint configuration model.

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

mod recipient;
mod request;
mod result;

pub use recipient::{
    EmailEndpoint, Endpoint, PlatformConfig, RecipientConfig, SystemConfig, SystemEndpoint,
    SystemSinkKind, WebhookEndpoint,
};
pub use request::{MessageContent, MessageType, PushRequest, Strategy, Style};
pub use result::{DeliveryStatus, PushResult};
