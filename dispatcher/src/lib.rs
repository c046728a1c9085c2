//! Dispatch engine for the push gateway
//!
//! A bounded job queue feeds a fixed pool of workers; each worker
//! resolves the recipient, computes the expected attempt count, and runs
//! the requested fan-out strategy against the platform adapter registry,
//! recording every outcome in the task store. When a task ends with zero
//! successes, delivery escalates to the configured system sinks.

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

pub mod config;
pub mod coordinator;
mod fallback;
pub mod platform;
pub mod processor;
pub mod strategy;
pub mod types;

pub use config::QueueSettings;
pub use coordinator::{Dispatcher, JobSender};
pub use platform::{standard_registry, Platform, PlatformRegistry};
pub use types::{DispatchContext, EnqueueError, PushJob};
