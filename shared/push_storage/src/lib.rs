//! In-memory stores for the push gateway
//!
//! This crate provides the task store tracking per-destination delivery
//! outcomes and the bounded system-notification store used as the
//! delivery sink of last resort. Both live entirely in memory; nothing
//! survives a process restart.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// System-notification store
pub mod notification;
/// Task store and sweeper
pub mod task;

pub use notification::{
    NotificationStatistics, NotificationStatus, NotificationStore, SystemNotification,
};
pub use task::{run_sweeper, Task, TaskProgress, TaskSettings, TaskStatus, TaskStore};
