//! Subsystems built on [`crate::core`].
//!
//! - `content`: framework-owned items, comments, containers and members
//! - `permissions`: moderator permission lookups and view checks
//! - `solve`: accepted-solution tracking
//! - `statistics`: cached per-item aggregates, backed by `stats_cache`
//! - `reactions`, `attachments`: inputs to the aggregates
//! - `notifications`: best-answer notices
//! - `forum`: composition of the above for one content kind

pub mod attachments;
pub mod content;
pub mod forum;
pub mod notifications;
pub mod permissions;
pub mod reactions;
pub mod solve;
pub mod statistics;
pub mod stats_cache;
