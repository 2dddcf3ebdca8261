//! Core modules: storage access, configuration and shared primitives.
//!
//! Every subsystem in [`crate::plugins`] builds on these.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod schemas;
pub mod store;
pub mod time;
