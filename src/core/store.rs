//! Store abstraction for solvestat's state.
//!
//! A store is a directory holding the content database, the broker audit log
//! and an optional `solvestat.toml`. Every subsystem call is scoped to one.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the default store root.
pub const STORE_ROOT_ENV: &str = "SOLVESTAT_ROOT";

/// Default store directory, relative to the working directory.
pub const DEFAULT_STORE_DIR: &str = ".solvestat";

/// Store handle representing one solvestat workspace.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute (or caller-relative) path to the store root directory
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the store root: explicit path, then `SOLVESTAT_ROOT`, then
    /// `<cwd>/.solvestat`.
    pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Self {
        if let Some(p) = explicit {
            return Self::new(p);
        }
        match std::env::var(STORE_ROOT_ENV) {
            Ok(v) if !v.trim().is_empty() => Self::new(v),
            _ => Self::new(cwd.join(DEFAULT_STORE_DIR)),
        }
    }
}
