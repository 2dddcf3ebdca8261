//! CLI struct definitions for the solvestat command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::plugins::statistics::{
    DEFAULT_IMAGE_ATTACHMENTS, DEFAULT_POPULAR_DAYS, DEFAULT_TOP_ATTACHMENTS, DEFAULT_TOP_POSTERS,
    DEFAULT_TOP_REACTED,
};

#[derive(Parser, Debug)]
#[clap(
    name = "solvestat",
    version = env!("CARGO_PKG_VERSION"),
    about = "Best-answer tracking and cached per-topic statistics for forum content."
)]
pub(crate) struct Cli {
    /// Store directory (defaults to $SOLVESTAT_ROOT, then ./.solvestat).
    #[clap(long, global = true)]
    pub root: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the store directory and database schema
    Init,
    /// Accepted-solution operations
    Solve(SolveCli),
    /// Per-item statistics
    Stats(StatsCli),
    /// Member notifications
    Notify(NotifyCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct SolveCli {
    #[clap(subcommand)]
    pub command: SolveCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum SolveCommand {
    /// Mark a comment as the item's solution
    Set {
        #[clap(long)]
        item: i64,
        #[clap(long)]
        comment: i64,
        /// Acting member id.
        #[clap(long)]
        member: Option<i64>,
    },
    /// Unmark a comment as the item's solution
    Unset {
        #[clap(long)]
        item: i64,
        #[clap(long)]
        comment: i64,
        #[clap(long)]
        member: Option<i64>,
    },
    /// Show whether the item is solved and by which comment
    Status {
        #[clap(long)]
        item: i64,
    },
    /// Check whether a member may pick the solution
    Can {
        #[clap(long)]
        item: i64,
        #[clap(long)]
        member: i64,
    },
    /// Count solutions credited to a member
    Count {
        #[clap(long)]
        member: i64,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct StatsCli {
    #[clap(subcommand)]
    pub command: StatsCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum StatsCommand {
    /// Members with the most posts
    TopPosters {
        #[clap(long)]
        item: i64,
        #[clap(long, default_value_t = DEFAULT_TOP_POSTERS)]
        count: usize,
    },
    /// Posts with the most reactions
    TopReacted {
        #[clap(long)]
        item: i64,
        #[clap(long, default_value_t = DEFAULT_TOP_REACTED)]
        count: usize,
        /// Member viewing the list (guest when omitted).
        #[clap(long)]
        viewer: Option<i64>,
    },
    /// Days with the most posts
    PopularDays {
        #[clap(long)]
        item: i64,
        #[clap(long, default_value_t = DEFAULT_POPULAR_DAYS)]
        count: usize,
    },
    /// Most downloaded attachments
    Attachments {
        #[clap(long)]
        item: i64,
        #[clap(long, default_value_t = DEFAULT_TOP_ATTACHMENTS)]
        count: usize,
    },
    /// Image attachments
    Images {
        #[clap(long)]
        item: i64,
        #[clap(long, default_value_t = DEFAULT_IMAGE_ATTACHMENTS)]
        count: usize,
    },
    /// Drop cached statistics for an item
    Clear {
        #[clap(long)]
        item: i64,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct NotifyCli {
    #[clap(subcommand)]
    pub command: NotifyCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum NotifyCommand {
    /// List a member's notifications
    List {
        #[clap(long)]
        member: i64,
    },
    /// Mark a member's notifications as read
    Read {
        #[clap(long)]
        member: i64,
    },
}
