//! solvestat: best-answer tracking and cached per-item statistics for
//! forum-style content.
//!
//! # Architecture
//!
//! A store is a directory holding one SQLite database (`content.db`), an
//! append-only broker audit log and an optional `solvestat.toml`.
//!
//! All database access routes through `DbBroker`, which serializes calls
//! in-process and records one audit event per call. Solve toggles run inside a
//! single IMMEDIATE transaction.
//!
//! ## Subsystems
//!
//! - `solve`: one accepted solution per item, plus the solved index
//! - `statistics`: top posters, top reacted posts, popular days and
//!   attachment listings, read-through cached for a configurable TTL
//! - `notifications`: best-answer notices queued for solution authors
//!
//! # Crate Structure
//!
//! - [`core`]: store, broker, schema, config, logging, errors
//! - [`plugins`]: the subsystems and the [`plugins::forum::Forum`] composition

pub mod core;
pub mod plugins;

mod cli;

use crate::cli::{Cli, Command, NotifyCommand, SolveCommand, StatsCommand};
use crate::core::{config, db, error, logging, store::Store, time};
use crate::plugins::{forum::Forum, notifications};
use clap::Parser;

pub fn run() -> Result<(), error::SolvestatError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;
    let store = Store::resolve(cli.root.as_deref(), &current_dir);

    let cfg = config::load_config(&store.root)?;
    logging::init_tracing(&cfg.log);

    let out = match cli.command {
        Command::Init => {
            db::initialize_content_db(&store.root)?;
            time::command_envelope(
                "init",
                "ok",
                serde_json::json!({
                    "root": store.root.to_string_lossy(),
                    "cache_ttl_secs": cfg.cache.ttl_secs,
                }),
            )
        }
        command => {
            if !db::content_db_path(&store.root).exists() {
                return Err(error::SolvestatError::NotFound(format!(
                    "no store at {} (run `solvestat init`)",
                    store.root.display()
                )));
            }
            let mut forum = Forum::with_config(&store, cfg);
            match command {
                Command::Solve(solve_cli) => run_solve(&mut forum, solve_cli.command)?,
                Command::Stats(stats_cli) => run_stats(&mut forum, stats_cli.command)?,
                Command::Notify(notify_cli) => run_notify(&store, notify_cli.command)?,
                Command::Init => return Ok(()),
            }
        }
    };
    print_json(&out)
}

fn run_solve(
    forum: &mut Forum,
    command: SolveCommand,
) -> Result<serde_json::Value, error::SolvestatError> {
    let out = match command {
        SolveCommand::Set {
            item,
            comment,
            member,
        } => {
            let outcome = forum.item(item)?.toggle_solve(comment, true, member)?;
            time::command_envelope("solve.set", "ok", serde_json::json!({ "outcome": outcome }))
        }
        SolveCommand::Unset {
            item,
            comment,
            member,
        } => {
            let outcome = forum.item(item)?.toggle_solve(comment, false, member)?;
            time::command_envelope("solve.unset", "ok", serde_json::json!({ "outcome": outcome }))
        }
        SolveCommand::Status { item } => {
            let topic = forum.item(item)?;
            let solved = topic.is_solved()?;
            let solution = topic.solution()?;
            time::command_envelope(
                "solve.status",
                "ok",
                serde_json::json!({
                    "item_id": item,
                    "solved": solved,
                    "solution": solution,
                }),
            )
        }
        SolveCommand::Can { item, member } => {
            let allowed = forum.item(item)?.can_solve(member)?;
            time::command_envelope(
                "solve.can",
                "ok",
                serde_json::json!({ "item_id": item, "member_id": member, "allowed": allowed }),
            )
        }
        SolveCommand::Count { member } => {
            let count = forum.solve().solution_count(member)?;
            time::command_envelope(
                "solve.count",
                "ok",
                serde_json::json!({ "member_id": member, "solutions": count }),
            )
        }
    };
    Ok(out)
}

fn run_stats(
    forum: &mut Forum,
    command: StatsCommand,
) -> Result<serde_json::Value, error::SolvestatError> {
    let out = match command {
        StatsCommand::TopPosters { item, count } => {
            let rows = forum.item(item)?.top_posters(count)?;
            time::command_envelope("stats.top_posters", "ok", serde_json::json!({ "items": rows }))
        }
        StatsCommand::TopReacted {
            item,
            count,
            viewer,
        } => {
            let rows = forum.item(item)?.top_reacted_posts(count, viewer)?;
            time::command_envelope("stats.top_reacted", "ok", serde_json::json!({ "items": rows }))
        }
        StatsCommand::PopularDays { item, count } => {
            let rows = forum.item(item)?.popular_days(count)?;
            time::command_envelope(
                "stats.popular_days",
                "ok",
                serde_json::json!({ "items": rows }),
            )
        }
        StatsCommand::Attachments { item, count } => {
            let rows = forum.item(item)?.top_attachments(count)?;
            time::command_envelope("stats.attachments", "ok", serde_json::json!({ "items": rows }))
        }
        StatsCommand::Images { item, count } => {
            let rows = forum.item(item)?.image_attachments(count)?;
            time::command_envelope("stats.images", "ok", serde_json::json!({ "items": rows }))
        }
        StatsCommand::Clear { item } => {
            forum.item(item)?.clear_cached_statistics()?;
            time::command_envelope("stats.clear", "ok", serde_json::json!({ "item_id": item }))
        }
    };
    Ok(out)
}

fn run_notify(
    store: &Store,
    command: NotifyCommand,
) -> Result<serde_json::Value, error::SolvestatError> {
    let out = match command {
        NotifyCommand::List { member } => {
            let rows = notifications::list_for_member(store, member)?;
            time::command_envelope("notify.list", "ok", serde_json::json!({ "items": rows }))
        }
        NotifyCommand::Read { member } => {
            let changed = notifications::mark_all_read(store, member)?;
            time::command_envelope("notify.read", "ok", serde_json::json!({ "changed": changed }))
        }
    };
    Ok(out)
}

fn print_json(value: &serde_json::Value) -> Result<(), error::SolvestatError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
