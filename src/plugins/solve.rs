//! Accepted-solution ("best answer") tracking for items.
//!
//! An item has at most one solved comment. `items.solved_comment_id`, the
//! comment's `solved` flag and the `solved_index` row always move together
//! inside one IMMEDIATE transaction.

use crate::core::broker::DbBroker;
use crate::core::config::Config;
use crate::core::db;
use crate::core::error::SolvestatError;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::content::{self, Comment, Container, ContentKind, Item};
use crate::plugins::notifications;
use crate::plugins::permissions::{self, PERM_SET_BEST_ANSWER};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// What a toggle did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SolveOutcome {
    pub item_id: i64,
    pub comment_id: i64,
    pub solved: bool,
    /// Solution that was displaced by this toggle, if any.
    pub replaced: Option<i64>,
    /// Item's solution after the toggle.
    pub solved_comment_id: Option<i64>,
}

/// Minimal item row as handed over by a search or stream listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemSummary {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved: Option<bool>,
}

impl ItemSummary {
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            solved: None,
        }
    }
}

pub struct SolveEngine {
    root: PathBuf,
    kind: ContentKind,
}

impl SolveEngine {
    pub fn new(store: &Store, kind: ContentKind) -> Self {
        Self {
            root: store.root.clone(),
            kind,
        }
    }

    pub fn from_config(store: &Store, config: &Config) -> Self {
        Self::new(store, config.content.clone())
    }

    fn broker(&self) -> (DbBroker, PathBuf) {
        (DbBroker::new(&self.root), db::content_db_path(&self.root))
    }

    /// Mark (`value = true`) or unmark a comment as the item's solution.
    pub fn toggle_solve(
        &self,
        item_id: i64,
        comment_id: i64,
        value: bool,
        acting_member: Option<i64>,
    ) -> Result<SolveOutcome, SolvestatError> {
        let (broker, db_path) = self.broker();
        let actor = match acting_member {
            Some(id) => format!("member:{}", id),
            None => "system".to_string(),
        };
        let kind = &self.kind;

        let outcome = broker.with_tx(&db_path, &actor, "solve.toggle", |tx| {
            let item = content::load_item(tx, item_id)?;
            let comment = content::load_comment(tx, comment_id)?;
            if comment.item_id != item.id {
                return Err(SolvestatError::InvalidArgument(format!(
                    "comment {} belongs to item {}, not item {}",
                    comment.id, comment.item_id, item.id
                )));
            }

            content::save_comment_solved(tx, comment.id, value)?;

            if value {
                set_solution(tx, kind, &item, &comment, acting_member)
            } else {
                unset_solution(tx, kind, &item, &comment)
            }
        })?;

        tracing::info!(
            item_id,
            comment_id,
            solved = value,
            replaced = ?outcome.replaced,
            "solve state changed"
        );
        Ok(outcome)
    }

    /// Whether the item has an accepted solution in a container that allows one.
    pub fn is_solved(&self, item_id: i64) -> Result<bool, SolvestatError> {
        let (broker, db_path) = self.broker();
        broker.with_conn(&db_path, "solvestat", "solve.is_solved", |conn| {
            let item = content::load_item(conn, item_id)?;
            let container = content::load_container(conn, item.container_id)?;
            Ok(item_is_solved(&item, &container))
        })
    }

    /// Whether `member_id` may pick the item's solution.
    pub fn can_solve(&self, item_id: i64, member_id: i64) -> Result<bool, SolvestatError> {
        let (broker, db_path) = self.broker();
        let kind = &self.kind;
        broker.with_conn(&db_path, "solvestat", "solve.can_solve", |conn| {
            let item = content::load_item(conn, item_id)?;
            let container = content::load_container(conn, item.container_id)?;
            member_can_solve(conn, kind, &item, &container, member_id)
        })
    }

    /// The item's accepted solution; `None` when unsolved or the comment is gone.
    pub fn get_solution(&self, item_id: i64) -> Result<Option<Comment>, SolvestatError> {
        let (broker, db_path) = self.broker();
        broker.with_conn(&db_path, "solvestat", "solve.get_solution", |conn| {
            let item = content::load_item(conn, item_id)?;
            match item.solved_comment_id {
                Some(id) => content::find_comment(conn, id),
                None => Ok(None),
            }
        })
    }

    /// Annotate listing rows with their solved state. Rows `viewer` may not
    /// see keep `solved: None`. No usable ids yields an empty list.
    pub fn search_result_extra_data(
        &self,
        items: &[ItemSummary],
        viewer: Option<i64>,
    ) -> Result<Vec<ItemSummary>, SolvestatError> {
        let ids: BTreeSet<i64> = items.iter().map(|i| i.id).filter(|id| *id > 0).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = ids.into_iter().collect();

        let (broker, db_path) = self.broker();
        let kind = &self.kind;
        let solved = broker.with_conn(&db_path, "solvestat", "solve.search_extra", |conn| {
            permitted_solved_states(conn, kind, &ids, viewer)
        })?;

        Ok(items
            .iter()
            .map(|summary| {
                let mut out = summary.clone();
                if let Some(state) = solved.get(&summary.id) {
                    out.solved = Some(*state);
                }
                out
            })
            .collect())
    }

    /// Whether any container has solving switched on.
    pub fn any_container_allows_solvable(&self) -> Result<bool, SolvestatError> {
        let (broker, db_path) = self.broker();
        broker.with_conn(&db_path, "solvestat", "solve.any_container", |conn| {
            let any: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM containers WHERE allow_solvable = 1 OR allow_member_solvable = 1)",
                [],
                |row| row.get(0),
            )?;
            Ok(any)
        })
    }

    /// Number of accepted solutions credited to a member for this app.
    pub fn solution_count(&self, member_id: i64) -> Result<i64, SolvestatError> {
        let (broker, db_path) = self.broker();
        let kind = &self.kind;
        broker.with_conn(&db_path, "solvestat", "solve.solution_count", |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM solved_index WHERE member_id = ?1 AND app = ?2",
                params![member_id, kind.app],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }
}

fn set_solution(
    conn: &Connection,
    kind: &ContentKind,
    item: &Item,
    comment: &Comment,
    acting_member: Option<i64>,
) -> Result<SolveOutcome, SolvestatError> {
    let replaced = item.solved_comment_id.filter(|old| *old != comment.id);

    if let Some(old_id) = replaced {
        match content::find_comment(conn, old_id) {
            Ok(Some(old)) => content::save_comment_solved(conn, old.id, false)?,
            Ok(None) => {
                tracing::warn!(item_id = item.id, old_id, "previous solution no longer exists");
            }
            Err(e) => {
                tracing::warn!(item_id = item.id, old_id, error = %e, "could not load previous solution");
            }
        }
    }

    // Legacy rows may carry stray flags; only the new solution stays set.
    conn.execute(
        "UPDATE comments SET solved = 0 WHERE item_id = ?1 AND id != ?2 AND solved = 1",
        params![item.id, comment.id],
    )?;

    content::save_item_solution(conn, item.id, Some(comment.id))?;

    conn.execute(
        "DELETE FROM solved_index WHERE item_id = ?1 AND comment_class = ?2",
        params![item.id, kind.comment_class],
    )?;
    conn.execute(
        "INSERT INTO solved_index(member_id, app, comment_class, comment_id, item_id, solved_date)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            comment.author_id,
            kind.app,
            kind.comment_class,
            comment.id,
            item.id,
            time::now_epoch()
        ],
    )?;

    let newly_solved = item.solved_comment_id != Some(comment.id);
    if newly_solved && comment.author_id > 0 && acting_member != Some(comment.author_id) {
        notifications::queue_best_answer(
            conn,
            &kind.item_class,
            comment.author_id,
            item.id,
            comment.id,
        )?;
    }

    Ok(SolveOutcome {
        item_id: item.id,
        comment_id: comment.id,
        solved: true,
        replaced,
        solved_comment_id: Some(comment.id),
    })
}

fn unset_solution(
    conn: &Connection,
    kind: &ContentKind,
    item: &Item,
    comment: &Comment,
) -> Result<SolveOutcome, SolvestatError> {
    // Unmarking some other comment must not orphan the real solution.
    let solved_comment_id = if item.solved_comment_id == Some(comment.id) {
        content::save_item_solution(conn, item.id, None)?;
        None
    } else {
        item.solved_comment_id
    };

    conn.execute(
        "DELETE FROM solved_index WHERE comment_class = ?1 AND comment_id = ?2",
        params![kind.comment_class, comment.id],
    )?;

    Ok(SolveOutcome {
        item_id: item.id,
        comment_id: comment.id,
        solved: false,
        replaced: None,
        solved_comment_id,
    })
}

pub fn item_is_solved(item: &Item, container: &Container) -> bool {
    (container.allow_solvable || container.allow_member_solvable) && item.solved_comment_id.is_some()
}

pub fn member_can_solve(
    conn: &Connection,
    kind: &ContentKind,
    item: &Item,
    container: &Container,
    member_id: i64,
) -> Result<bool, SolvestatError> {
    if kind.archivable && item.archived {
        return Ok(false);
    }
    if !container.allow_solvable {
        return Ok(false);
    }
    if member_id > 0 && member_id == item.author_id && container.allow_member_solvable {
        return Ok(true);
    }
    permissions::is_container_moderator(conn, kind, member_id, PERM_SET_BEST_ANSWER, container.id)
}

fn permitted_solved_states(
    conn: &Connection,
    kind: &ContentKind,
    ids: &[i64],
    viewer: Option<i64>,
) -> Result<HashMap<i64, bool>, SolvestatError> {
    let mut containers: HashMap<i64, Container> = HashMap::new();
    let mut out = HashMap::new();
    for id in ids {
        let Some(item) = content::find_item(conn, *id)? else {
            continue;
        };
        if !permissions::can_view_item(conn, kind, viewer, &item)? {
            continue;
        }
        if !containers.contains_key(&item.container_id) {
            let container = content::load_container(conn, item.container_id)?;
            containers.insert(item.container_id, container);
        }
        if let Some(container) = containers.get(&item.container_id) {
            out.insert(item.id, item_is_solved(&item, container));
        }
    }
    Ok(out)
}
