//! Content model: containers, members, items and comments.
//!
//! These rows belong to the surrounding forum framework. The engine reads them
//! and writes back only solve state; the `create_*` helpers exist so tooling
//! and tests can populate a store.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::SolvestatError;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Describes one item/comment pairing and which attributes its comment type
/// carries. Aggregates consult these flags instead of assuming a fixed schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContentKind {
    /// Application key written to the solved and reputation indexes.
    pub app: String,
    /// Module name; combined with `app` to form the attachment location key.
    pub module: String,
    /// Owner class used to key statistics cache rows and notifications.
    pub item_class: String,
    /// Comment class recorded in the solved index.
    pub comment_class: String,
    /// Reaction type recorded in the reputation index for this comment type.
    pub reaction_type: String,
    /// Container-scoped moderator permission key.
    pub mod_perm: String,
    pub has_author: bool,
    pub has_approved: bool,
    pub has_hidden: bool,
    pub has_updated: bool,
    pub reactable: bool,
    pub archivable: bool,
}

impl Default for ContentKind {
    fn default() -> Self {
        Self::forum_topic()
    }
}

impl ContentKind {
    pub fn forum_topic() -> Self {
        Self {
            app: "forums".to_string(),
            module: "forums".to_string(),
            item_class: "forums_topic".to_string(),
            comment_class: "forums_post".to_string(),
            reaction_type: "pid".to_string(),
            mod_perm: "forums".to_string(),
            has_author: true,
            has_approved: true,
            has_hidden: true,
            has_updated: false,
            reactable: true,
            archivable: true,
        }
    }

    /// Attachment map location, e.g. `forums_Forums`.
    pub fn location_key(&self) -> String {
        let mut chars = self.module.chars();
        let module = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("{}_{}", self.app, module)
    }

    /// Column holding the day a comment counts towards.
    pub fn date_column(&self) -> &'static str {
        if self.has_updated { "updated" } else { "date" }
    }

    /// SQL predicates restricting `comments` to visible rows. Empty when the
    /// comment type tracks neither approval nor hiding.
    pub fn visible_predicates(&self) -> Vec<&'static str> {
        let mut where_clauses = Vec::new();
        if self.has_approved {
            where_clauses.push("approved = 1");
        }
        if self.has_hidden {
            where_clauses.push("hidden = 0");
        }
        where_clauses
    }

    pub fn comment_is_visible(&self, comment: &Comment) -> bool {
        (!self.has_approved || comment.approved) && (!self.has_hidden || !comment.hidden)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Container {
    pub id: i64,
    pub name: String,
    pub allow_solvable: bool,
    pub allow_member_solvable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub container_id: i64,
    pub author_id: i64,
    pub title: String,
    pub solved_comment_id: Option<i64>,
    pub archived: bool,
    pub approved: bool,
    pub hidden: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub item_id: i64,
    pub author_id: i64,
    pub body: String,
    pub solved: bool,
    pub approved: bool,
    pub hidden: bool,
    pub date: Option<i64>,
    pub updated: Option<i64>,
}

const CONTAINER_COLUMNS: &str = "id, name, allow_solvable, allow_member_solvable";
const ITEM_COLUMNS: &str =
    "id, container_id, author_id, title, solved_comment_id, archived, approved, hidden, created_at";
const COMMENT_COLUMNS: &str = "id, item_id, author_id, body, solved, approved, hidden, date, updated";

fn container_from_row(row: &Row<'_>) -> rusqlite::Result<Container> {
    Ok(Container {
        id: row.get(0)?,
        name: row.get(1)?,
        allow_solvable: row.get(2)?,
        allow_member_solvable: row.get(3)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let solved: Option<i64> = row.get(4)?;
    Ok(Item {
        id: row.get(0)?,
        container_id: row.get(1)?,
        author_id: row.get(2)?,
        title: row.get(3)?,
        // 0 is how legacy rows spell "unsolved"
        solved_comment_id: solved.filter(|id| *id != 0),
        archived: row.get(5)?,
        approved: row.get(6)?,
        hidden: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        item_id: row.get(1)?,
        author_id: row.get(2)?,
        body: row.get(3)?,
        solved: row.get(4)?,
        approved: row.get(5)?,
        hidden: row.get(6)?,
        date: row.get(7)?,
        updated: row.get(8)?,
    })
}

// --- connection-level access, shared by the engines ---

pub fn find_container(conn: &Connection, id: i64) -> Result<Option<Container>, SolvestatError> {
    let sql = format!("SELECT {CONTAINER_COLUMNS} FROM containers WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], container_from_row).optional()?)
}

pub fn load_container(conn: &Connection, id: i64) -> Result<Container, SolvestatError> {
    find_container(conn, id)?
        .ok_or_else(|| SolvestatError::NotFound(format!("container {}", id)))
}

pub fn find_item(conn: &Connection, id: i64) -> Result<Option<Item>, SolvestatError> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], item_from_row).optional()?)
}

pub fn load_item(conn: &Connection, id: i64) -> Result<Item, SolvestatError> {
    find_item(conn, id)?.ok_or_else(|| SolvestatError::NotFound(format!("item {}", id)))
}

pub fn find_comment(conn: &Connection, id: i64) -> Result<Option<Comment>, SolvestatError> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], comment_from_row).optional()?)
}

pub fn load_comment(conn: &Connection, id: i64) -> Result<Comment, SolvestatError> {
    find_comment(conn, id)?.ok_or_else(|| SolvestatError::NotFound(format!("comment {}", id)))
}

/// Load the given comments, keyed by id. Missing ids are simply absent.
pub fn comments_by_ids(
    conn: &Connection,
    ids: &[i64],
) -> Result<HashMap<i64, Comment>, SolvestatError> {
    let mut out = HashMap::new();
    if ids.is_empty() {
        return Ok(out);
    }
    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE id IN ({})",
        id_list(ids)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], comment_from_row)?;
    for r in rows {
        let c = r?;
        out.insert(c.id, c);
    }
    Ok(out)
}

/// Load the given members, keyed by id. Missing ids are simply absent.
pub fn members_by_ids(
    conn: &Connection,
    ids: &[i64],
) -> Result<HashMap<i64, Member>, SolvestatError> {
    let mut out = HashMap::new();
    if ids.is_empty() {
        return Ok(out);
    }
    let sql = format!("SELECT id, name FROM members WHERE id IN ({})", id_list(ids));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(Member {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    for r in rows {
        let m = r?;
        out.insert(m.id, m);
    }
    Ok(out)
}

pub fn save_comment_solved(
    conn: &Connection,
    comment_id: i64,
    solved: bool,
) -> Result<(), SolvestatError> {
    conn.execute(
        "UPDATE comments SET solved = ?1 WHERE id = ?2",
        params![solved, comment_id],
    )?;
    Ok(())
}

pub fn save_item_solution(
    conn: &Connection,
    item_id: i64,
    solved_comment_id: Option<i64>,
) -> Result<(), SolvestatError> {
    conn.execute(
        "UPDATE items SET solved_comment_id = ?1 WHERE id = ?2",
        params![solved_comment_id, item_id],
    )?;
    Ok(())
}

/// Comma-joined integer list for `IN (...)`. Only ever built from `i64`s.
pub(crate) fn id_list(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

// --- store-level ingest and lookup ---

#[derive(Debug, Clone)]
pub struct NewContainer<'a> {
    pub name: &'a str,
    pub allow_solvable: bool,
    pub allow_member_solvable: bool,
}

#[derive(Debug, Clone)]
pub struct NewItem<'a> {
    pub container_id: i64,
    pub author_id: i64,
    pub title: &'a str,
    pub archived: bool,
}

#[derive(Debug, Clone)]
pub struct NewComment<'a> {
    pub item_id: i64,
    pub author_id: i64,
    pub body: &'a str,
    pub approved: bool,
    pub hidden: bool,
    pub date: Option<i64>,
    pub updated: Option<i64>,
}

impl<'a> NewComment<'a> {
    /// A visible comment posted at `date`.
    pub fn visible(item_id: i64, author_id: i64, date: i64) -> Self {
        Self {
            item_id,
            author_id,
            body: "",
            approved: true,
            hidden: false,
            date: Some(date),
            updated: None,
        }
    }
}

pub fn create_container(store: &Store, new: NewContainer<'_>) -> Result<i64, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "content.container.create", |conn| {
        conn.execute(
            "INSERT INTO containers(name, allow_solvable, allow_member_solvable) VALUES(?1, ?2, ?3)",
            params![new.name, new.allow_solvable, new.allow_member_solvable],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn create_member(store: &Store, name: &str) -> Result<i64, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "content.member.create", |conn| {
        conn.execute(
            "INSERT INTO members(name, joined) VALUES(?1, ?2)",
            params![name, time::now_epoch()],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn create_item(store: &Store, new: NewItem<'_>) -> Result<i64, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "content.item.create", |conn| {
        load_container(conn, new.container_id)?;
        conn.execute(
            "INSERT INTO items(container_id, author_id, title, archived, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![
                new.container_id,
                new.author_id,
                new.title,
                new.archived,
                time::now_epoch()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn create_comment(store: &Store, new: NewComment<'_>) -> Result<i64, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "content.comment.create", |conn| {
        load_item(conn, new.item_id)?;
        conn.execute(
            "INSERT INTO comments(item_id, author_id, body, approved, hidden, date, updated)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.item_id,
                new.author_id,
                new.body,
                new.approved,
                new.hidden,
                new.date,
                new.updated
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn get_item(store: &Store, id: i64) -> Result<Option<Item>, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "content.item.get", |conn| find_item(conn, id))
}

pub fn get_comment(store: &Store, id: i64) -> Result<Option<Comment>, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "content.comment.get", |conn| {
        find_comment(conn, id)
    })
}

/// All comments under an item, oldest id first.
pub fn list_comments(store: &Store, item_id: i64) -> Result<Vec<Comment>, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "content.comment.list", |conn| {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE item_id = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([item_id], comment_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}
