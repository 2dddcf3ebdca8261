//! Moderator permission lookups.
//!
//! Permission values come from the framework's `mod_permissions` table. A
//! value is a boolean, the tri-state "use global" marker (`-1`), or a JSON
//! list of container ids the grant is limited to.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::SolvestatError;
use crate::core::store::Store;
use crate::plugins::content::{Comment, ContentKind, Item};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

/// Global moderator permission required to pick a best answer.
pub const PERM_SET_BEST_ANSWER: &str = "can_set_best_answer";
/// Global moderator permission to see unapproved or hidden comments.
pub const PERM_VIEW_HIDDEN: &str = "can_view_hidden_content";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModPermission {
    Denied,
    Allowed,
    /// Defer to the member's global moderator setting.
    Global,
    Containers(Vec<i64>),
}

impl ModPermission {
    pub fn parse(raw: &str) -> Result<Self, SolvestatError> {
        let raw = raw.trim();
        match raw {
            "" | "0" | "false" => Ok(ModPermission::Denied),
            "1" | "true" => Ok(ModPermission::Allowed),
            "-1" => Ok(ModPermission::Global),
            _ if raw.starts_with('[') => {
                let ids: Vec<i64> = serde_json::from_str(raw).map_err(|e| {
                    SolvestatError::ValidationError(format!(
                        "bad container list in permission value '{}': {}",
                        raw, e
                    ))
                })?;
                Ok(ModPermission::Containers(ids))
            }
            other => Err(SolvestatError::ValidationError(format!(
                "unrecognised permission value '{}'",
                other
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ModPermission::Denied => "0".to_string(),
            ModPermission::Allowed => "1".to_string(),
            ModPermission::Global => "-1".to_string(),
            ModPermission::Containers(ids) => {
                serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
            }
        }
    }

    /// Whether this grant is switched on at all.
    pub fn is_granted(&self) -> bool {
        match self {
            ModPermission::Denied => false,
            ModPermission::Containers(ids) => !ids.is_empty(),
            ModPermission::Allowed | ModPermission::Global => true,
        }
    }

    /// Whether this grant covers the given container.
    pub fn covers(&self, container_id: i64) -> bool {
        match self {
            ModPermission::Allowed | ModPermission::Global => true,
            ModPermission::Containers(ids) => ids.contains(&container_id),
            ModPermission::Denied => false,
        }
    }
}

pub fn mod_permission(
    conn: &Connection,
    member_id: i64,
    key: &str,
) -> Result<ModPermission, SolvestatError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM mod_permissions WHERE member_id = ?1 AND perm_key = ?2",
            params![member_id, key],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(v) => ModPermission::parse(&v),
        None => Ok(ModPermission::Denied),
    }
}

/// True when `member_id` holds `global_key` and the kind's container-scoped
/// moderator permission covers `container_id`.
pub fn is_container_moderator(
    conn: &Connection,
    kind: &ContentKind,
    member_id: i64,
    global_key: &str,
    container_id: i64,
) -> Result<bool, SolvestatError> {
    if member_id <= 0 {
        return Ok(false);
    }
    if !mod_permission(conn, member_id, global_key)?.is_granted() {
        return Ok(false);
    }
    Ok(mod_permission(conn, member_id, &kind.mod_perm)?.covers(container_id))
}

/// Whether `viewer` (None for a guest) may see this comment of `item`.
pub fn can_view_comment(
    conn: &Connection,
    kind: &ContentKind,
    viewer: Option<i64>,
    item: &Item,
    comment: &Comment,
) -> Result<bool, SolvestatError> {
    if !can_view_item(conn, kind, viewer, item)? {
        return Ok(false);
    }
    if kind.comment_is_visible(comment) {
        return Ok(true);
    }
    match viewer {
        Some(member_id) => {
            is_container_moderator(conn, kind, member_id, PERM_VIEW_HIDDEN, item.container_id)
        }
        None => Ok(false),
    }
}

/// Whether `viewer` may see the item itself.
pub fn can_view_item(
    conn: &Connection,
    kind: &ContentKind,
    viewer: Option<i64>,
    item: &Item,
) -> Result<bool, SolvestatError> {
    if item.approved && !item.hidden {
        return Ok(true);
    }
    match viewer {
        Some(member_id) => {
            is_container_moderator(conn, kind, member_id, PERM_VIEW_HIDDEN, item.container_id)
        }
        None => Ok(false),
    }
}

pub fn set_mod_permission(
    store: &Store,
    member_id: i64,
    key: &str,
    value: &ModPermission,
) -> Result<(), SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "permissions.set", |conn| {
        conn.execute(
            "INSERT INTO mod_permissions(member_id, perm_key, value) VALUES(?1, ?2, ?3)
             ON CONFLICT(member_id, perm_key) DO UPDATE SET value = excluded.value",
            params![member_id, key, value.encode()],
        )?;
        Ok(())
    })
}
