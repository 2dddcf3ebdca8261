//! Attachments linked to comments through the framework's attachment map.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::SolvestatError;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::content::{self, ContentKind};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub id: i64,
    pub file_name: String,
    pub ext: String,
    pub size: i64,
    pub hits: i64,
    pub is_image: bool,
    pub member_id: i64,
    pub date: i64,
    /// Comment the attachment was posted in.
    pub comment_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewAttachment<'a> {
    pub file_name: &'a str,
    pub size: i64,
    pub hits: i64,
    pub is_image: bool,
    pub member_id: i64,
}

/// Attachments of the item's visible comments, in attachment id order.
pub fn visible_attachments(
    conn: &Connection,
    kind: &ContentKind,
    item_id: i64,
    images_only: bool,
) -> Result<Vec<Attachment>, SolvestatError> {
    let visible: String = kind
        .visible_predicates()
        .iter()
        .map(|p| format!(" AND {p}"))
        .collect();
    let image_filter = if images_only { " AND a.is_image = 1" } else { "" };
    let sql = format!(
        "SELECT a.attach_id, a.file_name, a.ext, a.size, a.hits, a.is_image, a.member_id, a.date, m.id2
         FROM attachments_map m
         JOIN attachments a ON a.attach_id = m.attachment_id
         WHERE m.location_key = ?1 AND m.id1 = ?2
           AND m.id2 IN (SELECT id FROM comments WHERE item_id = ?2{visible}){image_filter}
         ORDER BY a.attach_id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![kind.location_key(), item_id], |row| {
        Ok(Attachment {
            id: row.get(0)?,
            file_name: row.get(1)?,
            ext: row.get(2)?,
            size: row.get(3)?,
            hits: row.get(4)?,
            is_image: row.get(5)?,
            member_id: row.get(6)?,
            date: row.get(7)?,
            comment_id: row.get(8)?,
        })
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Record an attachment and link it to a comment of `kind`.
pub fn attach(
    store: &Store,
    kind: &ContentKind,
    comment_id: i64,
    new: NewAttachment<'_>,
) -> Result<i64, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "attachments.attach", |conn| {
        let comment = content::load_comment(conn, comment_id)?;
        conn.execute(
            "INSERT INTO attachments(file_name, ext, size, hits, is_image, member_id, date)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.file_name,
                extension_of(new.file_name),
                new.size,
                new.hits,
                new.is_image,
                new.member_id,
                time::now_epoch()
            ],
        )?;
        let attach_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO attachments_map(attachment_id, location_key, id1, id2) VALUES(?1, ?2, ?3, ?4)",
            params![attach_id, kind.location_key(), comment.item_id, comment.id],
        )?;
        Ok(attach_id)
    })
}
