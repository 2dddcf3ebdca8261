//! Queued member notifications raised by the solve engine.
//!
//! Only `best_answer` is produced: the author of a comment that becomes an
//! item's accepted solution is told about it. Delivery is someone else's job;
//! this module only queues and renders.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::SolvestatError;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

pub const BEST_ANSWER: &str = "best_answer";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationView {
    pub id: i64,
    pub key: String,
    pub title: String,
    pub item_id: i64,
    pub comment_id: Option<i64>,
    pub sent_at: i64,
    pub read: bool,
}

pub fn best_answer_title(item_title: &str) -> String {
    format!("Your post in \"{}\" was marked as the best answer", item_title)
}

pub(crate) fn queue_best_answer(
    conn: &Connection,
    item_class: &str,
    member_id: i64,
    item_id: i64,
    comment_id: i64,
) -> Result<(), SolvestatError> {
    conn.execute(
        "INSERT INTO notifications(member_id, notification_key, item_class, item_id, comment_id, sent_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            member_id,
            BEST_ANSWER,
            item_class,
            item_id,
            comment_id,
            time::now_epoch()
        ],
    )?;
    Ok(())
}

/// Notifications for a member, newest first. Notices whose item has since
/// been removed are skipped.
pub fn list_for_member(
    store: &Store,
    member_id: i64,
) -> Result<Vec<NotificationView>, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "notifications.list", |conn| {
        let mut stmt = conn.prepare(
            "SELECT n.id, n.notification_key, i.title, n.item_id, n.comment_id, n.sent_at, n.read_at
             FROM notifications n
             JOIN items i ON i.id = n.item_id
             WHERE n.member_id = ?1
             ORDER BY n.sent_at DESC, n.id DESC",
        )?;
        let rows = stmt.query_map([member_id], |row| {
            let key: String = row.get(1)?;
            let item_title: String = row.get(2)?;
            let read_at: Option<i64> = row.get(6)?;
            Ok(NotificationView {
                id: row.get(0)?,
                title: render_title(&key, &item_title),
                key,
                item_id: row.get(3)?,
                comment_id: row.get(4)?,
                sent_at: row.get(5)?,
                read: read_at.is_some(),
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Mark every unread notification of a member as read. Returns how many changed.
pub fn mark_all_read(store: &Store, member_id: i64) -> Result<usize, SolvestatError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "notifications.read", |conn| {
        let changed = conn.execute(
            "UPDATE notifications SET read_at = ?1 WHERE member_id = ?2 AND read_at IS NULL",
            params![time::now_epoch(), member_id],
        )?;
        Ok(changed)
    })
}

fn render_title(key: &str, item_title: &str) -> String {
    match key {
        BEST_ANSWER => best_answer_title(item_title),
        other => format!("{}: {}", other, item_title),
    }
}
