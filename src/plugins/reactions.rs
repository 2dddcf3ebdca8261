use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::SolvestatError;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::content::{self, ContentKind};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

/// Reactions received by one comment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionCount {
    pub comment_id: i64,
    pub sum: i64,
}

/// Reaction totals per comment of an item, highest first. Ties keep ascending
/// comment id order.
pub fn reaction_counts(
    conn: &Connection,
    kind: &ContentKind,
    item_id: i64,
) -> Result<Vec<ReactionCount>, SolvestatError> {
    let mut stmt = conn.prepare(
        "SELECT type_id, COUNT(*) AS reactions FROM reputation_index
         WHERE app = ?1 AND type = ?2 AND item_id = ?3
         GROUP BY type_id ORDER BY type_id",
    )?;
    let rows = stmt.query_map(params![kind.app, kind.reaction_type, item_id], |row| {
        Ok(ReactionCount {
            comment_id: row.get(0)?,
            sum: row.get(1)?,
        })
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    out.sort_by(|a, b| b.sum.cmp(&a.sum));
    Ok(out)
}

pub fn add_reaction(
    store: &Store,
    kind: &ContentKind,
    comment_id: i64,
    member_id: i64,
) -> Result<(), SolvestatError> {
    if !kind.reactable {
        return Err(SolvestatError::Unsupported(format!(
            "{} does not support reactions",
            kind.comment_class
        )));
    }
    let broker = DbBroker::new(&store.root);
    let db_path = db::content_db_path(&store.root);
    broker.with_conn(&db_path, "solvestat", "reactions.add", |conn| {
        let comment = content::load_comment(conn, comment_id)?;
        conn.execute(
            "INSERT INTO reputation_index(app, type, type_id, item_id, member_id, rep_date)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                kind.app,
                kind.reaction_type,
                comment.id,
                comment.item_id,
                member_id,
                time::now_epoch()
            ],
        )?;
        Ok(())
    })
}
