use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, error::SolvestatError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::SolvestatError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::SolvestatError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::SolvestatError::RusqliteError)?;
    Ok(conn)
}

pub fn content_db_path(root: &Path) -> PathBuf {
    root.join(schemas::CONTENT_DB_NAME)
}

pub fn initialize_content_db(root: &Path) -> Result<(), error::SolvestatError> {
    fs::create_dir_all(root).map_err(|e| {
        error::SolvestatError::DatabaseInitializationError(format!(
            "cannot create store root {}: {}",
            root.display(),
            e
        ))
    })?;

    let db_path = content_db_path(root);
    let broker = DbBroker::new(root);
    broker.with_conn(&db_path, "solvestat", "content.init", |conn| {
        for stmt in schemas::CONTENT_DB_SCHEMAS {
            conn.execute(stmt, [])?;
        }
        Ok(())
    })?;

    tracing::debug!(path = %db_path.display(), "content database initialized");
    Ok(())
}
