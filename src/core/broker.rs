use crate::core::db;
use crate::core::error;
use crate::core::time;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Name of the append-only audit log kept at the store root.
pub const AUDIT_LOG_NAME: &str = "broker.events.jsonl";

/// The DB Broker is the single entry point for state access.
/// Calls are serialized in-process and every call appends an audit record.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

static DB_LOCK: Mutex<()> = Mutex::new(());

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join(AUDIT_LOG_NAME),
        }
    }

    /// Execute a closure with a serialized connection to the specified DB.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, error::SolvestatError>
    where
        F: FnOnce(&Connection) -> Result<R, error::SolvestatError>,
    {
        // The guard protects no data, so a poisoned lock is still usable.
        let _lock = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let conn = db::db_connect(&db_path.to_string_lossy())?;
        let result = f(&conn);

        self.record(actor, op_name, db_path, status_of(&result));
        result
    }

    /// Execute a closure inside an IMMEDIATE transaction. The transaction
    /// commits when the closure returns `Ok` and rolls back otherwise.
    pub fn with_tx<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, error::SolvestatError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, error::SolvestatError>,
    {
        let _lock = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let mut conn = db::db_connect(&db_path.to_string_lossy())?;
        let result: Result<R, error::SolvestatError> = (|| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })();

        self.record(actor, op_name, db_path, status_of(&result));
        result
    }

    /// Append the audit record. The closure's writes are already committed
    /// at this point, so a failed append is reported but never changes the
    /// caller's result.
    fn record(&self, actor: &str, op: &str, db_path: &Path, status: &str) {
        if let Err(e) = self.log_event(actor, op, db_path, status) {
            tracing::warn!(op, status, error = %e, "failed to append broker audit event");
        }
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        db_path: &Path,
        status: &str,
    ) -> Result<(), error::SolvestatError> {
        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            db_id: db_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(error::SolvestatError::IoError)?;

        writeln!(f, "{}", serde_json::to_string(&ev)?).map_err(error::SolvestatError::IoError)?;
        Ok(())
    }
}

fn status_of<R>(result: &Result<R, error::SolvestatError>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}

/// Read back the audit log, oldest first.
pub fn read_audit_log(root: &Path) -> Result<Vec<BrokerEvent>, error::SolvestatError> {
    let path = root.join(AUDIT_LOG_NAME);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(&path)?;
    let mut out = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        out.push(serde_json::from_str(line)?);
    }
    Ok(out)
}
