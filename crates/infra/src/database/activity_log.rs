//! Append-only activity trail in the `activities` table.

use std::sync::Arc;

use async_trait::async_trait;
use dealflow_core::ActivityLog;
use dealflow_domain::{ActivityEntry, EntityRef, Result};
use rusqlite::params;
use tokio::task;
use tracing::debug;

use super::manager::DbManager;
use super::rows::ts;
use crate::errors::{map_join_error, map_sql_error};

/// [`ActivityLog`] backed by SQLite.
///
/// Entries are written on their own connection after the business
/// transaction has committed.
#[derive(Clone)]
pub struct SqliteActivityLog {
    db: Arc<DbManager>,
}

impl SqliteActivityLog {
    /// Construct a log backed by the shared database manager.
    pub const fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Titles recorded for `target`, oldest first.
    pub async fn titles_for(&self, target: EntityRef) -> Result<Vec<String>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<Vec<String>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT title FROM activities WHERE target_kind = ?1 AND target_id = ?2
                     ORDER BY occurred_at, rowid",
                )
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![target.kind().as_str(), target.id().to_string()], |row| {
                    row.get(0)
                })
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<String>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ActivityLog for SqliteActivityLog {
    async fn record(&self, entry: ActivityEntry) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO activities (id, target_kind, target_id, target_name, title, body,
                    actor_id, actor_name, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.id.to_string(),
                    entry.target.kind().as_str(),
                    entry.target.id().to_string(),
                    entry.target_name,
                    entry.title,
                    entry.body,
                    entry.actor_id,
                    entry.actor_name,
                    ts(&entry.occurred_at),
                ],
            )
            .map_err(map_sql_error)?;
            debug!(target_ref = %entry.target, title = %entry.title, "activity recorded");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}
