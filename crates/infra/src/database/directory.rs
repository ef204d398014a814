//! Customer and user lookup over the `customers` and `users` tables.
//!
//! Services resolve contacts while holding a store transaction, so this
//! directory should run on its own [`DbManager`] rather than the store's pool.
//! WAL mode lets these reads proceed while a writer holds the lock.

use std::sync::Arc;

use async_trait::async_trait;
use dealflow_core::ContactDirectory;
use dealflow_domain::{CustomerRef, Result, UserRef};
use rusqlite::{params, OptionalExtension};
use tokio::task;
use uuid::Uuid;

use super::manager::DbManager;
use crate::errors::{map_join_error, map_sql_error};

/// [`ContactDirectory`] backed by SQLite.
#[derive(Clone)]
pub struct SqliteContactDirectory {
    db: Arc<DbManager>,
}

impl SqliteContactDirectory {
    /// Construct a directory over a read pool.
    pub const fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or replace a customer record.
    pub async fn upsert_customer(&self, customer: CustomerRef) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO customers (id, name, company_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, company_id = excluded.company_id",
                params![customer.id.to_string(), customer.name, customer.company_id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    /// Insert or replace a user record.
    pub async fn upsert_user(&self, user: UserRef) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO users (id, display_name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name",
                params![user.id, user.display_name],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ContactDirectory for SqliteContactDirectory {
    async fn find_customer(&self, id: Uuid) -> Result<Option<CustomerRef>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<Option<CustomerRef>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT name, company_id FROM customers WHERE id = ?1",
                params![id.to_string()],
                |row| Ok(CustomerRef { id, name: row.get(0)?, company_id: row.get(1)? }),
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_user(&self, id: &str) -> Result<Option<UserRef>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        task::spawn_blocking(move || -> Result<Option<UserRef>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT display_name FROM users WHERE id = ?1",
                params![id],
                |row| Ok(UserRef { id: id.clone(), display_name: row.get(0)? }),
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}
