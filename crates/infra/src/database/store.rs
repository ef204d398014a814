//! SQLite-backed transactional store.
//!
//! [`SqliteStore::begin`] checks out one pooled connection and opens a
//! `BEGIN IMMEDIATE` transaction on it, so concurrent writers queue on the
//! database write lock instead of failing on upgrade. Every [`SqliteTx`]
//! statement runs on the blocking pool; the connection is moved into the
//! blocking task and handed back afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dealflow_core::{Store, StoreTx};
use dealflow_domain::{
    BudgetLineItem, BudgetParent, Deal, DealStage, DealStageHistory, DealflowError, LossReason,
    Offer, Project, Result,
};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use tokio::task;
use tracing::{debug, warn};
use uuid::Uuid;

use super::manager::{DbConnection, DbManager};
use super::rows::{
    map_budget_line, map_deal, map_history, map_offer, map_project, opt_id, opt_ts, ts,
    BUDGET_LINE_COLUMNS, DEAL_COLUMNS, HISTORY_COLUMNS, OFFER_COLUMNS, PROJECT_COLUMNS,
};
use crate::errors::{map_join_error, map_sql_error};

/// [`Store`] over the shared SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<DbManager>,
}

impl SqliteStore {
    /// Construct a store backed by the shared database manager.
    pub const fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let db = Arc::clone(&self.db);
        let conn = task::spawn_blocking(move || -> Result<DbConnection> {
            let conn = db.get_connection()?;
            if !conn.is_autocommit() {
                warn!("pooled connection returned with an open transaction; rolling back");
                conn.execute_batch("ROLLBACK").map_err(map_sql_error)?;
            }
            conn.execute_batch("BEGIN IMMEDIATE").map_err(map_sql_error)?;
            Ok(conn)
        })
        .await
        .map_err(map_join_error)??;

        Ok(Box::new(SqliteTx { conn: Some(conn) }))
    }
}

/// One open SQLite transaction.
///
/// Dropping it without [`StoreTx::commit`] rolls the transaction back.
pub struct SqliteTx {
    conn: Option<DbConnection>,
}

impl SqliteTx {
    async fn run<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| DealflowError::Internal("transaction already finished".into()))?;

        let (conn, result) = task::spawn_blocking(move || {
            let result = op(&conn);
            (conn, result)
        })
        .await
        .map_err(map_join_error)?;

        self.conn = Some(conn);
        result
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if conn.is_autocommit() {
            return;
        }
        match conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("uncommitted transaction rolled back"),
            Err(err) => warn!(error = %err, "failed to roll back uncommitted transaction"),
        }
    }
}

fn query_optional<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Option<T>>
where
    P: Params,
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    conn.query_row(sql, params, map).optional().map_err(map_sql_error)
}

fn query_list<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).map_err(map_sql_error)?;
    let rows = stmt.query_map(params, map).map_err(map_sql_error)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

/// Fail with `NotFound` when a keyed write touched no row.
fn touched(changed: usize, entity: &str, id: Uuid) -> Result<()> {
    if changed == 0 {
        return Err(DealflowError::not_found(entity, id));
    }
    Ok(())
}

fn count(changed: usize) -> u64 {
    u64::try_from(changed).unwrap_or(u64::MAX)
}

/* -------------------------------------------------------------------------- */
/* Statements */
/* -------------------------------------------------------------------------- */

fn write_deal(conn: &Connection, deal: &Deal, insert: bool) -> Result<usize> {
    let sql = if insert {
        "INSERT INTO deals (id, title, description, customer_id, customer_name, company_id,
            stage, probability, value, currency, owner_id, owner_name, offer_id,
            expected_close_date, actual_close_date, lost_reason_category, lost_reason, notes,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
            ?18, ?19, ?20)"
    } else {
        "UPDATE deals SET title = ?2, description = ?3, customer_id = ?4, customer_name = ?5,
            company_id = ?6, stage = ?7, probability = ?8, value = ?9, currency = ?10,
            owner_id = ?11, owner_name = ?12, offer_id = ?13, expected_close_date = ?14,
            actual_close_date = ?15, lost_reason_category = ?16, lost_reason = ?17, notes = ?18,
            created_at = ?19, updated_at = ?20
         WHERE id = ?1"
    };
    conn.execute(
        sql,
        params![
            deal.id.to_string(),
            deal.title,
            deal.description,
            deal.customer_id.to_string(),
            deal.customer_name,
            deal.company_id,
            deal.stage.as_str(),
            deal.probability,
            deal.value,
            deal.currency,
            deal.owner_id,
            deal.owner_name,
            opt_id(deal.offer_id),
            opt_ts(deal.expected_close_date.as_ref()),
            opt_ts(deal.actual_close_date.as_ref()),
            deal.lost_reason_category.map(LossReason::as_str),
            deal.lost_reason,
            deal.notes,
            ts(&deal.created_at),
            ts(&deal.updated_at),
        ],
    )
    .map_err(map_sql_error)
}

fn write_offer(conn: &Connection, offer: &Offer, insert: bool) -> Result<usize> {
    let sql = if insert {
        "INSERT INTO offers (id, title, offer_number, external_reference, customer_id,
            customer_name, project_id, company_id, phase, probability, value, cost,
            margin_percent, responsible_id, responsible_name, description, notes, location,
            sent_date, expiration_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
            ?18, ?19, ?20, ?21, ?22)"
    } else {
        "UPDATE offers SET title = ?2, offer_number = ?3, external_reference = ?4,
            customer_id = ?5, customer_name = ?6, project_id = ?7, company_id = ?8, phase = ?9,
            probability = ?10, value = ?11, cost = ?12, margin_percent = ?13,
            responsible_id = ?14, responsible_name = ?15, description = ?16, notes = ?17,
            location = ?18, sent_date = ?19, expiration_date = ?20, created_at = ?21,
            updated_at = ?22
         WHERE id = ?1"
    };
    conn.execute(
        sql,
        params![
            offer.id.to_string(),
            offer.title,
            offer.offer_number,
            offer.external_reference,
            offer.customer_id.to_string(),
            offer.customer_name,
            opt_id(offer.project_id),
            offer.company_id,
            offer.phase.as_str(),
            offer.probability,
            offer.value,
            offer.cost,
            offer.margin_percent,
            offer.responsible_id,
            offer.responsible_name,
            offer.description,
            offer.notes,
            offer.location,
            opt_ts(offer.sent_date.as_ref()),
            opt_ts(offer.expiration_date.as_ref()),
            ts(&offer.created_at),
            ts(&offer.updated_at),
        ],
    )
    .map_err(map_sql_error)
}

fn write_project(conn: &Connection, project: &Project, insert: bool) -> Result<usize> {
    let sql = if insert {
        "INSERT INTO projects (id, name, project_number, summary, description, customer_id,
            customer_name, company_id, phase, start_date, end_date, location, deal_id,
            external_reference, value, cost, has_detailed_budget, responsible_id,
            responsible_name, winning_offer_id, winning_offer_number, won_at, created_at,
            updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
            ?18, ?19, ?20, ?21, ?22, ?23, ?24)"
    } else {
        "UPDATE projects SET name = ?2, project_number = ?3, summary = ?4, description = ?5,
            customer_id = ?6, customer_name = ?7, company_id = ?8, phase = ?9, start_date = ?10,
            end_date = ?11, location = ?12, deal_id = ?13, external_reference = ?14, value = ?15,
            cost = ?16, has_detailed_budget = ?17, responsible_id = ?18, responsible_name = ?19,
            winning_offer_id = ?20, winning_offer_number = ?21, won_at = ?22, created_at = ?23,
            updated_at = ?24
         WHERE id = ?1"
    };
    conn.execute(
        sql,
        params![
            project.id.to_string(),
            project.name,
            project.project_number,
            project.summary,
            project.description,
            opt_id(project.customer_id),
            project.customer_name,
            project.company_id,
            project.phase.as_str(),
            opt_ts(project.start_date.as_ref()),
            opt_ts(project.end_date.as_ref()),
            project.location,
            opt_id(project.deal_id),
            project.external_reference,
            project.value,
            project.cost,
            project.has_detailed_budget,
            project.responsible_id,
            project.responsible_name,
            opt_id(project.winning_offer_id),
            project.winning_offer_number,
            opt_ts(project.won_at.as_ref()),
            ts(&project.created_at),
            ts(&project.updated_at),
        ],
    )
    .map_err(map_sql_error)
}

fn write_budget_line(conn: &Connection, line: &BudgetLineItem, insert: bool) -> Result<usize> {
    let sql = if insert {
        "INSERT INTO budget_lines (id, parent_kind, parent_id, name, cost, revenue,
            margin_override, target_margin_percent, quantity, unit, price_per_item, description,
            display_order, source_line_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
    } else {
        "UPDATE budget_lines SET parent_kind = ?2, parent_id = ?3, name = ?4, cost = ?5,
            revenue = ?6, margin_override = ?7, target_margin_percent = ?8, quantity = ?9,
            unit = ?10, price_per_item = ?11, description = ?12, display_order = ?13,
            source_line_id = ?14, created_at = ?15, updated_at = ?16
         WHERE id = ?1"
    };
    conn.execute(
        sql,
        params![
            line.id.to_string(),
            line.parent.kind().as_str(),
            line.parent.id().to_string(),
            line.name,
            line.cost,
            line.revenue,
            line.margin_override,
            line.target_margin_percent,
            line.quantity,
            line.unit,
            line.price_per_item,
            line.description,
            line.display_order,
            opt_id(line.source_line_id),
            ts(&line.created_at),
            ts(&line.updated_at),
        ],
    )
    .map_err(map_sql_error)
}

/* -------------------------------------------------------------------------- */
/* StoreTx */
/* -------------------------------------------------------------------------- */

#[async_trait]
impl StoreTx for SqliteTx {
    async fn get_deal(&mut self, id: Uuid) -> Result<Option<Deal>> {
        self.run(move |conn| {
            let sql = format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?1");
            query_optional(conn, &sql, params![id.to_string()], map_deal)
        })
        .await
    }

    async fn list_deals(&mut self, stage: Option<DealStage>) -> Result<Vec<Deal>> {
        self.run(move |conn| match stage {
            Some(stage) => {
                let sql = format!(
                    "SELECT {DEAL_COLUMNS} FROM deals WHERE stage = ?1 ORDER BY created_at, id"
                );
                query_list(conn, &sql, params![stage.as_str()], map_deal)
            }
            None => {
                let sql = format!("SELECT {DEAL_COLUMNS} FROM deals ORDER BY created_at, id");
                query_list(conn, &sql, [], map_deal)
            }
        })
        .await
    }

    async fn insert_deal(&mut self, deal: &Deal) -> Result<()> {
        let deal = deal.clone();
        self.run(move |conn| write_deal(conn, &deal, true).map(drop)).await
    }

    async fn update_deal(&mut self, deal: &Deal) -> Result<()> {
        let deal = deal.clone();
        self.run(move |conn| touched(write_deal(conn, &deal, false)?, "deal", deal.id)).await
    }

    async fn delete_deal(&mut self, id: Uuid) -> Result<()> {
        self.run(move |conn| {
            let changed = conn
                .execute("DELETE FROM deals WHERE id = ?1", params![id.to_string()])
                .map_err(map_sql_error)?;
            touched(changed, "deal", id)
        })
        .await
    }

    async fn append_stage_history(&mut self, entry: &DealStageHistory) -> Result<()> {
        let entry = entry.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO deal_stage_history (id, deal_id, from_stage, to_stage, changed_by_id,
                    changed_by_name, notes, changed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.id.to_string(),
                    entry.deal_id.to_string(),
                    entry.from_stage.map(DealStage::as_str),
                    entry.to_stage.as_str(),
                    entry.changed_by_id,
                    entry.changed_by_name,
                    entry.notes,
                    ts(&entry.changed_at),
                ],
            )
            .map(drop)
            .map_err(map_sql_error)
        })
        .await
    }

    async fn list_stage_history(&mut self, deal_id: Uuid) -> Result<Vec<DealStageHistory>> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT {HISTORY_COLUMNS} FROM deal_stage_history WHERE deal_id = ?1
                 ORDER BY changed_at, rowid"
            );
            query_list(conn, &sql, params![deal_id.to_string()], map_history)
        })
        .await
    }

    async fn delete_stage_history(&mut self, deal_id: Uuid) -> Result<u64> {
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM deal_stage_history WHERE deal_id = ?1",
                params![deal_id.to_string()],
            )
            .map(count)
            .map_err(map_sql_error)
        })
        .await
    }

    async fn get_offer(&mut self, id: Uuid) -> Result<Option<Offer>> {
        self.run(move |conn| {
            let sql = format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?1");
            query_optional(conn, &sql, params![id.to_string()], map_offer)
        })
        .await
    }

    async fn insert_offer(&mut self, offer: &Offer) -> Result<()> {
        let offer = offer.clone();
        self.run(move |conn| write_offer(conn, &offer, true).map(drop)).await
    }

    async fn update_offer(&mut self, offer: &Offer) -> Result<()> {
        let offer = offer.clone();
        self.run(move |conn| touched(write_offer(conn, &offer, false)?, "offer", offer.id)).await
    }

    async fn delete_offer(&mut self, id: Uuid) -> Result<()> {
        self.run(move |conn| {
            let changed = conn
                .execute("DELETE FROM offers WHERE id = ?1", params![id.to_string()])
                .map_err(map_sql_error)?;
            touched(changed, "offer", id)
        })
        .await
    }

    async fn list_offers_by_project(&mut self, project_id: Uuid) -> Result<Vec<Offer>> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT {OFFER_COLUMNS} FROM offers WHERE project_id = ?1 ORDER BY created_at, id"
            );
            query_list(conn, &sql, params![project_id.to_string()], map_offer)
        })
        .await
    }

    async fn find_offer_by_number(
        &mut self,
        company_id: &str,
        number: &str,
    ) -> Result<Option<Offer>> {
        let (company_id, number) = (company_id.to_string(), number.to_string());
        self.run(move |conn| {
            let sql = format!(
                "SELECT {OFFER_COLUMNS} FROM offers WHERE company_id = ?1 AND offer_number = ?2"
            );
            query_optional(conn, &sql, params![company_id, number], map_offer)
        })
        .await
    }

    async fn find_offer_by_external_reference(
        &mut self,
        company_id: &str,
        reference: &str,
    ) -> Result<Option<Offer>> {
        let (company_id, reference) = (company_id.to_string(), reference.to_string());
        self.run(move |conn| {
            let sql = format!(
                "SELECT {OFFER_COLUMNS} FROM offers
                 WHERE company_id = ?1 AND external_reference = ?2"
            );
            query_optional(conn, &sql, params![company_id, reference], map_offer)
        })
        .await
    }

    async fn get_project(&mut self, id: Uuid) -> Result<Option<Project>> {
        self.run(move |conn| {
            let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
            query_optional(conn, &sql, params![id.to_string()], map_project)
        })
        .await
    }

    async fn insert_project(&mut self, project: &Project) -> Result<()> {
        let project = project.clone();
        self.run(move |conn| write_project(conn, &project, true).map(drop)).await
    }

    async fn update_project(&mut self, project: &Project) -> Result<()> {
        let project = project.clone();
        self.run(move |conn| {
            touched(write_project(conn, &project, false)?, "project", project.id)
        })
        .await
    }

    async fn delete_project(&mut self, id: Uuid) -> Result<()> {
        self.run(move |conn| {
            let changed = conn
                .execute("DELETE FROM projects WHERE id = ?1", params![id.to_string()])
                .map_err(map_sql_error)?;
            touched(changed, "project", id)
        })
        .await
    }

    async fn find_project_by_number(&mut self, number: &str) -> Result<Option<Project>> {
        let number = number.to_string();
        self.run(move |conn| {
            let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_number = ?1");
            query_optional(conn, &sql, params![number], map_project)
        })
        .await
    }

    async fn get_budget_line(&mut self, id: Uuid) -> Result<Option<BudgetLineItem>> {
        self.run(move |conn| {
            let sql = format!("SELECT {BUDGET_LINE_COLUMNS} FROM budget_lines WHERE id = ?1");
            query_optional(conn, &sql, params![id.to_string()], map_budget_line)
        })
        .await
    }

    async fn list_budget_lines(&mut self, parent: BudgetParent) -> Result<Vec<BudgetLineItem>> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT {BUDGET_LINE_COLUMNS} FROM budget_lines
                 WHERE parent_kind = ?1 AND parent_id = ?2
                 ORDER BY display_order, created_at, id"
            );
            query_list(
                conn,
                &sql,
                params![parent.kind().as_str(), parent.id().to_string()],
                map_budget_line,
            )
        })
        .await
    }

    async fn insert_budget_line(&mut self, line: &BudgetLineItem) -> Result<()> {
        let line = line.clone();
        self.run(move |conn| write_budget_line(conn, &line, true).map(drop)).await
    }

    async fn update_budget_line(&mut self, line: &BudgetLineItem) -> Result<()> {
        let line = line.clone();
        self.run(move |conn| {
            touched(write_budget_line(conn, &line, false)?, "budget_line", line.id)
        })
        .await
    }

    async fn delete_budget_line(&mut self, id: Uuid) -> Result<()> {
        self.run(move |conn| {
            let changed = conn
                .execute("DELETE FROM budget_lines WHERE id = ?1", params![id.to_string()])
                .map_err(map_sql_error)?;
            touched(changed, "budget_line", id)
        })
        .await
    }

    async fn delete_budget_lines(&mut self, parent: BudgetParent) -> Result<u64> {
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM budget_lines WHERE parent_kind = ?1 AND parent_id = ?2",
                params![parent.kind().as_str(), parent.id().to_string()],
            )
            .map(count)
            .map_err(map_sql_error)
        })
        .await
    }

    async fn next_sequence(&mut self, company_id: &str, year: i32) -> Result<u32> {
        let company_id = company_id.to_string();
        self.run(move |conn| {
            conn.query_row(
                "INSERT INTO number_sequences (company_id, year, last_sequence, updated_at)
                 VALUES (?1, ?2, 1, ?3)
                 ON CONFLICT(company_id, year) DO UPDATE
                    SET last_sequence = last_sequence + 1, updated_at = excluded.updated_at
                 RETURNING last_sequence",
                params![company_id, year, ts(&Utc::now())],
                |row| row.get::<_, u32>(0),
            )
            .map_err(map_sql_error)
        })
        .await
    }

    async fn current_sequence(&mut self, company_id: &str, year: i32) -> Result<u32> {
        let company_id = company_id.to_string();
        self.run(move |conn| {
            let current = query_optional(
                conn,
                "SELECT last_sequence FROM number_sequences WHERE company_id = ?1 AND year = ?2",
                params![company_id, year],
                |row| row.get::<_, u32>(0),
            )?;
            Ok(current.unwrap_or(0))
        })
        .await
    }

    async fn reset_sequence(&mut self, company_id: &str, year: i32, value: u32) -> Result<()> {
        let company_id = company_id.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO number_sequences (company_id, year, last_sequence, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(company_id, year) DO UPDATE
                    SET last_sequence = excluded.last_sequence, updated_at = excluded.updated_at",
                params![company_id, year, value, ts(&Utc::now())],
            )
            .map(drop)
            .map_err(map_sql_error)
        })
        .await
    }

    async fn raise_sequence(&mut self, company_id: &str, year: i32, value: u32) -> Result<()> {
        let company_id = company_id.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO number_sequences (company_id, year, last_sequence, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(company_id, year) DO UPDATE
                    SET last_sequence = MAX(last_sequence, excluded.last_sequence),
                        updated_at = excluded.updated_at",
                params![company_id, year, value, ts(&Utc::now())],
            )
            .map(drop)
            .map_err(map_sql_error)
        })
        .await
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.run(|conn| conn.execute_batch("COMMIT").map_err(map_sql_error)).await
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.run(|conn| conn.execute_batch("ROLLBACK").map_err(map_sql_error)).await
    }
}
