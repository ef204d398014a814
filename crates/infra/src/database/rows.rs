//! Row mapping between SQLite columns and domain entities.
//!
//! Identifiers are stored as UUID strings, timestamps as fixed-width RFC 3339
//! strings so lexical order equals chronological order, and lifecycle enums
//! as their canonical lowercase names.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use dealflow_domain::{
    BudgetLineItem, BudgetParent, BudgetParentKind, Deal, DealStageHistory, Offer, Project,
};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

pub(crate) const DEAL_COLUMNS: &str = "id, title, description, customer_id, customer_name, \
     company_id, stage, probability, value, currency, owner_id, owner_name, offer_id, \
     expected_close_date, actual_close_date, lost_reason_category, lost_reason, notes, \
     created_at, updated_at";

pub(crate) const HISTORY_COLUMNS: &str =
    "id, deal_id, from_stage, to_stage, changed_by_id, changed_by_name, notes, changed_at";

pub(crate) const OFFER_COLUMNS: &str = "id, title, offer_number, external_reference, \
     customer_id, customer_name, project_id, company_id, phase, probability, value, cost, \
     margin_percent, responsible_id, responsible_name, description, notes, location, \
     sent_date, expiration_date, created_at, updated_at";

pub(crate) const PROJECT_COLUMNS: &str = "id, name, project_number, summary, description, \
     customer_id, customer_name, company_id, phase, start_date, end_date, location, deal_id, \
     external_reference, value, cost, has_detailed_budget, responsible_id, responsible_name, \
     winning_offer_id, winning_offer_number, won_at, created_at, updated_at";

pub(crate) const BUDGET_LINE_COLUMNS: &str = "id, parent_kind, parent_id, name, cost, revenue, \
     margin_override, target_margin_percent, quantity, unit, price_per_item, description, \
     display_order, source_line_id, created_at, updated_at";

/* -------------------------------------------------------------------------- */
/* Writing */
/* -------------------------------------------------------------------------- */

pub(crate) fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn opt_ts(value: Option<&DateTime<Utc>>) -> Option<String> {
    value.map(ts)
}

pub(crate) fn opt_id(value: Option<Uuid>) -> Option<String> {
    value.map(|id| id.to_string())
}

/* -------------------------------------------------------------------------- */
/* Reading */
/* -------------------------------------------------------------------------- */

fn conversion_error(
    idx: usize,
    cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, cause.into())
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|err| conversion_error(idx, err))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| Uuid::parse_str(&raw).map_err(|err| conversion_error(idx, err)))
        .transpose()
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| conversion_error(idx, err))
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?.map(|raw| parse_ts(idx, &raw)).transpose()
}

fn enum_at<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|err: String| conversion_error(idx, err))
}

fn opt_enum_at<T: FromStr<Err = String>>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| raw.parse().map_err(|err: String| conversion_error(idx, err)))
        .transpose()
}

pub(crate) fn map_deal(row: &Row<'_>) -> rusqlite::Result<Deal> {
    Ok(Deal {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        customer_id: uuid_at(row, 3)?,
        customer_name: row.get(4)?,
        company_id: row.get(5)?,
        stage: enum_at(row, 6)?,
        probability: row.get(7)?,
        value: row.get(8)?,
        currency: row.get(9)?,
        owner_id: row.get(10)?,
        owner_name: row.get(11)?,
        offer_id: opt_uuid_at(row, 12)?,
        expected_close_date: opt_ts_at(row, 13)?,
        actual_close_date: opt_ts_at(row, 14)?,
        lost_reason_category: opt_enum_at(row, 15)?,
        lost_reason: row.get(16)?,
        notes: row.get(17)?,
        created_at: ts_at(row, 18)?,
        updated_at: ts_at(row, 19)?,
    })
}

pub(crate) fn map_history(row: &Row<'_>) -> rusqlite::Result<DealStageHistory> {
    Ok(DealStageHistory {
        id: uuid_at(row, 0)?,
        deal_id: uuid_at(row, 1)?,
        from_stage: opt_enum_at(row, 2)?,
        to_stage: enum_at(row, 3)?,
        changed_by_id: row.get(4)?,
        changed_by_name: row.get(5)?,
        notes: row.get(6)?,
        changed_at: ts_at(row, 7)?,
    })
}

pub(crate) fn map_offer(row: &Row<'_>) -> rusqlite::Result<Offer> {
    Ok(Offer {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        offer_number: row.get(2)?,
        external_reference: row.get(3)?,
        customer_id: uuid_at(row, 4)?,
        customer_name: row.get(5)?,
        project_id: opt_uuid_at(row, 6)?,
        company_id: row.get(7)?,
        phase: enum_at(row, 8)?,
        probability: row.get(9)?,
        value: row.get(10)?,
        cost: row.get(11)?,
        margin_percent: row.get(12)?,
        responsible_id: row.get(13)?,
        responsible_name: row.get(14)?,
        description: row.get(15)?,
        notes: row.get(16)?,
        location: row.get(17)?,
        sent_date: opt_ts_at(row, 18)?,
        expiration_date: opt_ts_at(row, 19)?,
        created_at: ts_at(row, 20)?,
        updated_at: ts_at(row, 21)?,
    })
}

pub(crate) fn map_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        project_number: row.get(2)?,
        summary: row.get(3)?,
        description: row.get(4)?,
        customer_id: opt_uuid_at(row, 5)?,
        customer_name: row.get(6)?,
        company_id: row.get(7)?,
        phase: enum_at(row, 8)?,
        start_date: opt_ts_at(row, 9)?,
        end_date: opt_ts_at(row, 10)?,
        location: row.get(11)?,
        deal_id: opt_uuid_at(row, 12)?,
        external_reference: row.get(13)?,
        value: row.get(14)?,
        cost: row.get(15)?,
        has_detailed_budget: row.get(16)?,
        responsible_id: row.get(17)?,
        responsible_name: row.get(18)?,
        winning_offer_id: opt_uuid_at(row, 19)?,
        winning_offer_number: row.get(20)?,
        won_at: opt_ts_at(row, 21)?,
        created_at: ts_at(row, 22)?,
        updated_at: ts_at(row, 23)?,
    })
}

pub(crate) fn map_budget_line(row: &Row<'_>) -> rusqlite::Result<BudgetLineItem> {
    let kind: BudgetParentKind = enum_at(row, 1)?;
    Ok(BudgetLineItem {
        id: uuid_at(row, 0)?,
        parent: BudgetParent::from_parts(kind, uuid_at(row, 2)?),
        name: row.get(3)?,
        cost: row.get(4)?,
        revenue: row.get(5)?,
        margin_override: row.get(6)?,
        target_margin_percent: row.get(7)?,
        quantity: row.get(8)?,
        unit: row.get(9)?,
        price_per_item: row.get(10)?,
        description: row.get(11)?,
        display_order: row.get(12)?,
        source_line_id: opt_uuid_at(row, 13)?,
        created_at: ts_at(row, 14)?,
        updated_at: ts_at(row, 15)?,
    })
}
