//! Budget ledger service

use std::collections::HashSet;

use chrono::Utc;
use dealflow_domain::{
    BudgetLineItem, BudgetParent, BudgetSummary, ConflictReason, DealflowError, Result,
    ValidationReason,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{BudgetLinePatch, CloneMode, CloneReport, NewBudgetLine};
use crate::cascade::{refresh_project, WhenEmpty};
use crate::deps::{found, unavailable, Collaborators};
use crate::ports::StoreTx;

/// Copy every line of `from` under `to`, preserving order and pricing.
///
/// Copies are appended after the last line of `to`. Source lines that
/// already have a copy under `to` are not copied again.
///
/// In [`CloneMode::Strict`] the first failing insert is returned and the
/// caller's transaction must be abandoned; in [`CloneMode::BestEffort`] the
/// failing line is logged and counted as skipped.
pub async fn clone_lines(
    tx: &mut dyn StoreTx,
    from: BudgetParent,
    to: BudgetParent,
    mode: CloneMode,
) -> Result<CloneReport> {
    let now = Utc::now();
    let source = tx.list_budget_lines(from).await?;
    let existing = tx.list_budget_lines(to).await?;
    let copied: HashSet<Uuid> = existing.iter().filter_map(|line| line.source_line_id).collect();
    let mut display_order = next_display_order(&existing);
    let mut report = CloneReport::default();

    for line in &source {
        if copied.contains(&line.id) {
            report.already_present += 1;
            continue;
        }
        let mut copy = line.clone_to(to, now);
        copy.display_order = display_order;
        match tx.insert_budget_line(&copy).await {
            Ok(()) => {
                report.cloned += 1;
                display_order += 1;
            }
            Err(err) if mode == CloneMode::BestEffort => {
                warn!(error = %err, line = %line.id, %from, %to, "skipping budget line during clone");
                report.skipped += 1;
            }
            Err(err) => return Err(unavailable("budget clone")(err)),
        }
    }

    Ok(report)
}

/// Load the parent and refuse writes when it is closed for edits.
pub(crate) async fn ensure_parent_writable(
    tx: &mut dyn StoreTx,
    parent: BudgetParent,
    operation: &str,
) -> Result<()> {
    match parent {
        BudgetParent::Offer(id) => {
            found(tx.get_offer(id).await?, "offer", id)?.ensure_editable(operation)
        }
        BudgetParent::Project(id) => {
            found(tx.get_project(id).await?, "project", id)?.ensure_editable(operation)
        }
    }
}

async fn ensure_parent_exists(tx: &mut dyn StoreTx, parent: BudgetParent) -> Result<()> {
    match parent {
        BudgetParent::Offer(id) => found(tx.get_offer(id).await?, "offer", id).map(drop),
        BudgetParent::Project(id) => found(tx.get_project(id).await?, "project", id).map(drop),
    }
}

/// Budget line CRUD, ordering, cloning and summaries.
pub struct BudgetLedger {
    deps: Collaborators,
}

impl BudgetLedger {
    /// Create a new budget ledger
    pub fn new(deps: Collaborators) -> Self {
        Self { deps }
    }

    /// Add a line under `parent`.
    pub async fn add_line(
        &self,
        parent: BudgetParent,
        request: NewBudgetLine,
    ) -> Result<BudgetLineItem> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        ensure_parent_writable(tx.as_mut(), parent, "edit_budget").await?;

        let siblings = tx.list_budget_lines(parent).await?;
        let display_order = match request.display_order {
            Some(order) => {
                ensure_order_free(&siblings, order, None)?;
                order
            }
            None => next_display_order(&siblings),
        };

        let mut line = BudgetLineItem {
            id: Uuid::now_v7(),
            parent,
            name: request.name,
            cost: 0.0,
            revenue: 0.0,
            margin_override: false,
            target_margin_percent: None,
            quantity: request.quantity,
            unit: request.unit,
            price_per_item: request.price_per_item,
            description: request.description,
            display_order,
            source_line_id: None,
            created_at: now,
            updated_at: now,
        };
        line.apply_pricing(request.cost, request.pricing)?;

        tx.insert_budget_line(&line).await?;
        tx.commit().await?;
        Ok(line)
    }

    /// Fetch one line.
    pub async fn get_line(&self, id: Uuid) -> Result<BudgetLineItem> {
        let mut tx = self.deps.store.begin().await?;
        found(tx.get_budget_line(id).await?, "budget_line", id)
    }

    /// Lines of `parent` in display order.
    pub async fn list_lines(&self, parent: BudgetParent) -> Result<Vec<BudgetLineItem>> {
        let mut tx = self.deps.store.begin().await?;
        ensure_parent_exists(tx.as_mut(), parent).await?;
        tx.list_budget_lines(parent).await
    }

    /// Apply a partial update to a line.
    pub async fn update_line(&self, id: Uuid, patch: BudgetLinePatch) -> Result<BudgetLineItem> {
        let mut tx = self.deps.store.begin().await?;
        let mut line = found(tx.get_budget_line(id).await?, "budget_line", id)?;
        ensure_parent_writable(tx.as_mut(), line.parent, "edit_budget").await?;

        if patch.cost.is_some() || patch.pricing.is_some() {
            let cost = patch.cost.unwrap_or(line.cost);
            let pricing = patch.pricing.unwrap_or_else(|| line.pricing());
            line.apply_pricing(cost, pricing)?;
        }
        if let Some(name) = patch.name {
            line.name = name;
        }
        if patch.quantity.is_some() {
            line.quantity = patch.quantity;
        }
        if patch.unit.is_some() {
            line.unit = patch.unit;
        }
        if patch.price_per_item.is_some() {
            line.price_per_item = patch.price_per_item;
        }
        if let Some(description) = patch.description {
            line.description = description;
        }
        if let Some(order) = patch.display_order {
            if order != line.display_order {
                let siblings = tx.list_budget_lines(line.parent).await?;
                ensure_order_free(&siblings, order, Some(line.id))?;
            }
            line.display_order = order;
        }
        line.updated_at = Utc::now();

        tx.update_budget_line(&line).await?;
        tx.commit().await?;
        Ok(line)
    }

    /// Delete one line.
    pub async fn delete_line(&self, id: Uuid) -> Result<()> {
        let mut tx = self.deps.store.begin().await?;
        let line = found(tx.get_budget_line(id).await?, "budget_line", id)?;
        ensure_parent_writable(tx.as_mut(), line.parent, "edit_budget").await?;
        tx.delete_budget_line(id).await?;
        tx.commit().await
    }

    /// Rewrite display order of every line of `parent` to match `ordered_ids`.
    ///
    /// The list must name each existing line exactly once; anything else is
    /// rejected before a single row is touched.
    #[instrument(skip(self, ordered_ids), fields(count = ordered_ids.len()))]
    pub async fn reorder(
        &self,
        parent: BudgetParent,
        ordered_ids: &[Uuid],
    ) -> Result<Vec<BudgetLineItem>> {
        let mut tx = self.deps.store.begin().await?;
        ensure_parent_writable(tx.as_mut(), parent, "edit_budget").await?;
        let lines = tx.list_budget_lines(parent).await?;

        if ordered_ids.len() != lines.len() {
            return Err(DealflowError::conflict(
                ConflictReason::ReorderCountMismatch,
                format!("expected {} line ids, got {}", lines.len(), ordered_ids.len()),
            ));
        }

        let mut seen = HashSet::with_capacity(ordered_ids.len());
        let mut reordered = Vec::with_capacity(lines.len());
        let now = Utc::now();
        for (position, id) in ordered_ids.iter().enumerate() {
            if !seen.insert(*id) {
                return Err(DealflowError::validation(
                    ValidationReason::DuplicateBudgetLine,
                    format!("line {id} listed more than once"),
                ));
            }
            let Some(line) = lines.iter().find(|line| line.id == *id) else {
                return Err(DealflowError::validation(
                    ValidationReason::UnknownBudgetLine,
                    format!("line {id} does not belong to {parent}"),
                ));
            };
            let mut line = line.clone();
            line.display_order = i32::try_from(position + 1).map_err(|_| {
                DealflowError::validation(ValidationReason::UnknownBudgetLine, "too many lines")
            })?;
            line.updated_at = now;
            reordered.push(line);
        }

        for line in &reordered {
            tx.update_budget_line(line).await?;
        }
        tx.commit().await?;
        Ok(reordered)
    }

    /// Copy every line of `from` under `to`, skipping lines that fail.
    #[instrument(skip(self))]
    pub async fn clone_budget(&self, from: BudgetParent, to: BudgetParent) -> Result<CloneReport> {
        let mut tx = self.deps.store.begin().await?;
        ensure_parent_exists(tx.as_mut(), from).await?;
        ensure_parent_writable(tx.as_mut(), to, "edit_budget").await?;
        let report = clone_lines(tx.as_mut(), from, to, CloneMode::BestEffort).await?;
        tx.commit().await?;
        info!(cloned = report.cloned, skipped = report.skipped, "budget lines cloned");
        Ok(report)
    }

    /// Aggregate totals for `parent`.
    pub async fn summary(&self, parent: BudgetParent) -> Result<BudgetSummary> {
        let mut tx = self.deps.store.begin().await?;
        ensure_parent_exists(tx.as_mut(), parent).await?;
        let lines = tx.list_budget_lines(parent).await?;
        Ok(BudgetSummary::from_lines(&lines))
    }

    /// Push the summary totals back onto the parent.
    ///
    /// Projects take value, cost and the detailed-budget flag; offers take
    /// value and cost with a recomputed margin, and a bidding project they
    /// belong to is re-derived.
    pub async fn sync_parent_totals(&self, parent: BudgetParent) -> Result<BudgetSummary> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        ensure_parent_writable(tx.as_mut(), parent, "sync_totals").await?;
        let summary = BudgetSummary::from_lines(&tx.list_budget_lines(parent).await?);

        match parent {
            BudgetParent::Project(id) => {
                let mut project = found(tx.get_project(id).await?, "project", id)?;
                project.value = summary.total_revenue;
                project.cost = summary.total_cost;
                project.has_detailed_budget = summary.item_count > 0;
                project.updated_at = now;
                tx.update_project(&project).await?;
            }
            BudgetParent::Offer(id) => {
                let mut offer = found(tx.get_offer(id).await?, "offer", id)?;
                offer.set_economics(summary.total_revenue, summary.total_cost);
                offer.updated_at = now;
                tx.update_offer(&offer).await?;
                if let Some(project_id) = offer.project_id {
                    refresh_project(tx.as_mut(), project_id, WhenEmpty::Keep, now).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(summary)
    }
}

fn next_display_order(lines: &[BudgetLineItem]) -> i32 {
    lines.iter().map(|line| line.display_order).max().map_or(1, |max| max + 1)
}

/// Display order is unique within a parent.
fn ensure_order_free(lines: &[BudgetLineItem], order: i32, except: Option<Uuid>) -> Result<()> {
    if lines.iter().any(|line| line.display_order == order && Some(line.id) != except) {
        return Err(DealflowError::conflict(
            ConflictReason::DisplayOrderTaken,
            format!("display order {order} is already used"),
        ));
    }
    Ok(())
}
