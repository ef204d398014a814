//! Budget ledger
//!
//! Line items hang off exactly one offer or project. The ledger owns their
//! CRUD, ordering, bulk cloning between parents and aggregate summaries.

mod ledger;

use dealflow_domain::Pricing;
use serde::{Deserialize, Serialize};

pub use ledger::{clone_lines, BudgetLedger};
pub(crate) use ledger::ensure_parent_writable;

/// Input for a new line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBudgetLine {
    pub name: String,
    pub cost: f64,
    pub pricing: Pricing,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub price_per_item: Option<f64>,
    #[serde(default)]
    pub description: String,
    /// Appended after the current maximum when omitted.
    #[serde(default)]
    pub display_order: Option<i32>,
}

impl NewBudgetLine {
    /// Line with a name, cost and pricing; everything else empty.
    pub fn new(name: impl Into<String>, cost: f64, pricing: Pricing) -> Self {
        Self {
            name: name.into(),
            cost,
            pricing,
            quantity: None,
            unit: None,
            price_per_item: None,
            description: String::new(),
            display_order: None,
        }
    }
}

/// Partial update of a line item. `None` leaves a field unchanged.
///
/// A new cost without new pricing re-applies the line's current pricing,
/// so target-margin lines keep their margin and get a fresh revenue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetLinePatch {
    pub name: Option<String>,
    pub cost: Option<f64>,
    pub pricing: Option<Pricing>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub price_per_item: Option<f64>,
    pub description: Option<String>,
    pub display_order: Option<i32>,
}

/// Failure policy for bulk cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneMode {
    /// First failing line aborts the surrounding transaction.
    Strict,
    /// Failing lines are logged and skipped.
    BestEffort,
}

/// Result of a bulk clone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneReport {
    pub cloned: usize,
    pub skipped: usize,
    /// Source lines that already had a copy under the destination.
    pub already_present: usize,
}
