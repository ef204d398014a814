//! Budget line items and summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;
use uuid::Uuid;

use crate::errors::{DealflowError, Result, ValidationReason};
use crate::impl_domain_status_conversions;

/// Kind tag of a [`BudgetParent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetParentKind {
    Offer,
    Project,
}

impl_domain_status_conversions!(BudgetParentKind {
    Offer => "offer",
    Project => "project",
});

/// Owner of a budget line: exactly one offer or one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BudgetParent {
    Offer(Uuid),
    Project(Uuid),
}

impl BudgetParent {
    /// Kind tag.
    pub const fn kind(&self) -> BudgetParentKind {
        match self {
            Self::Offer(_) => BudgetParentKind::Offer,
            Self::Project(_) => BudgetParentKind::Project,
        }
    }

    /// Parent id.
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Offer(id) | Self::Project(id) => *id,
        }
    }

    /// Rebuild a parent from its stored kind and id.
    pub const fn from_parts(kind: BudgetParentKind, id: Uuid) -> Self {
        match kind {
            BudgetParentKind::Offer => Self::Offer(id),
            BudgetParentKind::Project => Self::Project(id),
        }
    }
}

impl std::fmt::Display for BudgetParent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// How a line's revenue is determined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[serde(tag = "mode", content = "amount", rename_all = "snake_case")]
pub enum Pricing {
    /// Revenue entered directly; must be `>= 0`.
    Revenue(f64),
    /// Revenue computed from cost and a target margin in `[0, 100)`.
    TargetMargin(f64),
}

/// Cost/revenue row owned by an offer or a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct BudgetLineItem {
    pub id: Uuid,
    pub parent: BudgetParent,
    pub name: String,
    pub cost: f64,
    pub revenue: f64,
    pub margin_override: bool,
    pub target_margin_percent: Option<f64>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub price_per_item: Option<f64>,
    pub description: String,
    pub display_order: i32,
    /// Line this one was copied from, if any.
    pub source_line_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BudgetLineItem {
    /// Profit contributed by this line.
    pub fn profit(&self) -> f64 {
        self.revenue - self.cost
    }

    /// Pricing mode currently stored on the line.
    pub fn pricing(&self) -> Pricing {
        match (self.margin_override, self.target_margin_percent) {
            (true, Some(margin)) => Pricing::TargetMargin(margin),
            _ => Pricing::Revenue(self.revenue),
        }
    }

    /// Validate and apply cost and pricing.
    pub fn apply_pricing(&mut self, cost: f64, pricing: Pricing) -> Result<()> {
        self.revenue = resolve_revenue(cost, pricing)?;
        self.cost = cost;
        match pricing {
            Pricing::Revenue(_) => {
                self.margin_override = false;
                self.target_margin_percent = None;
            }
            Pricing::TargetMargin(margin) => {
                self.margin_override = true;
                self.target_margin_percent = Some(margin);
            }
        }
        Ok(())
    }

    /// Copy this line under another parent with a fresh identity.
    ///
    /// The copy remembers its source so repeated clones can be detected.
    pub fn clone_to(&self, parent: BudgetParent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            parent,
            source_line_id: Some(self.id),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Validate `cost` and `pricing`, returning the line revenue.
pub fn resolve_revenue(cost: f64, pricing: Pricing) -> Result<f64> {
    if !(cost.is_finite() && cost > 0.0) {
        return Err(DealflowError::validation(
            ValidationReason::InvalidCost,
            format!("cost must be greater than zero, got {cost}"),
        ));
    }
    match pricing {
        Pricing::Revenue(revenue) if revenue.is_finite() && revenue >= 0.0 => Ok(revenue),
        Pricing::Revenue(revenue) => Err(DealflowError::validation(
            ValidationReason::InvalidRevenue,
            format!("revenue must not be negative, got {revenue}"),
        )),
        Pricing::TargetMargin(margin) if (0.0..100.0).contains(&margin) => {
            Ok(revenue_for_margin(cost, margin))
        }
        Pricing::TargetMargin(margin) => Err(DealflowError::validation(
            ValidationReason::InvalidMargin,
            format!("target margin must be in [0, 100), got {margin}"),
        )),
    }
}

/// `cost / (1 - margin / 100)`.
pub fn revenue_for_margin(cost: f64, margin_percent: f64) -> f64 {
    cost * 100.0 / (100.0 - margin_percent)
}

/// Aggregated totals for one parent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct BudgetSummary {
    pub item_count: usize,
    pub total_cost: f64,
    pub total_revenue: f64,
    pub total_profit: f64,
    /// `profit / revenue * 100`, 0 when revenue is 0.
    pub margin_percent: f64,
}

impl BudgetSummary {
    /// Summarise a set of lines.
    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a BudgetLineItem>,
    {
        let mut summary = Self::default();
        for line in lines {
            summary.item_count += 1;
            summary.total_cost += line.cost;
            summary.total_revenue += line.revenue;
        }
        summary.total_profit = summary.total_revenue - summary.total_cost;
        summary.margin_percent = if summary.total_revenue.abs() < f64::EPSILON {
            0.0
        } else {
            summary.total_profit * 100.0 / summary.total_revenue
        };
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(cost: f64, pricing: Pricing) -> BudgetLineItem {
        let now = Utc::now();
        let mut item = BudgetLineItem {
            id: Uuid::now_v7(),
            parent: BudgetParent::Offer(Uuid::now_v7()),
            name: "Steel".into(),
            cost: 0.0,
            revenue: 0.0,
            margin_override: false,
            target_margin_percent: None,
            quantity: None,
            unit: None,
            price_per_item: None,
            description: String::new(),
            display_order: 1,
            source_line_id: None,
            created_at: now,
            updated_at: now,
        };
        item.apply_pricing(cost, pricing).expect("valid pricing");
        item
    }

    #[test]
    fn target_margin_computes_revenue() {
        let item = line(1000.0, Pricing::TargetMargin(20.0));
        assert!((item.revenue - 1250.0).abs() < 1e-9);
        assert!(item.margin_override);

        let summary = BudgetSummary::from_lines([&item]);
        assert!((summary.margin_percent - 20.0).abs() < 1e-9);
        assert!((summary.total_profit - 250.0).abs() < 1e-9);
    }

    #[test]
    fn cost_must_be_positive() {
        let err = resolve_revenue(0.0, Pricing::Revenue(10.0)).unwrap_err();
        assert_eq!(err.reason().as_deref(), Some("invalid_cost"));
    }

    #[test]
    fn margin_must_be_below_hundred() {
        let err = resolve_revenue(10.0, Pricing::TargetMargin(100.0)).unwrap_err();
        assert_eq!(err.reason().as_deref(), Some("invalid_margin"));
        assert!(resolve_revenue(10.0, Pricing::TargetMargin(-1.0)).is_err());
        assert!(resolve_revenue(10.0, Pricing::TargetMargin(0.0)).is_ok());
    }

    #[test]
    fn direct_revenue_must_not_be_negative() {
        let err = resolve_revenue(10.0, Pricing::Revenue(-1.0)).unwrap_err();
        assert_eq!(err.reason().as_deref(), Some("invalid_revenue"));
    }

    #[test]
    fn empty_summary_has_zero_margin() {
        let summary = BudgetSummary::from_lines(std::iter::empty());
        assert_eq!(summary.item_count, 0);
        assert!(summary.margin_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn clone_to_switches_parent_and_identity() {
        let item = line(100.0, Pricing::Revenue(150.0));
        let project = BudgetParent::Project(Uuid::now_v7());
        let copy = item.clone_to(project, Utc::now());
        assert_ne!(copy.id, item.id);
        assert_eq!(copy.parent, project);
        assert_eq!(copy.source_line_id, Some(item.id));
        assert_eq!(copy.display_order, item.display_order);
        assert!((copy.revenue - 150.0).abs() < f64::EPSILON);
    }
}
