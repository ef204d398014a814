//! Lifecycle state machines
//!
//! Deal stages, offer phases and project phases are each described by an
//! explicit table mapping a state to the set of states it may move to. Every
//! transition in the workspace is checked by [`check_transition`] (or
//! [`check_edge`] for the project reopen table), never by ad hoc comparisons.

use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

use crate::errors::{DealflowError, Result};
use crate::impl_domain_status_conversions;

/// A state enum backed by a transition table.
pub trait Lifecycle: Copy + Eq + std::fmt::Display + 'static {
    /// Entity label used in transition errors.
    const ENTITY: &'static str;

    /// Legal next states.
    fn successors(self) -> &'static [Self];

    /// Whether `next` is a legal move from `self`.
    fn can_transition_to(self, next: Self) -> bool {
        self.successors().contains(&next)
    }
}

/// Reject `current -> attempted` unless the state's own table allows it.
pub fn check_transition<S: Lifecycle>(current: S, attempted: S) -> Result<()> {
    check_edge(current, attempted, current.successors())
}

/// Reject `current -> attempted` unless `attempted` is listed in `allowed`.
pub fn check_edge<S: Lifecycle>(current: S, attempted: S, allowed: &[S]) -> Result<()> {
    if allowed.contains(&attempted) {
        Ok(())
    } else {
        Err(DealflowError::illegal_transition(S::ENTITY, current, attempted))
    }
}

// ============================================================================
// Deal stage
// ============================================================================

/// Sales opportunity stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl_domain_status_conversions!(DealStage {
    Lead => "lead",
    Qualified => "qualified",
    Proposal => "proposal",
    Negotiation => "negotiation",
    Won => "won",
    Lost => "lost",
});

impl Lifecycle for DealStage {
    const ENTITY: &'static str = "deal";

    fn successors(self) -> &'static [Self] {
        use DealStage::{Lead, Lost, Negotiation, Proposal, Qualified, Won};
        match self {
            Lead => &[Qualified, Lost],
            Qualified => &[Proposal, Lead, Lost],
            Proposal => &[Negotiation, Qualified, Lost],
            Negotiation => &[Won, Proposal, Lost],
            Won => &[],
            Lost => &[Lead],
        }
    }
}

impl DealStage {
    /// Probability applied when the caller does not supply one.
    pub const fn default_probability(self) -> u8 {
        match self {
            Self::Lead => 10,
            Self::Qualified => 25,
            Self::Proposal => 50,
            Self::Negotiation => 75,
            Self::Won => 100,
            Self::Lost => 0,
        }
    }

    /// Won or Lost.
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

// ============================================================================
// Offer phase
// ============================================================================

/// Quote/order phase. `Order` is the won state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum OfferPhase {
    Draft,
    InProgress,
    Sent,
    Order,
    Completed,
    Lost,
    Expired,
}

impl_domain_status_conversions!(OfferPhase {
    Draft => "draft",
    InProgress => "in_progress",
    Sent => "sent",
    Order => "order",
    Completed => "completed",
    Lost => "lost",
    Expired => "expired",
});

impl Lifecycle for OfferPhase {
    const ENTITY: &'static str = "offer";

    fn successors(self) -> &'static [Self] {
        use OfferPhase::{Completed, Draft, Expired, InProgress, Lost, Order, Sent};
        match self {
            Draft => &[InProgress, Sent, Expired],
            InProgress => &[Sent, Expired],
            Sent => &[InProgress, Order, Lost, Expired],
            Order => &[Completed, Sent, Lost],
            Completed => &[Order],
            Lost | Expired => &[],
        }
    }
}

impl OfferPhase {
    /// Phases that only dedicated operations may enter; `advance` refuses them.
    pub const DEDICATED_TARGETS: &'static [Self] =
        &[Self::Order, Self::Completed, Self::Lost, Self::Expired];

    /// Still competing: counts toward project customer and economics derivation.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Draft | Self::InProgress | Self::Sent)
    }

    /// Lost or Expired.
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Lost | Self::Expired)
    }

    /// Field-level edits are refused in these phases.
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::Order | Self::Completed | Self::Lost | Self::Expired)
    }

    /// Won and not yet reverted.
    pub const fn is_won(self) -> bool {
        matches!(self, Self::Order | Self::Completed)
    }
}

// ============================================================================
// Project phase
// ============================================================================

/// Delivery container phase. `Bidding` is the pre-commitment phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    #[serde(rename = "tilbud")]
    Bidding,
    Working,
    OnHold,
    Completed,
    Cancelled,
}

impl_domain_status_conversions!(ProjectPhase {
    Bidding => "tilbud",
    Working => "working",
    OnHold => "on_hold",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl Lifecycle for ProjectPhase {
    const ENTITY: &'static str = "project";

    fn successors(self) -> &'static [Self] {
        use ProjectPhase::{Bidding, Cancelled, Completed, OnHold, Working};
        match self {
            Bidding => &[Working, OnHold, Cancelled],
            Working => &[OnHold, Completed, Cancelled, Bidding],
            OnHold => &[Working, Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}

impl ProjectPhase {
    /// Targets reachable through an explicit reopen.
    pub const fn reopen_targets(self) -> &'static [Self] {
        match self {
            Self::Completed | Self::Cancelled => &[Self::Bidding, Self::Working],
            _ => &[],
        }
    }

    /// Completed or Cancelled.
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Phases that carry a start date.
    pub const fn requires_start_date(self) -> bool {
        matches!(self, Self::Working)
    }
}
