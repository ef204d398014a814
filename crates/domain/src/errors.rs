//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::impl_domain_status_conversions;

/// Business-rule violation reasons surfaced with [`DealflowError::ValidationFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    /// Line item cost must be strictly positive.
    InvalidCost,
    /// Direct revenue must not be negative.
    InvalidRevenue,
    /// Target margin missing or outside `[0, 100)`.
    InvalidMargin,
    /// Probability outside `0..=100`.
    InvalidProbability,
    /// Neither the offer nor its company provides a responsible party.
    MissingResponsible,
    /// Offer has no customer and none can be inherited.
    MissingCustomer,
    /// Company id is not configured.
    UnknownCompany,
    /// Entity cannot be created in the requested phase or stage.
    InvalidInitialPhase,
    /// Expiration date precedes the sent date.
    InvalidDateRange,
    /// Referenced project is closed for new offers.
    ProjectClosed,
    /// Offer must be won before its budget can be inherited.
    OfferNotWon,
    /// Loss requires free-text notes.
    MissingLossNotes,
    /// Reorder list names a line that does not belong to the parent.
    UnknownBudgetLine,
    /// Reorder list repeats an id.
    DuplicateBudgetLine,
    /// A required text field is blank.
    MissingField,
    /// Offer number cannot be assigned while the offer is a draft.
    NumberOnDraft,
}

impl_domain_status_conversions!(ValidationReason {
    InvalidCost => "invalid_cost",
    InvalidRevenue => "invalid_revenue",
    InvalidMargin => "invalid_margin",
    InvalidProbability => "invalid_probability",
    MissingResponsible => "missing_responsible",
    MissingCustomer => "missing_customer",
    UnknownCompany => "unknown_company",
    InvalidInitialPhase => "invalid_initial_phase",
    InvalidDateRange => "invalid_date_range",
    ProjectClosed => "project_closed",
    OfferNotWon => "offer_not_won",
    MissingLossNotes => "missing_loss_notes",
    UnknownBudgetLine => "unknown_budget_line",
    DuplicateBudgetLine => "duplicate_budget_line",
    MissingField => "missing_field",
    NumberOnDraft => "number_on_draft",
});

/// Uniqueness and set-membership conflicts surfaced with [`DealflowError::Conflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Offer or project number already issued.
    DuplicateNumber,
    /// External reference already used within the company.
    DuplicateExternalReference,
    /// Reorder list length differs from the parent's line count.
    ReorderCountMismatch,
    /// Deal already has a linked offer.
    DealAlreadyHasOffer,
    /// Project still has offers attached.
    ProjectHasOffers,
    /// Another line of the same parent already sits at this display order.
    DisplayOrderTaken,
    /// Generic storage uniqueness violation.
    UniqueViolation,
}

impl_domain_status_conversions!(ConflictReason {
    DuplicateNumber => "duplicate_number",
    DuplicateExternalReference => "duplicate_external_reference",
    ReorderCountMismatch => "reorder_count_mismatch",
    DealAlreadyHasOffer => "deal_already_has_offer",
    ProjectHasOffers => "project_has_offers",
    DisplayOrderTaken => "display_order_taken",
    UniqueViolation => "unique_violation",
});

/// Main error type for Dealflow
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DealflowError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation failed ({reason}): {message}")]
    ValidationFailed { reason: ValidationReason, message: String },

    #[error("Illegal {entity} transition from '{current}' to '{attempted}'")]
    IllegalStateTransition { entity: String, current: String, attempted: String },

    #[error("Conflict ({reason}): {message}")]
    Conflict { reason: ConflictReason, message: String },

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DealflowError {
    /// Build a [`DealflowError::NotFound`] for an entity kind and id.
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound { entity: entity.to_string(), id: id.to_string() }
    }

    /// Build a [`DealflowError::ValidationFailed`].
    pub fn validation(reason: ValidationReason, message: impl Into<String>) -> Self {
        Self::ValidationFailed { reason, message: message.into() }
    }

    /// Build a [`DealflowError::Conflict`].
    pub fn conflict(reason: ConflictReason, message: impl Into<String>) -> Self {
        Self::Conflict { reason, message: message.into() }
    }

    /// Build a [`DealflowError::IllegalStateTransition`].
    pub fn illegal_transition(
        entity: &str,
        current: impl ToString,
        attempted: impl ToString,
    ) -> Self {
        Self::IllegalStateTransition {
            entity: entity.to_string(),
            current: current.to_string(),
            attempted: attempted.to_string(),
        }
    }

    /// Stable machine-readable error category.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::IllegalStateTransition { .. } => "illegal_state_transition",
            Self::Conflict { .. } => "conflict",
            Self::DependencyUnavailable(_) => "dependency_unavailable",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Specific reason code, when the category carries one.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::ValidationFailed { reason, .. } => Some(reason.to_string()),
            Self::Conflict { reason, .. } => Some(reason.to_string()),
            _ => None,
        }
    }
}

/// Result type alias for Dealflow operations
pub type Result<T> = std::result::Result<T, DealflowError>;
