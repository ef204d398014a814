//! Offer lifecycle
//!
//! Phase moves, number assignment, project linking and the composite
//! win/reject/expire transactions that cascade into projects.

mod service;

use chrono::{DateTime, Utc};
use dealflow_domain::{Offer, OfferPhase, Project};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use service::OfferService;

/// Input for a new offer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewOffer {
    pub title: String,
    /// Inherited from the project when omitted.
    pub customer_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    /// Inherited from the customer, then the configured default.
    pub company_id: Option<String>,
    /// `InProgress` when omitted; only `Draft` and `InProgress` are accepted.
    pub phase: Option<OfferPhase>,
    pub responsible_id: Option<String>,
    pub probability: Option<u8>,
    pub value: f64,
    pub cost: f64,
    pub description: String,
    pub notes: String,
    pub location: String,
    pub external_reference: Option<String>,
    pub sent_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    /// Create a bidding project for the offer when it has none.
    pub create_project: bool,
}

impl NewOffer {
    /// Offer titled `title` for `customer_id`.
    pub fn new(title: impl Into<String>, customer_id: Uuid) -> Self {
        Self { title: title.into(), customer_id: Some(customer_id), ..Self::default() }
    }
}

/// Partial update of an offer's editable fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferPatch {
    pub title: Option<String>,
    pub customer_id: Option<Uuid>,
    pub responsible_id: Option<String>,
    pub probability: Option<u8>,
    pub value: Option<f64>,
    pub cost: Option<f64>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub sent_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub external_reference: Option<String>,
    pub offer_number: Option<String>,
}

/// Options for winning an offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinRequest {
    /// Create an active project when the offer has none.
    pub create_project: bool,
    /// Name of the created project; the offer title when omitted.
    pub project_name: Option<String>,
}

/// Everything a win touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinOutcome {
    pub offer: Offer,
    pub project: Option<Project>,
    /// Sibling offers moved to `Expired`.
    pub expired_offers: Vec<Uuid>,
    /// Budget lines copied onto the project.
    pub cloned_lines: usize,
}

/// Options for cloning an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneOfferRequest {
    /// `"Copy of {title}"` when omitted.
    pub title: Option<String>,
    pub include_budget: bool,
}

impl Default for CloneOfferRequest {
    fn default() -> Self {
        Self { title: None, include_budget: true }
    }
}
