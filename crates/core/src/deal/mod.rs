//! Deal lifecycle
//!
//! Stage moves with an append-only history, and the transactions that spawn
//! offers and projects from a deal.

mod service;

use chrono::{DateTime, Utc};
use dealflow_domain::{Deal, DealStage, Offer, Project};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use service::DealService;

/// Input for a new deal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDeal {
    pub title: String,
    pub customer_id: Uuid,
    pub company_id: Option<String>,
    /// `Lead` when omitted; closed stages are refused.
    pub stage: Option<DealStage>,
    pub probability: Option<u8>,
    pub value: f64,
    /// `NOK` when omitted.
    pub currency: Option<String>,
    /// The acting user when omitted.
    pub owner_id: Option<String>,
    pub description: String,
    pub notes: String,
    pub expected_close_date: Option<DateTime<Utc>>,
}

impl NewDeal {
    /// Lead titled `title` for `customer_id`.
    pub fn new(title: impl Into<String>, customer_id: Uuid) -> Self {
        Self { title: title.into(), customer_id, ..Self::default() }
    }
}

/// Partial update of a deal's descriptive fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub currency: Option<String>,
    pub owner_id: Option<String>,
    pub notes: Option<String>,
    pub expected_close_date: Option<DateTime<Utc>>,
}

/// Options for winning a deal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealWinRequest {
    pub create_project: bool,
    /// Deal title when omitted.
    pub project_name: Option<String>,
}

/// Everything a deal win touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealWinOutcome {
    pub deal: Deal,
    pub project: Option<Project>,
    pub cloned_lines: usize,
}

/// Options for spawning an offer from a deal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferFromDeal {
    /// Deal title when omitted.
    pub title: Option<String>,
    /// The acting user when omitted.
    pub responsible_id: Option<String>,
    /// Offer whose budget lines seed the new offer.
    pub template_offer_id: Option<Uuid>,
}

/// Result of spawning an offer from a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferFromDealOutcome {
    pub deal: Deal,
    pub offer: Offer,
    pub cloned_lines: usize,
}
