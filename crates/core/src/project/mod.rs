//! Project lifecycle
//!
//! Bidding projects derive customer and economics from their open offers;
//! active projects keep what the winning offer left them.

mod service;

use chrono::{DateTime, Utc};
use dealflow_domain::{Project, ProjectPhase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use service::ProjectService;

/// Input for a new project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    /// `Bidding` when omitted; only `Bidding` and `Working` are accepted.
    pub phase: Option<ProjectPhase>,
    pub customer_id: Option<Uuid>,
    pub company_id: Option<String>,
    pub responsible_id: Option<String>,
    pub deal_id: Option<Uuid>,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub external_reference: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl NewProject {
    /// Bidding project named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }
}

/// Partial update of a project's descriptive fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub responsible_id: Option<String>,
    pub external_reference: Option<String>,
    pub project_number: Option<String>,
}

/// Result of copying a won offer's budget onto a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetInheritance {
    pub project: Project,
    pub cloned_lines: usize,
}

/// Empty project shell; start date set when `phase` needs one.
pub(crate) fn blank_project(
    name: String,
    company_id: &str,
    phase: ProjectPhase,
    now: DateTime<Utc>,
) -> Project {
    let mut project = Project {
        id: Uuid::now_v7(),
        name,
        project_number: None,
        summary: String::new(),
        description: String::new(),
        customer_id: None,
        customer_name: None,
        company_id: company_id.to_string(),
        phase,
        start_date: None,
        end_date: None,
        location: String::new(),
        deal_id: None,
        external_reference: None,
        value: 0.0,
        cost: 0.0,
        has_detailed_budget: false,
        responsible_id: None,
        responsible_name: None,
        winning_offer_id: None,
        winning_offer_number: None,
        won_at: None,
        created_at: now,
        updated_at: now,
    };
    project.ensure_start_date(phase, now);
    project
}
