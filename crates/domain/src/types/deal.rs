//! Deal (sales opportunity) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;
use uuid::Uuid;

use crate::errors::{DealflowError, Result, ValidationReason};
use crate::impl_domain_status_conversions;
use crate::lifecycle::DealStage;

/// Categorised reason for losing a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[serde(rename_all = "snake_case")]
pub enum LossReason {
    Price,
    Timing,
    Competitor,
    Requirements,
    Other,
}

impl_domain_status_conversions!(LossReason {
    Price => "price",
    Timing => "timing",
    Competitor => "competitor",
    Requirements => "requirements",
    Other => "other",
});

/// Sales opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct Deal {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub company_id: String,
    pub stage: DealStage,
    /// 0-100; defaults to the stage probability unless overridden.
    pub probability: u8,
    pub value: f64,
    pub currency: String,
    pub owner_id: String,
    pub owner_name: String,
    pub offer_id: Option<Uuid>,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub actual_close_date: Option<DateTime<Utc>>,
    pub lost_reason_category: Option<LossReason>,
    pub lost_reason: Option<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// Move to `stage`, applying the stage's side fields.
    ///
    /// The caller is responsible for checking the transition table first.
    pub fn enter_stage(&mut self, stage: DealStage, probability: Option<u8>, now: DateTime<Utc>) {
        let previous = self.stage;
        self.stage = stage;
        self.probability = probability.unwrap_or_else(|| stage.default_probability());

        if stage.is_closed() {
            self.actual_close_date = Some(now);
        }
        if previous == DealStage::Lost && !stage.is_closed() {
            self.actual_close_date = None;
            self.lost_reason_category = None;
            self.lost_reason = None;
        }
        self.updated_at = now;
    }

    /// Expected revenue used by pipeline reporting.
    pub fn weighted_value(&self) -> f64 {
        self.value * f64::from(self.probability) / 100.0
    }
}

/// Append-only stage change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct DealStageHistory {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub from_stage: Option<DealStage>,
    pub to_stage: DealStage,
    pub changed_by_id: String,
    pub changed_by_name: String,
    pub notes: String,
    pub changed_at: DateTime<Utc>,
}

/// Validate a caller-supplied probability.
pub fn validate_probability(probability: Option<u8>) -> Result<Option<u8>> {
    match probability {
        Some(value) if value > 100 => Err(DealflowError::validation(
            ValidationReason::InvalidProbability,
            format!("probability must be between 0 and 100, got {value}"),
        )),
        other => Ok(other),
    }
}

/// History note recorded when a deal is lost.
pub fn loss_note(category: LossReason, notes: &str) -> String {
    format!("[{category}] {notes}")
}
