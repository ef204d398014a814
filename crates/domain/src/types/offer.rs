//! Offer (quote/order) types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;
use uuid::Uuid;

use crate::errors::{DealflowError, Result};
use crate::lifecycle::OfferPhase;

/// Suffix marking the winning copy of an offer number.
pub const ORDER_NUMBER_SUFFIX: char = 'O';
/// Legacy suffix that also marks a winning number.
pub const LEGACY_WON_SUFFIX: char = 'W';

/// Quote or order.
///
/// `offer_number` is `None` exactly when `phase` is [`OfferPhase::Draft`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct Offer {
    pub id: Uuid,
    pub title: String,
    pub offer_number: Option<String>,
    pub external_reference: Option<String>,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub project_id: Option<Uuid>,
    pub company_id: String,
    pub phase: OfferPhase,
    pub probability: u8,
    pub value: f64,
    pub cost: f64,
    /// `(value - cost) / value * 100`, 0 when value is not positive.
    pub margin_percent: f64,
    pub responsible_id: Option<String>,
    pub responsible_name: String,
    pub description: String,
    pub notes: String,
    pub location: String,
    pub sent_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Refuse field-level edits once the offer is won, lost or expired.
    pub fn ensure_editable(&self, operation: &str) -> Result<()> {
        if self.phase.is_locked() {
            return Err(DealflowError::illegal_transition("offer", self.phase, operation));
        }
        Ok(())
    }

    /// Whether the draft/number invariant currently holds.
    pub fn number_invariant_holds(&self) -> bool {
        (self.phase == OfferPhase::Draft) == self.offer_number.is_none()
    }

    /// Set value and cost together and refresh the margin.
    pub fn set_economics(&mut self, value: f64, cost: f64) {
        self.value = value;
        self.cost = cost;
        self.margin_percent = margin_percent(value, cost);
    }

    /// Append the winning suffix unless the number already carries one.
    pub fn mark_number_as_order(&mut self) {
        if let Some(number) = self.offer_number.as_mut() {
            if !number.ends_with(ORDER_NUMBER_SUFFIX) && !number.ends_with(LEGACY_WON_SUFFIX) {
                number.push(ORDER_NUMBER_SUFFIX);
            }
        }
    }

    /// Record a rejection reason in the notes.
    pub fn append_lost_reason(&mut self, reason: &str) {
        let reason = reason.trim();
        if reason.is_empty() {
            return;
        }
        if self.notes.is_empty() {
            self.notes = format!("Lost reason: {reason}");
        } else {
            self.notes = format!("{}\n\nLost reason: {reason}", self.notes);
        }
    }

    /// Stamp sent and expiration dates if they are not set yet.
    pub fn stamp_sent(&mut self, now: DateTime<Utc>, validity_days: i64) {
        let sent = *self.sent_date.get_or_insert(now);
        if self.expiration_date.is_none() {
            self.expiration_date = Some(sent + Duration::days(validity_days));
        }
    }

    /// Base number without the winning suffix.
    pub fn base_number(&self) -> Option<&str> {
        self.offer_number.as_deref().map(|number| {
            number
                .strip_suffix(ORDER_NUMBER_SUFFIX)
                .or_else(|| number.strip_suffix(LEGACY_WON_SUFFIX))
                .unwrap_or(number)
        })
    }
}

/// Offer margin: `(value - cost) / value * 100`, 0 when value is not positive.
pub fn margin_percent(value: f64, cost: f64) -> f64 {
    if value <= 0.0 {
        0.0
    } else {
        (value - cost) * 100.0 / value
    }
}

/// Ordering used to pick the best offer for a project's derived economics:
/// highest value first, then earliest creation, then lowest id.
pub fn best_offer<'a, I>(offers: I) -> Option<&'a Offer>
where
    I: IntoIterator<Item = &'a Offer>,
{
    offers.into_iter().min_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    })
}
