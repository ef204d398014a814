//! Project (delivery container) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;
use uuid::Uuid;

use crate::errors::{DealflowError, Result};
use crate::lifecycle::ProjectPhase;
use crate::merge::fill_if_absent;
use crate::types::offer::{best_offer, Offer};

/// Delivery container for offers.
///
/// While in [`ProjectPhase::Bidding`] the customer and, unless the project
/// carries its own detailed budget, the value and cost are derived from the
/// project's open offers. Winning an offer freezes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub project_number: Option<String>,
    pub summary: String,
    pub description: String,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub company_id: String,
    pub phase: ProjectPhase,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: String,
    pub deal_id: Option<Uuid>,
    pub external_reference: Option<String>,
    pub value: f64,
    pub cost: f64,
    pub has_detailed_budget: bool,
    pub responsible_id: Option<String>,
    pub responsible_name: Option<String>,
    pub winning_offer_id: Option<Uuid>,
    pub winning_offer_number: Option<String>,
    pub won_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of recomputing a bidding project's derived fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
    /// Number of open offers considered.
    pub open_offers: usize,
    /// Offer whose economics were mirrored, if economics are derived.
    pub best_offer_id: Option<Uuid>,
}

impl Project {
    /// Value and cost mirror the best offer only while bidding without a budget.
    pub fn economics_are_derived(&self) -> bool {
        self.phase == ProjectPhase::Bidding && !self.has_detailed_budget
    }

    /// Refuse general edits on completed or cancelled projects.
    pub fn ensure_editable(&self, operation: &str) -> Result<()> {
        if self.phase.is_closed() {
            return Err(DealflowError::illegal_transition("project", self.phase, operation));
        }
        Ok(())
    }

    /// Set the start date to `now` if the target phase needs one.
    pub fn ensure_start_date(&mut self, phase: ProjectPhase, now: DateTime<Utc>) {
        if phase.requires_start_date() && self.start_date.is_none() {
            self.start_date = Some(now);
        }
    }

    /// Recompute customer and economics from `offers` (any phase).
    ///
    /// Exactly one distinct customer among the open offers sets the customer;
    /// zero or several clear it. Does nothing outside the bidding phase.
    pub fn derive_from_offers(&mut self, offers: &[Offer]) -> Derivation {
        if self.phase != ProjectPhase::Bidding {
            return Derivation { open_offers: 0, best_offer_id: None };
        }

        let open: Vec<&Offer> = offers.iter().filter(|offer| offer.phase.is_open()).collect();

        let mut customers: Vec<(Uuid, &str)> = Vec::new();
        for offer in &open {
            if !customers.iter().any(|(id, _)| *id == offer.customer_id) {
                customers.push((offer.customer_id, offer.customer_name.as_str()));
            }
        }
        if let [(id, name)] = customers.as_slice() {
            self.customer_id = Some(*id);
            self.customer_name = Some((*name).to_string());
        } else {
            self.customer_id = None;
            self.customer_name = None;
        }

        let mut best_offer_id = None;
        if self.economics_are_derived() {
            match best_offer(open.iter().copied()) {
                Some(best) => {
                    self.value = best.value;
                    self.cost = best.cost;
                    best_offer_id = Some(best.id);
                }
                None => {
                    self.value = 0.0;
                    self.cost = 0.0;
                }
            }
        }

        Derivation { open_offers: open.len(), best_offer_id }
    }

    /// Drop values that were only derived so a winning offer can fill them.
    pub fn release_derived_fields(&mut self) {
        if self.phase != ProjectPhase::Bidding {
            return;
        }
        self.customer_id = None;
        self.customer_name = None;
        if self.economics_are_derived() {
            self.value = 0.0;
            self.cost = 0.0;
        }
    }

    /// Copy the winning offer's data onto empty project fields and record
    /// the winning snapshot.
    pub fn absorb_winning_offer(&mut self, offer: &Offer, now: DateTime<Utc>) {
        fill_if_absent(&mut self.project_number, offer.base_number().map(str::to_string));
        fill_if_absent(&mut self.value, offer.value);
        fill_if_absent(&mut self.cost, offer.cost);
        if self.customer_id.is_none() {
            self.customer_id = Some(offer.customer_id);
            self.customer_name = Some(offer.customer_name.clone());
        }
        if fill_if_absent(&mut self.responsible_id, offer.responsible_id.clone()) {
            self.responsible_name = Some(offer.responsible_name.clone());
        }
        fill_if_absent(&mut self.description, offer.description.clone());
        fill_if_absent(&mut self.location, offer.location.clone());

        self.winning_offer_id = Some(offer.id);
        self.winning_offer_number.clone_from(&offer.offer_number);
        self.won_at = Some(now);
    }

    /// Forget the winning snapshot (used when a project is reopened).
    pub fn clear_winning_offer(&mut self) {
        self.winning_offer_id = None;
        self.winning_offer_number = None;
        self.won_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::OfferPhase;

    fn project() -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::now_v7(),
            name: "Harbour hall".into(),
            project_number: None,
            summary: String::new(),
            description: String::new(),
            customer_id: None,
            customer_name: None,
            company_id: "stalbygg".into(),
            phase: ProjectPhase::Bidding,
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
        }
    }

    fn offer(customer: Uuid, value: f64, phase: OfferPhase) -> Offer {
        let now = Utc::now();
        Offer {
            id: Uuid::now_v7(),
            title: "Hall".into(),
            offer_number: Some("ST-2025-010".into()),
            external_reference: None,
            customer_id: customer,
            customer_name: format!("customer-{customer}"),
            project_id: None,
            company_id: "stalbygg".into(),
            phase,
            probability: 50,
            value,
            cost: value / 2.0,
            margin_percent: 50.0,
            responsible_id: Some("u-7".into()),
            responsible_name: "Per".into(),
            description: "Offer description".into(),
            notes: String::new(),
            location: "Stavanger".into(),
            sent_date: None,
            expiration_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn single_customer_is_derived() {
        let x = Uuid::now_v7();
        let mut p = project();
        p.derive_from_offers(&[offer(x, 10.0, OfferPhase::Sent), offer(x, 20.0, OfferPhase::Draft)]);
        assert_eq!(p.customer_id, Some(x));
        assert!((p.value - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn multiple_customers_clear_the_reference() {
        let mut p = project();
        p.customer_id = Some(Uuid::now_v7());
        p.derive_from_offers(&[
            offer(Uuid::now_v7(), 10.0, OfferPhase::Sent),
            offer(Uuid::now_v7(), 20.0, OfferPhase::Sent),
        ]);
        assert!(p.customer_id.is_none());
        assert!(p.customer_name.is_none());
    }

    #[test]
    fn closed_offers_are_ignored() {
        let x = Uuid::now_v7();
        let mut p = project();
        let derivation = p.derive_from_offers(&[
            offer(x, 10.0, OfferPhase::Sent),
            offer(Uuid::now_v7(), 99.0, OfferPhase::Lost),
        ]);
        assert_eq!(derivation.open_offers, 1);
        assert_eq!(p.customer_id, Some(x));
        assert!((p.value - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn detailed_budget_keeps_explicit_economics() {
        let mut p = project();
        p.has_detailed_budget = true;
        p.value = 5_000.0;
        p.derive_from_offers(&[offer(Uuid::now_v7(), 10.0, OfferPhase::Sent)]);
        assert!((p.value - 5_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn derivation_is_inert_outside_bidding() {
        let mut p = project();
        p.phase = ProjectPhase::Working;
        let x = Uuid::now_v7();
        p.customer_id = Some(x);
        p.derive_from_offers(&[]);
        assert_eq!(p.customer_id, Some(x));
    }

    #[test]
    fn winning_offer_never_clobbers_explicit_fields() {
        let mut p = project();
        p.location = "Bergen".into();
        p.project_number = Some("ST-2025-003".into());
        let mut won = offer(Uuid::now_v7(), 800.0, OfferPhase::Order);
        won.offer_number = Some("ST-2025-010O".into());

        p.absorb_winning_offer(&won, Utc::now());

        assert_eq!(p.location, "Bergen");
        assert_eq!(p.project_number.as_deref(), Some("ST-2025-003"));
        assert_eq!(p.description, "Offer description");
        assert_eq!(p.responsible_id.as_deref(), Some("u-7"));
        assert_eq!(p.winning_offer_id, Some(won.id));
        assert_eq!(p.winning_offer_number.as_deref(), Some("ST-2025-010O"));
        assert!((p.value - 800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_project_number_takes_base_offer_number() {
        let mut p = project();
        let mut won = offer(Uuid::now_v7(), 800.0, OfferPhase::Order);
        won.offer_number = Some("ST-2025-010O".into());
        p.absorb_winning_offer(&won, Utc::now());
        assert_eq!(p.project_number.as_deref(), Some("ST-2025-010"));
    }
}
