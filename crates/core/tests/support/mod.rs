//! Shared test helpers for `dealflow-core` integration tests.
//!
//! [`Harness`] wires every service over an in-memory store, seeded
//! directories and recording side effects, so tests can focus on
//! behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod directories;
pub mod memory;

use std::sync::Arc;

use dealflow_core::{
    BudgetLedger, Collaborators, DealService, NewBudgetLine, NewOffer, NewProject, OfferService,
    ProjectService, SequenceService, Services, SideEffects,
};
use dealflow_domain::{
    Actor, BudgetLineItem, BudgetParent, CustomerRef, Offer, OfferPhase, Pricing, Project,
};
use uuid::Uuid;

use self::directories::{MemoryCompanies, MemoryContacts, Recorder, RecordingEffects};
use self::memory::MemoryStore;

/// Fully wired services over in-memory collaborators.
pub struct Harness {
    pub store: MemoryStore,
    pub contacts: Arc<MemoryContacts>,
    pub companies: Arc<MemoryCompanies>,
    pub effects: Arc<RecordingEffects>,
    pub services: Services,
    pub actor: Actor,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let contacts = Arc::new(MemoryContacts::default());
        let companies = Arc::new(MemoryCompanies::seeded());
        let effects = Arc::new(RecordingEffects::default());
        let recorder = Recorder(Arc::clone(&effects));

        contacts.add_user("u-kari", "Kari Nordmann");
        contacts.add_user("u-ola", "Ola Hansen");

        let deps = Collaborators::new(
            Arc::new(store.clone()),
            contacts.clone(),
            companies.clone(),
            SideEffects::new(
                Arc::new(recorder.clone()),
                Arc::new(recorder.clone()),
                Arc::new(recorder),
            ),
        );

        Self {
            store,
            contacts,
            companies,
            effects,
            services: Services::new(&deps),
            actor: Actor::new("u-kari", "Kari Nordmann"),
        }
    }

    pub fn offers(&self) -> &OfferService {
        &self.services.offers
    }

    pub fn projects(&self) -> &ProjectService {
        &self.services.projects
    }

    pub fn deals(&self) -> &DealService {
        &self.services.deals
    }

    pub fn budgets(&self) -> &BudgetLedger {
        &self.services.budgets
    }

    pub fn sequences(&self) -> &SequenceService {
        &self.services.sequences
    }

    /// Customer belonging to `stalbygg`.
    pub fn customer(&self, name: &str) -> CustomerRef {
        self.contacts.add_customer(name, Some("stalbygg"))
    }

    /// In-progress offer owned by Kari, valued at `value`.
    pub async fn offer_for(
        &self,
        customer: &CustomerRef,
        project_id: Option<Uuid>,
        value: f64,
    ) -> Offer {
        let request = NewOffer {
            project_id,
            responsible_id: Some("u-kari".into()),
            value,
            cost: value * 0.8,
            ..NewOffer::new(format!("Offer {value}"), customer.id)
        };
        self.offers().create(request, &self.actor).await.expect("offer created")
    }

    /// Sent offer valued at `value`.
    pub async fn sent_offer_for(
        &self,
        customer: &CustomerRef,
        project_id: Option<Uuid>,
        value: f64,
    ) -> Offer {
        let offer = self.offer_for(customer, project_id, value).await;
        let sent = self.offers().send(offer.id, &self.actor).await.expect("offer sent");
        assert_eq!(sent.phase, OfferPhase::Sent);
        sent
    }

    /// Empty bidding project in `stalbygg`.
    pub async fn bidding_project(&self, name: &str) -> Project {
        let request = NewProject { company_id: Some("stalbygg".into()), ..NewProject::new(name) };
        self.projects().create(request, &self.actor).await.expect("project created")
    }

    /// Add a revenue-priced line to `parent`.
    pub async fn line(&self, parent: BudgetParent, name: &str, cost: f64, revenue: f64) -> BudgetLineItem {
        self.budgets()
            .add_line(parent, NewBudgetLine::new(name, cost, Pricing::Revenue(revenue)))
            .await
            .expect("line added")
    }
}
