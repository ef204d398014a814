//! # Dealflow Core
//!
//! Lifecycle orchestration - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for storage and side-effect collaborators
//! - The sequence, budget, offer, project and deal services
//! - The composite transactions (win, reject, expire, accept, convert)
//!
//! ## Architecture Principles
//! - Only depends on `dealflow-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Every operation runs in one store transaction; side effects run after commit

pub mod budget;
mod cascade;
pub mod deal;
pub mod deps;
pub mod effects;
pub mod offer;
pub mod ports;
pub mod project;
pub mod sequence;

pub use budget::{BudgetLedger, BudgetLinePatch, CloneMode, CloneReport, NewBudgetLine};
pub use deal::{
    DealPatch, DealService, DealWinOutcome, DealWinRequest, NewDeal, OfferFromDeal,
    OfferFromDealOutcome,
};
pub use deps::Collaborators;
pub use effects::SideEffects;
pub use offer::{CloneOfferRequest, NewOffer, OfferPatch, OfferService, WinOutcome, WinRequest};
pub use ports::{
    ActivityLog, CompanyDirectory, ContactDirectory, FileStore, Notifier, Store, StoreTx,
};
pub use project::{BudgetInheritance, NewProject, ProjectPatch, ProjectService};
pub use sequence::SequenceService;

/// All lifecycle services over one set of collaborators.
pub struct Services {
    pub sequences: SequenceService,
    pub budgets: BudgetLedger,
    pub offers: OfferService,
    pub projects: ProjectService,
    pub deals: DealService,
}

impl Services {
    /// Build every service from the same collaborators.
    pub fn new(deps: &Collaborators) -> Self {
        Self {
            sequences: SequenceService::new(deps.clone()),
            budgets: BudgetLedger::new(deps.clone()),
            offers: OfferService::new(deps.clone()),
            projects: ProjectService::new(deps.clone()),
            deals: DealService::new(deps.clone()),
        }
    }
}
