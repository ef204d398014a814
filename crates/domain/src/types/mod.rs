//! Domain types and models

pub mod budget;
pub mod deal;
pub mod offer;
pub mod project;
pub mod refs;
pub mod sequence;

pub use budget::{
    resolve_revenue, revenue_for_margin, BudgetLineItem, BudgetParent, BudgetParentKind,
    BudgetSummary, Pricing,
};
pub use deal::{loss_note, validate_probability, Deal, DealStageHistory, LossReason};
pub use offer::{best_offer, margin_percent, Offer, ORDER_NUMBER_SUFFIX};
pub use project::{Derivation, Project};
pub use refs::{
    ActivityEntry, Actor, CompanyProfile, CustomerRef, EntityKind, EntityRef, Notification,
    UserRef,
};
pub use sequence::{format_document_number, parse_document_number, DocumentKind, NumberSequence};
