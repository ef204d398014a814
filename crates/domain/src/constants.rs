//! Application constants
//!
//! Centralized location for domain-level defaults and fixed labels.

// Configuration defaults
pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_COMPANY_ID: &str = "gruppen";
pub const DEFAULT_OFFER_VALIDITY_DAYS: i64 = 60;

// Deals
pub const DEFAULT_CURRENCY: &str = "NOK";
pub const NOTE_DEAL_CREATED: &str = "Deal created";
pub const NOTE_DEAL_WON: &str = "Deal won";
pub const NOTE_DEAL_REOPENED: &str = "Deal reopened";
pub const NOTE_OFFER_FROM_DEAL: &str = "Offer created from deal";

// Offers
pub const CLONE_TITLE_PREFIX: &str = "Copy of ";
pub const AUTO_PROJECT_PREFIX: &str = "[AUTO] ";
