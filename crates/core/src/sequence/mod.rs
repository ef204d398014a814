//! Shared document numbering
//!
//! Offers and projects draw from one counter per (company, year), so a
//! formatted number is never issued twice across the two kinds.

mod service;

pub use service::{issue_number, raise_for_manual_number, SequenceService};
