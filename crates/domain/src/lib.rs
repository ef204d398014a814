//! # Dealflow Domain
//!
//! Business domain types and rules for the Dealflow pipeline.
//!
//! This crate contains:
//! - Deal, Offer, Project and budget types
//! - Transition tables for deal stages and offer/project phases
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Pure computations (margins, document numbers, fill-if-absent merging)
//!
//! ## Architecture
//! - No dependencies on other Dealflow crates
//! - Only external dependencies allowed
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod lifecycle;
pub mod macros;
pub mod merge;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use lifecycle::{check_edge, check_transition, DealStage, Lifecycle, OfferPhase, ProjectPhase};
pub use merge::{fill_if_absent, Absent};
pub use types::*;
