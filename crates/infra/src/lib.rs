//! # Dealflow Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The SQLite store, contact directory and activity log
//! - Configuration loading (environment, TOML, JSON)
//! - Tracing subscriber bootstrap
//! - Company directory, notifier and file storage adapters
//! - [`AppContext`] wiring every service together
//!
//! ## Architecture
//! - Implements traits defined in `dealflow-core`
//! - Contains all "impure" code (database, filesystem, environment)

pub mod adapters;
pub mod config;
pub mod context;
pub mod database;
pub mod errors;
pub mod observability;

// Re-export commonly used items
pub use adapters::*;
pub use context::AppContext;
pub use database::*;
pub use errors::InfraError;
