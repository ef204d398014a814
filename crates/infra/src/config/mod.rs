//! Configuration loading for the dealflow services
//!
//! The [`Config`](dealflow_domain::Config) structures live in the domain
//! crate; this module only knows where to find values.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
