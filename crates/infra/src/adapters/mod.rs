//! Side-effect and directory adapters that do not touch the database

pub mod companies;
pub mod files;
pub mod notifier;

pub use companies::ConfiguredCompanyDirectory;
pub use files::LocalFileStore;
pub use notifier::TracingNotifier;
