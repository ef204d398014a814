//! Application wiring: every lifecycle service over the SQLite adapters.

use std::sync::Arc;

use dealflow_core::{Collaborators, Services, SideEffects};
use dealflow_domain::{Config, Result};
use tracing::info;

use crate::adapters::{ConfiguredCompanyDirectory, LocalFileStore, TracingNotifier};
use crate::database::{DbManager, SqliteActivityLog, SqliteContactDirectory, SqliteStore};

/// Fully wired application.
pub struct AppContext {
    pub config: Config,
    /// Pool used by store transactions and the activity log.
    pub db: Arc<DbManager>,
    /// Directory over a separate read pool.
    pub contacts: Arc<SqliteContactDirectory>,
    pub activity: Arc<SqliteActivityLog>,
    pub services: Services,
}

impl AppContext {
    /// Open the database, apply migrations and build the services.
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let read_db = Arc::new(DbManager::from_config(&config.database)?);
        let contacts = Arc::new(SqliteContactDirectory::new(read_db));
        let activity = Arc::new(SqliteActivityLog::new(Arc::clone(&db)));

        let effects = SideEffects::new(
            activity.clone(),
            Arc::new(TracingNotifier),
            Arc::new(LocalFileStore::new(&config.files.root)),
        );
        let deps = Collaborators::new(
            Arc::new(SqliteStore::new(Arc::clone(&db))),
            contacts.clone(),
            Arc::new(ConfiguredCompanyDirectory::from_config(&config)),
            effects,
        );
        let services = Services::new(&deps);

        info!(
            db_path = %db.path().display(),
            companies = config.companies.len(),
            "dealflow context ready"
        );

        Ok(Self { config, db, contacts, activity, services })
    }

    /// Load configuration, install tracing and build the context.
    pub fn from_env() -> Result<Self> {
        let config = crate::config::load()?;
        crate::observability::init_tracing(&config.logging)?;
        Self::new(config)
    }
}
