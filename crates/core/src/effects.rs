//! Best-effort side effects
//!
//! Activity entries, notifications and file cleanup run after the primary
//! transaction has committed. Each call is isolated: a failure is logged and
//! never reaches the caller of the business operation.

use std::sync::Arc;

use dealflow_domain::{ActivityEntry, EntityRef, Notification};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::ports::{ActivityLog, FileStore, Notifier};

/// Post-commit side-effect dispatcher.
#[derive(Clone)]
pub struct SideEffects {
    activity: Arc<dyn ActivityLog>,
    notifier: Arc<dyn Notifier>,
    files: Arc<dyn FileStore>,
}

impl SideEffects {
    /// Create a dispatcher over the given collaborators.
    pub fn new(
        activity: Arc<dyn ActivityLog>,
        notifier: Arc<dyn Notifier>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self { activity, notifier, files }
    }

    /// Record activity entries; failures are logged per entry.
    pub async fn record(&self, entries: Vec<ActivityEntry>) {
        let calls = entries.into_iter().map(|entry| {
            let activity = Arc::clone(&self.activity);
            async move {
                let target = entry.target;
                if let Err(err) = activity.record(entry).await {
                    warn!(error = %err, %target, "failed to record activity entry");
                }
            }
        });
        join_all(calls).await;
    }

    /// Deliver notifications; failures are logged per notification.
    pub async fn notify(&self, notifications: Vec<Notification>) {
        let calls = notifications.into_iter().map(|notification| {
            let notifier = Arc::clone(&self.notifier);
            async move {
                let recipient = notification.recipient_id.clone();
                if let Err(err) = notifier.notify(notification).await {
                    warn!(error = %err, %recipient, "failed to deliver notification");
                }
            }
        });
        join_all(calls).await;
    }

    /// Remove stored files for a deleted entity.
    pub async fn purge_files(&self, owner: EntityRef) {
        match self.files.delete_all(owner).await {
            Ok(removed) => debug!(%owner, removed, "removed stored files"),
            Err(err) => warn!(error = %err, %owner, "failed to remove stored files"),
        }
    }
}
