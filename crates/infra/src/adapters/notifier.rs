//! Notification delivery through the tracing pipeline.

use async_trait::async_trait;
use dealflow_core::Notifier;
use dealflow_domain::{Notification, Result};
use tracing::info;

/// [`Notifier`] that emits each notification as a structured log event.
///
/// Stands in for push or email delivery; a log shipper can route the
/// `dealflow::notification` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        info!(
            target: "dealflow::notification",
            recipient = %notification.recipient_id,
            target_ref = %notification.target,
            title = %notification.title,
            body = %notification.body,
            "notification dispatched"
        );
        Ok(())
    }
}
