//! Bidding-project recomputation shared by the offer, project and budget flows

use chrono::{DateTime, Utc};
use dealflow_domain::{check_transition, Project, ProjectPhase, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::deps::found;
use crate::ports::StoreTx;

/// What to do with a bidding project that has no open offers left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WhenEmpty {
    Keep,
    Cancel,
}

/// Result of refreshing a project's derived fields.
#[derive(Debug, Clone)]
pub(crate) struct Refresh {
    pub project: Project,
    pub cancelled: bool,
}

/// Recompute customer and economics of a bidding project from its offers.
///
/// Projects outside the bidding phase are returned untouched.
pub(crate) async fn refresh_project(
    tx: &mut dyn StoreTx,
    project_id: Uuid,
    when_empty: WhenEmpty,
    now: DateTime<Utc>,
) -> Result<Refresh> {
    let mut project = found(tx.get_project(project_id).await?, "project", project_id)?;
    if project.phase != ProjectPhase::Bidding {
        return Ok(Refresh { project, cancelled: false });
    }

    let offers = tx.list_offers_by_project(project_id).await?;
    let derivation = project.derive_from_offers(&offers);
    debug!(
        project = %project_id,
        open_offers = derivation.open_offers,
        best_offer = ?derivation.best_offer_id,
        "re-derived bidding project"
    );

    let mut cancelled = false;
    if derivation.open_offers == 0 && when_empty == WhenEmpty::Cancel {
        check_transition(project.phase, ProjectPhase::Cancelled)?;
        project.phase = ProjectPhase::Cancelled;
        cancelled = true;
        info!(project = %project_id, "bidding project cancelled, no open offers remain");
    }

    project.updated_at = now;
    tx.update_project(&project).await?;
    Ok(Refresh { project, cancelled })
}
