//! Project service

use chrono::{DateTime, Utc};
use dealflow_domain::{
    check_edge, check_transition, ActivityEntry, Actor, BudgetParent, ConflictReason,
    DealflowError, DocumentKind, EntityRef, Offer, OfferPhase, Project, ProjectPhase, Result,
    ValidationReason,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{blank_project, BudgetInheritance, NewProject, ProjectPatch};
use crate::budget::{clone_lines, CloneMode};
use crate::cascade::{refresh_project, WhenEmpty};
use crate::deps::{found, Collaborators};
use crate::ports::StoreTx;
use crate::sequence::{issue_number, raise_for_manual_number};

/// Project lifecycle service
pub struct ProjectService {
    deps: Collaborators,
}

impl ProjectService {
    /// Create a new project service
    pub fn new(deps: Collaborators) -> Self {
        Self { deps }
    }

    /// Fetch a project.
    pub async fn get(&self, id: Uuid) -> Result<Project> {
        let mut tx = self.deps.store.begin().await?;
        load(tx.as_mut(), id).await
    }

    /// Offers linked to the project, oldest first.
    pub async fn list_offers(&self, id: Uuid) -> Result<Vec<Offer>> {
        let mut tx = self.deps.store.begin().await?;
        load(tx.as_mut(), id).await?;
        tx.list_offers_by_project(id).await
    }

    /// Create a project in `Bidding` (default) or directly in `Working`.
    ///
    /// Working projects get a start date and a number from the shared sequence.
    pub async fn create(&self, request: NewProject, actor: &Actor) -> Result<Project> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(DealflowError::validation(
                ValidationReason::MissingField,
                "project name must not be blank",
            ));
        }
        let phase = request.phase.unwrap_or(ProjectPhase::Bidding);
        if !matches!(phase, ProjectPhase::Bidding | ProjectPhase::Working) {
            return Err(DealflowError::validation(
                ValidationReason::InvalidInitialPhase,
                format!("projects start in tilbud or working, not {phase}"),
            ));
        }

        let customer = match request.customer_id {
            Some(customer_id) => Some(self.deps.customer(customer_id).await?),
            None => None,
        };
        let company =
            self.deps.resolve_company(request.company_id.as_deref(), customer.as_ref()).await?;
        let responsible_name = match request.responsible_id.as_deref() {
            Some(user_id) => Some(self.deps.user_name(user_id).await?),
            None => None,
        };

        let now = Utc::now();
        let mut project = blank_project(name, &company.id, phase, now);
        if let Some(customer) = customer {
            project.customer_id = Some(customer.id);
            project.customer_name = Some(customer.name);
        }
        project.responsible_id = request.responsible_id;
        project.responsible_name = responsible_name;
        project.deal_id = request.deal_id;
        project.summary = request.summary;
        project.description = request.description;
        project.location = request.location;
        project.external_reference = request.external_reference.filter(|r| !r.trim().is_empty());
        if request.start_date.is_some() {
            project.start_date = request.start_date;
        }
        project.end_date = request.end_date;

        let mut tx = self.deps.store.begin().await?;
        if phase == ProjectPhase::Working {
            project.project_number =
                Some(issue_number(tx.as_mut(), &company, DocumentKind::Project).await?);
        }
        tx.insert_project(&project).await?;
        tx.commit().await?;

        info!(project = %project.id, phase = %project.phase, number = ?project.project_number, "project created");
        self.record(&project, "Project created", format!("Created in phase {phase}"), actor).await;
        Ok(project)
    }

    /// Apply a partial update. Refused on completed or cancelled projects.
    pub async fn update(&self, id: Uuid, patch: ProjectPatch, actor: &Actor) -> Result<Project> {
        let responsible = match patch.responsible_id {
            Some(user_id) => {
                let name = self.deps.user_name(&user_id).await?;
                Some((user_id, name))
            }
            None => None,
        };

        let mut tx = self.deps.store.begin().await?;
        let mut project = load(tx.as_mut(), id).await?;
        project.ensure_editable("update")?;

        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(DealflowError::validation(
                    ValidationReason::MissingField,
                    "project name must not be blank",
                ));
            }
            project.name = name;
        }
        if let Some(summary) = patch.summary {
            project.summary = summary;
        }
        if let Some(description) = patch.description {
            project.description = description;
        }
        if let Some(location) = patch.location {
            project.location = location;
        }
        if patch.start_date.is_some() {
            project.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            project.end_date = patch.end_date;
        }
        check_date_order(project.start_date, project.end_date)?;
        if let Some((user_id, name)) = responsible {
            project.responsible_id = Some(user_id);
            project.responsible_name = Some(name);
        }
        if let Some(reference) = patch.external_reference {
            let reference = reference.trim().to_string();
            project.external_reference = (!reference.is_empty()).then_some(reference);
        }
        if let Some(number) = patch.project_number {
            let number = number.trim().to_string();
            if number.is_empty() {
                return Err(DealflowError::validation(
                    ValidationReason::MissingField,
                    "project number must not be blank",
                ));
            }
            if let Some(other) = tx.find_project_by_number(&number).await? {
                if other.id != project.id {
                    return Err(DealflowError::conflict(
                        ConflictReason::DuplicateNumber,
                        format!("project number '{number}' is already issued"),
                    ));
                }
            }
            let company = self.deps.company(&project.company_id).await?;
            raise_for_manual_number(tx.as_mut(), &company, &number).await?;
            project.project_number = Some(number);
        }

        project.updated_at = Utc::now();
        tx.update_project(&project).await?;
        tx.commit().await?;

        self.record(&project, "Project updated", String::new(), actor).await;
        Ok(project)
    }

    /// Rename the project.
    pub async fn update_name(&self, id: Uuid, name: String, actor: &Actor) -> Result<Project> {
        self.update(id, ProjectPatch { name: Some(name), ..ProjectPatch::default() }, actor).await
    }

    /// Replace the description.
    pub async fn update_description(
        &self,
        id: Uuid,
        description: String,
        actor: &Actor,
    ) -> Result<Project> {
        let patch = ProjectPatch { description: Some(description), ..ProjectPatch::default() };
        self.update(id, patch, actor).await
    }

    /// Set start and end dates.
    pub async fn update_dates(
        &self,
        id: Uuid,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<Project> {
        let patch = ProjectPatch { start_date, end_date, ..ProjectPatch::default() };
        self.update(id, patch, actor).await
    }

    /// Replace the project number by hand.
    pub async fn update_project_number(
        &self,
        id: Uuid,
        number: String,
        actor: &Actor,
    ) -> Result<Project> {
        let patch = ProjectPatch { project_number: Some(number), ..ProjectPatch::default() };
        self.update(id, patch, actor).await
    }

    /// Move along the phase table.
    ///
    /// Entering `Working` fills a missing start date and project number;
    /// returning to `Bidding` re-derives customer and economics.
    #[instrument(skip(self, actor))]
    pub async fn update_phase(
        &self,
        id: Uuid,
        target: ProjectPhase,
        actor: &Actor,
    ) -> Result<Project> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut project = load(tx.as_mut(), id).await?;
        check_transition(project.phase, target)?;

        let from = project.phase;
        self.enter_phase(tx.as_mut(), &mut project, target, now).await?;
        tx.update_project(&project).await?;
        if target == ProjectPhase::Bidding {
            project = refresh_project(tx.as_mut(), id, WhenEmpty::Keep, now).await?.project;
        }
        tx.commit().await?;

        self.record(&project, "Project phase changed", format!("{from} -> {target}"), actor).await;
        Ok(project)
    }

    /// Reopen a completed or cancelled project.
    ///
    /// A recorded winning offer is walked back to `Sent` through the offer
    /// table, and the winning snapshot is cleared.
    #[instrument(skip(self, actor))]
    pub async fn reopen(&self, id: Uuid, target: ProjectPhase, actor: &Actor) -> Result<Project> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut project = load(tx.as_mut(), id).await?;
        check_edge(project.phase, target, project.phase.reopen_targets())?;

        let reverted = match project.winning_offer_id {
            Some(offer_id) => revert_winning_offer(tx.as_mut(), offer_id, now).await?,
            None => None,
        };
        project.clear_winning_offer();

        let from = project.phase;
        self.enter_phase(tx.as_mut(), &mut project, target, now).await?;
        tx.update_project(&project).await?;
        if target == ProjectPhase::Bidding {
            project = refresh_project(tx.as_mut(), id, WhenEmpty::Keep, now).await?.project;
        }
        tx.commit().await?;

        info!(%from, to = %target, reverted_offer = ?reverted.as_ref().map(|o| o.id), "project reopened");
        let mut entries = vec![ActivityEntry::new(
            EntityRef::Project(project.id),
            &project.name,
            "Project reopened",
            format!("{from} -> {target}"),
            actor,
        )];
        if let Some(offer) = &reverted {
            entries.push(ActivityEntry::new(
                EntityRef::Offer(offer.id),
                &offer.title,
                "Offer reverted to sent",
                format!("Project '{}' reopened", project.name),
                actor,
            ));
        }
        self.deps.effects.record(entries).await;
        Ok(project)
    }

    /// Copy a won offer's budget onto the project and take its economics.
    #[instrument(skip(self, actor))]
    pub async fn inherit_budget_from_offer(
        &self,
        id: Uuid,
        offer_id: Uuid,
        actor: &Actor,
    ) -> Result<BudgetInheritance> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut project = load(tx.as_mut(), id).await?;
        project.ensure_editable("inherit_budget")?;
        let offer = found(tx.get_offer(offer_id).await?, "offer", offer_id)?;
        if !offer.phase.is_won() {
            return Err(DealflowError::validation(
                ValidationReason::OfferNotWon,
                format!("offer '{}' is {}, not won", offer.title, offer.phase),
            ));
        }

        let report = clone_lines(
            tx.as_mut(),
            BudgetParent::Offer(offer.id),
            BudgetParent::Project(project.id),
            CloneMode::Strict,
        )
        .await?;
        project.value = offer.value;
        project.cost = offer.cost;
        if report.cloned > 0 {
            project.has_detailed_budget = true;
        }
        if project.winning_offer_id.is_none() {
            project.winning_offer_id = Some(offer.id);
            project.winning_offer_number.clone_from(&offer.offer_number);
        }
        project.updated_at = now;
        tx.update_project(&project).await?;
        tx.commit().await?;

        self.record(
            &project,
            "Budget inherited from offer",
            format!("{} lines from '{}'", report.cloned, offer.title),
            actor,
        )
        .await;
        Ok(BudgetInheritance { project, cloned_lines: report.cloned })
    }

    /// Recompute derived customer and economics of a bidding project.
    pub async fn resync_from_best_offer(&self, id: Uuid) -> Result<Project> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let project = load(tx.as_mut(), id).await?;
        if project.phase != ProjectPhase::Bidding {
            return Err(DealflowError::illegal_transition(
                "project",
                project.phase,
                "resync_from_best_offer",
            ));
        }
        let refresh = refresh_project(tx.as_mut(), id, WhenEmpty::Keep, now).await?;
        tx.commit().await?;
        Ok(refresh.project)
    }

    /// Delete an empty project with its budget lines, then its stored files.
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<()> {
        let mut tx = self.deps.store.begin().await?;
        let project = load(tx.as_mut(), id).await?;
        let offers = tx.list_offers_by_project(id).await?;
        if !offers.is_empty() {
            return Err(DealflowError::conflict(
                ConflictReason::ProjectHasOffers,
                format!("project '{}' still has {} offers", project.name, offers.len()),
            ));
        }

        let removed = tx.delete_budget_lines(BudgetParent::Project(id)).await?;
        tx.delete_project(id).await?;
        tx.commit().await?;

        info!(project = %id, budget_lines = removed, "project deleted");
        self.deps.effects.purge_files(EntityRef::Project(id)).await;
        self.record(&project, "Project deleted", String::new(), actor).await;
        Ok(())
    }

    async fn enter_phase(
        &self,
        tx: &mut dyn StoreTx,
        project: &mut Project,
        target: ProjectPhase,
        now: DateTime<Utc>,
    ) -> Result<()> {
        project.ensure_start_date(target, now);
        if target == ProjectPhase::Working && project.project_number.is_none() {
            let company = self.deps.company(&project.company_id).await?;
            project.project_number = Some(issue_number(tx, &company, DocumentKind::Project).await?);
        }
        project.phase = target;
        project.updated_at = now;
        Ok(())
    }

    async fn record(&self, project: &Project, title: &str, body: String, actor: &Actor) {
        let entry =
            ActivityEntry::new(EntityRef::Project(project.id), &project.name, title, body, actor);
        self.deps.effects.record(vec![entry]).await;
    }
}

async fn load(tx: &mut dyn StoreTx, id: Uuid) -> Result<Project> {
    found(tx.get_project(id).await?, "project", id)
}

/// Walk a won offer back to `Sent`, one checked edge at a time.
///
/// Offers no longer in a won phase are left alone.
async fn revert_winning_offer(
    tx: &mut dyn StoreTx,
    offer_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Offer>> {
    let Some(mut offer) = tx.get_offer(offer_id).await? else {
        return Ok(None);
    };
    if !offer.phase.is_won() {
        return Ok(None);
    }
    if offer.phase == OfferPhase::Completed {
        check_transition(offer.phase, OfferPhase::Order)?;
        offer.phase = OfferPhase::Order;
    }
    check_transition(offer.phase, OfferPhase::Sent)?;
    offer.phase = OfferPhase::Sent;
    offer.updated_at = now;
    tx.update_offer(&offer).await?;
    Ok(Some(offer))
}

fn check_date_order(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(DealflowError::validation(
            ValidationReason::InvalidDateRange,
            "end date precedes the start date",
        )),
        _ => Ok(()),
    }
}
