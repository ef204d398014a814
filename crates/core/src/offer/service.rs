//! Offer service - phase moves and composite offer transactions

use chrono::{DateTime, Utc};
use dealflow_domain::constants::{AUTO_PROJECT_PREFIX, CLONE_TITLE_PREFIX};
use dealflow_domain::{
    check_transition, validate_probability, ActivityEntry, Actor, BudgetParent, CompanyProfile,
    ConflictReason, DealflowError, DocumentKind, EntityRef, Offer, OfferPhase, Project,
    ProjectPhase, Result, ValidationReason,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{CloneOfferRequest, NewOffer, OfferPatch, WinOutcome, WinRequest};
use crate::budget::{clone_lines, CloneMode};
use crate::cascade::{refresh_project, Refresh, WhenEmpty};
use crate::deps::{found, unavailable, Collaborators};
use crate::ports::StoreTx;
use crate::project::blank_project;
use crate::sequence::{issue_number, raise_for_manual_number};

/// Offer lifecycle service
pub struct OfferService {
    deps: Collaborators,
}

impl OfferService {
    /// Create a new offer service
    pub fn new(deps: Collaborators) -> Self {
        Self { deps }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Fetch an offer.
    pub async fn get(&self, id: Uuid) -> Result<Offer> {
        let mut tx = self.deps.store.begin().await?;
        load(tx.as_mut(), id).await
    }

    /// Offers linked to a project, oldest first.
    pub async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Offer>> {
        let mut tx = self.deps.store.begin().await?;
        found(tx.get_project(project_id).await?, "project", project_id)?;
        tx.list_offers_by_project(project_id).await
    }

    // ------------------------------------------------------------------
    // Create / update / delete
    // ------------------------------------------------------------------

    /// Create an offer in `Draft` or `InProgress`.
    ///
    /// Non-draft offers get a responsible party and a number immediately.
    pub async fn create(&self, request: NewOffer, actor: &Actor) -> Result<Offer> {
        let title = required_text(&request.title, "title")?;
        let probability = validate_probability(request.probability)?.unwrap_or(0);
        let phase = request.phase.unwrap_or(OfferPhase::InProgress);
        if !matches!(phase, OfferPhase::Draft | OfferPhase::InProgress) {
            return Err(DealflowError::validation(
                ValidationReason::InvalidInitialPhase,
                format!("offers start in draft or in_progress, not {phase}"),
            ));
        }
        check_date_range(request.sent_date, request.expiration_date)?;

        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;

        let project = match request.project_id {
            Some(project_id) => {
                let project = found(tx.get_project(project_id).await?, "project", project_id)?;
                ensure_accepts_offers(&project)?;
                Some(project)
            }
            None => None,
        };

        let customer_id = request
            .customer_id
            .or_else(|| project.as_ref().and_then(|p| p.customer_id))
            .ok_or_else(|| {
                DealflowError::validation(
                    ValidationReason::MissingCustomer,
                    "offer needs a customer, directly or through its project",
                )
            })?;
        let customer = self.deps.customer(customer_id).await?;
        let company =
            self.deps.resolve_company(request.company_id.as_deref(), Some(&customer)).await?;
        let responsible_name = match request.responsible_id.as_deref() {
            Some(user_id) => self.deps.user_name(user_id).await?,
            None => String::new(),
        };

        let mut offer = Offer {
            id: Uuid::now_v7(),
            title,
            offer_number: None,
            external_reference: normalize_reference(request.external_reference),
            customer_id: customer.id,
            customer_name: customer.name,
            project_id: request.project_id,
            company_id: company.id.clone(),
            phase,
            probability,
            value: 0.0,
            cost: 0.0,
            margin_percent: 0.0,
            responsible_id: request.responsible_id,
            responsible_name,
            description: request.description,
            notes: request.notes,
            location: request.location,
            sent_date: request.sent_date,
            expiration_date: request.expiration_date,
            created_at: now,
            updated_at: now,
        };
        offer.set_economics(request.value, request.cost);

        if phase != OfferPhase::Draft {
            self.resolve_responsible(&mut offer, &company).await?;
            offer.offer_number = Some(issue_number(tx.as_mut(), &company, DocumentKind::Offer).await?);
        }
        ensure_unique_reference(tx.as_mut(), &offer).await?;

        if offer.project_id.is_none() && request.create_project {
            let project = blank_project(
                format!("{AUTO_PROJECT_PREFIX}{}", offer.title),
                &offer.company_id,
                ProjectPhase::Bidding,
                now,
            );
            tx.insert_project(&project).await?;
            offer.project_id = Some(project.id);
            debug!(offer = %offer.id, project = %project.id, "auto-created bidding project");
        }

        tx.insert_offer(&offer).await?;
        if let Some(project_id) = offer.project_id {
            refresh_project(tx.as_mut(), project_id, WhenEmpty::Keep, now).await?;
        }
        tx.commit().await?;

        info!(offer = %offer.id, number = ?offer.offer_number, phase = %offer.phase, "offer created");
        self.record(&offer, "Offer created", format!("Offer created in phase {}", offer.phase), actor)
            .await;
        Ok(offer)
    }

    /// Apply a partial update. Refused once the offer is won, lost or expired.
    pub async fn update(&self, id: Uuid, patch: OfferPatch, actor: &Actor) -> Result<Offer> {
        let probability = validate_probability(patch.probability)?;
        let title = patch.title.as_deref().map(|title| required_text(title, "title")).transpose()?;
        let customer = match patch.customer_id {
            Some(customer_id) => Some(self.deps.customer(customer_id).await?),
            None => None,
        };
        let responsible = match patch.responsible_id {
            Some(user_id) => {
                let name = self.deps.user_name(&user_id).await?;
                Some((user_id, name))
            }
            None => None,
        };

        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut offer = load(tx.as_mut(), id).await?;
        offer.ensure_editable("update")?;

        if let Some(title) = title {
            offer.title = title;
        }
        if let Some(customer) = customer {
            offer.customer_id = customer.id;
            offer.customer_name = customer.name;
        }
        if let Some((user_id, name)) = responsible {
            offer.responsible_id = Some(user_id);
            offer.responsible_name = name;
        }
        if let Some(probability) = probability {
            offer.probability = probability;
        }
        let value = patch.value.unwrap_or(offer.value);
        let cost = patch.cost.unwrap_or(offer.cost);
        offer.set_economics(value, cost);
        if let Some(description) = patch.description {
            offer.description = description;
        }
        if let Some(notes) = patch.notes {
            offer.notes = notes;
        }
        if let Some(location) = patch.location {
            offer.location = location;
        }
        if patch.sent_date.is_some() {
            offer.sent_date = patch.sent_date;
        }
        if patch.expiration_date.is_some() {
            offer.expiration_date = patch.expiration_date;
        }
        check_date_range(offer.sent_date, offer.expiration_date)?;

        if let Some(reference) = patch.external_reference {
            offer.external_reference = normalize_reference(Some(reference));
            ensure_unique_reference(tx.as_mut(), &offer).await?;
        }
        if let Some(number) = patch.offer_number {
            if offer.phase == OfferPhase::Draft {
                return Err(DealflowError::validation(
                    ValidationReason::NumberOnDraft,
                    "draft offers are numbered when they leave draft",
                ));
            }
            let number = required_text(&number, "offer_number")?;
            offer.offer_number = Some(number.clone());
            ensure_unique_number(tx.as_mut(), &offer).await?;
            let company = self.deps.company(&offer.company_id).await?;
            raise_for_manual_number(tx.as_mut(), &company, &number).await?;
        }

        offer.updated_at = now;
        tx.update_offer(&offer).await?;
        if let Some(project_id) = offer.project_id {
            refresh_project(tx.as_mut(), project_id, WhenEmpty::Keep, now).await?;
        }
        tx.commit().await?;

        self.record(&offer, "Offer updated", String::new(), actor).await;
        Ok(offer)
    }

    /// Rename the offer.
    pub async fn update_title(&self, id: Uuid, title: String, actor: &Actor) -> Result<Offer> {
        self.update(id, OfferPatch { title: Some(title), ..OfferPatch::default() }, actor).await
    }

    /// Set the win probability.
    pub async fn update_probability(
        &self,
        id: Uuid,
        probability: u8,
        actor: &Actor,
    ) -> Result<Offer> {
        let patch = OfferPatch { probability: Some(probability), ..OfferPatch::default() };
        self.update(id, patch, actor).await
    }

    /// Hand the offer to another user.
    pub async fn update_responsible(
        &self,
        id: Uuid,
        user_id: String,
        actor: &Actor,
    ) -> Result<Offer> {
        let patch = OfferPatch { responsible_id: Some(user_id), ..OfferPatch::default() };
        self.update(id, patch, actor).await
    }

    /// Move the offer to another customer; a bidding project re-derives its customer.
    pub async fn update_customer(
        &self,
        id: Uuid,
        customer_id: Uuid,
        actor: &Actor,
    ) -> Result<Offer> {
        let patch = OfferPatch { customer_id: Some(customer_id), ..OfferPatch::default() };
        self.update(id, patch, actor).await
    }

    /// Set the offer value; the margin is recomputed.
    pub async fn update_value(&self, id: Uuid, value: f64, actor: &Actor) -> Result<Offer> {
        self.update(id, OfferPatch { value: Some(value), ..OfferPatch::default() }, actor).await
    }

    /// Set the offer cost; the margin is recomputed.
    pub async fn update_cost(&self, id: Uuid, cost: f64, actor: &Actor) -> Result<Offer> {
        self.update(id, OfferPatch { cost: Some(cost), ..OfferPatch::default() }, actor).await
    }

    /// Replace the description.
    pub async fn update_description(
        &self,
        id: Uuid,
        description: String,
        actor: &Actor,
    ) -> Result<Offer> {
        let patch = OfferPatch { description: Some(description), ..OfferPatch::default() };
        self.update(id, patch, actor).await
    }

    /// Replace the notes.
    pub async fn update_notes(&self, id: Uuid, notes: String, actor: &Actor) -> Result<Offer> {
        self.update(id, OfferPatch { notes: Some(notes), ..OfferPatch::default() }, actor).await
    }

    /// Set sent and expiration dates. The expiration may not precede the sent date.
    pub async fn update_dates(
        &self,
        id: Uuid,
        sent_date: Option<DateTime<Utc>>,
        expiration_date: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<Offer> {
        let patch = OfferPatch { sent_date, expiration_date, ..OfferPatch::default() };
        self.update(id, patch, actor).await
    }

    /// Set the external system reference, unique within the company.
    pub async fn update_external_reference(
        &self,
        id: Uuid,
        reference: String,
        actor: &Actor,
    ) -> Result<Offer> {
        let patch = OfferPatch { external_reference: Some(reference), ..OfferPatch::default() };
        self.update(id, patch, actor).await
    }

    /// Replace the offer number by hand.
    pub async fn update_number(&self, id: Uuid, number: String, actor: &Actor) -> Result<Offer> {
        self.update(id, OfferPatch { offer_number: Some(number), ..OfferPatch::default() }, actor)
            .await
    }

    /// Delete the offer with its budget lines, then its stored files.
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let offer = load(tx.as_mut(), id).await?;

        let removed = tx.delete_budget_lines(BudgetParent::Offer(id)).await?;
        tx.delete_offer(id).await?;
        if let Some(project_id) = offer.project_id {
            refresh_project(tx.as_mut(), project_id, WhenEmpty::Keep, now).await?;
        }
        tx.commit().await?;

        info!(offer = %id, budget_lines = removed, "offer deleted");
        self.deps.effects.purge_files(EntityRef::Offer(id)).await;
        self.record(&offer, "Offer deleted", String::new(), actor).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase moves
    // ------------------------------------------------------------------

    /// Move along the phase table. Won, completed, lost and expired are
    /// reachable only through their dedicated operations.
    #[instrument(skip(self, actor))]
    pub async fn advance(&self, id: Uuid, target: OfferPhase, actor: &Actor) -> Result<Offer> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut offer = load(tx.as_mut(), id).await?;
        if OfferPhase::DEDICATED_TARGETS.contains(&target) {
            return Err(DealflowError::illegal_transition("offer", offer.phase, target));
        }
        check_transition(offer.phase, target)?;

        let from = offer.phase;
        self.enter_phase(tx.as_mut(), &mut offer, target, now).await?;
        if let Some(project_id) = offer.project_id {
            refresh_project(tx.as_mut(), project_id, WhenEmpty::Keep, now).await?;
        }
        tx.commit().await?;

        self.record(&offer, "Offer phase changed", format!("{from} -> {target}"), actor).await;
        Ok(offer)
    }

    /// Send the offer: stamps sent and expiration dates, numbering a draft first.
    pub async fn send(&self, id: Uuid, actor: &Actor) -> Result<Offer> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut offer = load(tx.as_mut(), id).await?;
        if !matches!(offer.phase, OfferPhase::Draft | OfferPhase::InProgress) {
            return Err(DealflowError::illegal_transition("offer", offer.phase, OfferPhase::Sent));
        }

        self.enter_phase(tx.as_mut(), &mut offer, OfferPhase::Sent, now).await?;
        if let Some(project_id) = offer.project_id {
            refresh_project(tx.as_mut(), project_id, WhenEmpty::Keep, now).await?;
        }
        tx.commit().await?;

        self.record(&offer, "Offer sent", String::new(), actor).await;
        Ok(offer)
    }

    /// Win a sent offer in one transaction.
    ///
    /// 1. The offer moves to `Order` and its number gets the order suffix.
    /// 2. A bidding project expires the other open offers, releases its
    ///    derived fields and moves to `Working`.
    /// 3. Any linked project that is not closed fills empty fields from the
    ///    winner, records the winning snapshot and receives the offer's
    ///    budget lines. Lines copied by an earlier win are not copied again.
    /// 4. Without a project, one is created directly in `Working` when asked.
    ///
    /// Any failure rolls back every step. Storage failures surface as
    /// `DependencyUnavailable`.
    #[instrument(skip(self, request, actor))]
    pub async fn win(&self, id: Uuid, request: WinRequest, actor: &Actor) -> Result<WinOutcome> {
        let step = unavailable("offer win");
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut offer = load(tx.as_mut(), id).await?;
        check_transition(offer.phase, OfferPhase::Order)?;

        offer.phase = OfferPhase::Order;
        offer.mark_number_as_order();
        offer.updated_at = now;
        tx.update_offer(&offer).await.map_err(&step)?;

        let mut expired_offers = Vec::new();
        let mut cloned_lines = 0;
        let linked = offer.project_id;
        let project = match linked {
            Some(project_id) => {
                let row = tx.get_project(project_id).await.map_err(&step)?;
                let mut project = found(row, "project", project_id)?;
                if project.phase == ProjectPhase::Bidding {
                    let siblings = tx.list_offers_by_project(project_id).await.map_err(&step)?;
                    for mut sibling in siblings {
                        if sibling.id == offer.id || !sibling.phase.is_open() {
                            continue;
                        }
                        self.expire_in_tx(tx.as_mut(), &mut sibling, now).await.map_err(&step)?;
                        expired_offers.push(sibling.id);
                    }

                    project.release_derived_fields();
                    check_transition(project.phase, ProjectPhase::Working)?;
                    project.ensure_start_date(ProjectPhase::Working, now);
                    project.phase = ProjectPhase::Working;
                }
                if !project.phase.is_closed() {
                    project.absorb_winning_offer(&offer, now);
                    cloned_lines = self
                        .promote_budget(tx.as_mut(), &offer, &mut project)
                        .await
                        .map_err(&step)?;
                    project.updated_at = now;
                    tx.update_project(&project).await.map_err(&step)?;
                }
                Some(project)
            }
            None if request.create_project => {
                let name = request
                    .project_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| offer.title.clone());
                let mut project =
                    blank_project(name, &offer.company_id, ProjectPhase::Working, now);
                project.absorb_winning_offer(&offer, now);
                tx.insert_project(&project).await.map_err(&step)?;

                offer.project_id = Some(project.id);
                tx.update_offer(&offer).await.map_err(&step)?;

                cloned_lines = self
                    .promote_budget(tx.as_mut(), &offer, &mut project)
                    .await
                    .map_err(&step)?;
                tx.update_project(&project).await.map_err(&step)?;
                Some(project)
            }
            None => None,
        };

        tx.commit().await.map_err(&step)?;
        info!(
            number = ?offer.offer_number,
            project = ?project.as_ref().map(|p| p.id),
            expired = expired_offers.len(),
            cloned_lines,
            "offer won"
        );

        let mut entries = vec![ActivityEntry::new(
            EntityRef::Offer(offer.id),
            &offer.title,
            "Offer won",
            format!("Offer {} won", offer.offer_number.as_deref().unwrap_or_default()),
            actor,
        )];
        if let Some(project) = &project {
            entries.push(ActivityEntry::new(
                EntityRef::Project(project.id),
                &project.name,
                "Winning offer recorded",
                format!("Offer '{}' won; project is {}", offer.title, project.phase),
                actor,
            ));
        }
        self.deps.effects.record(entries).await;

        Ok(WinOutcome { offer, project, expired_offers, cloned_lines })
    }

    /// Accept an order; same transaction as [`Self::win`].
    pub async fn accept_order(
        &self,
        id: Uuid,
        request: WinRequest,
        actor: &Actor,
    ) -> Result<WinOutcome> {
        self.win(id, request, actor).await
    }

    /// Reject a sent offer or order. A bidding project without open offers
    /// left is cancelled in the same transaction.
    #[instrument(skip(self, reason, actor))]
    pub async fn reject(&self, id: Uuid, reason: &str, actor: &Actor) -> Result<Offer> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut offer = load(tx.as_mut(), id).await?;
        check_transition(offer.phase, OfferPhase::Lost)?;

        offer.append_lost_reason(reason);
        offer.phase = OfferPhase::Lost;
        offer.updated_at = now;
        tx.update_offer(&offer).await?;

        let refresh = match offer.project_id {
            Some(project_id) => {
                Some(refresh_project(tx.as_mut(), project_id, WhenEmpty::Cancel, now).await?)
            }
            None => None,
        };
        tx.commit().await?;

        info!(reason, "offer rejected");
        self.record_closure(&offer, "Offer lost", reason.to_string(), refresh, actor).await;
        Ok(offer)
    }

    /// Expire an open offer; drafts receive their number on the way out.
    #[instrument(skip(self, actor))]
    pub async fn expire(&self, id: Uuid, actor: &Actor) -> Result<Offer> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut offer = load(tx.as_mut(), id).await?;
        self.expire_in_tx(tx.as_mut(), &mut offer, now).await?;

        let refresh = match offer.project_id {
            Some(project_id) => {
                Some(refresh_project(tx.as_mut(), project_id, WhenEmpty::Cancel, now).await?)
            }
            None => None,
        };
        tx.commit().await?;

        info!("offer expired");
        self.record_closure(&offer, "Offer expired", String::new(), refresh, actor).await;
        Ok(offer)
    }

    /// Put a won order back to `Sent`. The order suffix stays on the number.
    pub async fn revert_to_sent(&self, id: Uuid, actor: &Actor) -> Result<Offer> {
        self.guarded_move(id, OfferPhase::Sent, "Offer reverted to sent", actor).await
    }

    /// Mark an order as delivered.
    pub async fn complete(&self, id: Uuid, actor: &Actor) -> Result<Offer> {
        self.guarded_move(id, OfferPhase::Completed, "Offer completed", actor).await
    }

    /// Reopen a completed order.
    pub async fn reopen(&self, id: Uuid, actor: &Actor) -> Result<Offer> {
        self.guarded_move(id, OfferPhase::Order, "Offer reopened", actor).await
    }

    // ------------------------------------------------------------------
    // Clone and project links
    // ------------------------------------------------------------------

    /// Copy an offer into a new unnumbered draft, optionally with its budget.
    pub async fn clone_offer(
        &self,
        id: Uuid,
        request: CloneOfferRequest,
        actor: &Actor,
    ) -> Result<Offer> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let source = load(tx.as_mut(), id).await?;

        let title = request
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| format!("{CLONE_TITLE_PREFIX}{}", source.title));
        let copy = Offer {
            id: Uuid::now_v7(),
            title,
            offer_number: None,
            external_reference: None,
            project_id: None,
            phase: OfferPhase::Draft,
            sent_date: None,
            expiration_date: None,
            created_at: now,
            updated_at: now,
            ..source.clone()
        };
        tx.insert_offer(&copy).await?;

        if request.include_budget {
            let report = clone_lines(
                tx.as_mut(),
                BudgetParent::Offer(source.id),
                BudgetParent::Offer(copy.id),
                CloneMode::BestEffort,
            )
            .await?;
            debug!(cloned = report.cloned, skipped = report.skipped, "offer budget cloned");
        }
        tx.commit().await?;

        self.record(&copy, "Offer cloned", format!("Cloned from '{}'", source.title), actor).await;
        Ok(copy)
    }

    /// Attach the offer to a project, re-deriving both old and new projects.
    pub async fn link_to_project(
        &self,
        id: Uuid,
        project_id: Uuid,
        actor: &Actor,
    ) -> Result<Offer> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut offer = load(tx.as_mut(), id).await?;
        offer.ensure_editable("link_project")?;
        let project = found(tx.get_project(project_id).await?, "project", project_id)?;
        ensure_accepts_offers(&project)?;

        let previous = offer.project_id.replace(project_id);
        offer.updated_at = now;
        tx.update_offer(&offer).await?;
        refresh_project(tx.as_mut(), project_id, WhenEmpty::Keep, now).await?;
        if let Some(previous) = previous.filter(|previous| *previous != project_id) {
            refresh_project(tx.as_mut(), previous, WhenEmpty::Keep, now).await?;
        }
        tx.commit().await?;

        self.record(&offer, "Offer linked to project", project.name, actor).await;
        Ok(offer)
    }

    /// Detach the offer from its project.
    pub async fn unlink_from_project(&self, id: Uuid, actor: &Actor) -> Result<Offer> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut offer = load(tx.as_mut(), id).await?;
        offer.ensure_editable("unlink_project")?;

        let Some(previous) = offer.project_id.take() else {
            return Ok(offer);
        };
        offer.updated_at = now;
        tx.update_offer(&offer).await?;
        refresh_project(tx.as_mut(), previous, WhenEmpty::Keep, now).await?;
        tx.commit().await?;

        self.record(&offer, "Offer unlinked from project", String::new(), actor).await;
        Ok(offer)
    }

    // ------------------------------------------------------------------
    // In-transaction helpers
    // ------------------------------------------------------------------

    /// Apply `target` after the caller has checked the edge.
    async fn enter_phase(
        &self,
        tx: &mut dyn StoreTx,
        offer: &mut Offer,
        target: OfferPhase,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let from = offer.phase;
        if from == OfferPhase::Draft {
            let company = self.deps.company(&offer.company_id).await?;
            self.resolve_responsible(offer, &company).await?;
            if offer.offer_number.is_none() {
                offer.offer_number = Some(issue_number(tx, &company, DocumentKind::Offer).await?);
            }
        }
        match target {
            OfferPhase::Sent => offer.stamp_sent(now, self.deps.companies.offer_validity_days()),
            OfferPhase::InProgress if from == OfferPhase::Sent => {
                offer.sent_date = None;
                offer.expiration_date = None;
            }
            _ => {}
        }
        offer.phase = target;
        offer.updated_at = now;
        tx.update_offer(offer).await
    }

    async fn expire_in_tx(
        &self,
        tx: &mut dyn StoreTx,
        offer: &mut Offer,
        now: DateTime<Utc>,
    ) -> Result<()> {
        check_transition(offer.phase, OfferPhase::Expired)?;
        if offer.offer_number.is_none() {
            let company = self.deps.company(&offer.company_id).await?;
            offer.offer_number = Some(issue_number(tx, &company, DocumentKind::Offer).await?);
        }
        offer.phase = OfferPhase::Expired;
        offer.updated_at = now;
        tx.update_offer(offer).await
    }

    /// Copy the winner's budget onto the project; any failure aborts the win.
    async fn promote_budget(
        &self,
        tx: &mut dyn StoreTx,
        offer: &Offer,
        project: &mut Project,
    ) -> Result<usize> {
        let report = clone_lines(
            tx,
            BudgetParent::Offer(offer.id),
            BudgetParent::Project(project.id),
            CloneMode::Strict,
        )
        .await?;
        if report.cloned > 0 {
            project.has_detailed_budget = true;
        }
        Ok(report.cloned)
    }

    async fn guarded_move(
        &self,
        id: Uuid,
        target: OfferPhase,
        title: &str,
        actor: &Actor,
    ) -> Result<Offer> {
        let mut tx = self.deps.store.begin().await?;
        let mut offer = load(tx.as_mut(), id).await?;
        check_transition(offer.phase, target)?;
        let from = offer.phase;
        offer.phase = target;
        offer.updated_at = Utc::now();
        tx.update_offer(&offer).await?;
        tx.commit().await?;

        self.record(&offer, title, format!("{from} -> {target}"), actor).await;
        Ok(offer)
    }

    /// Fill a missing responsible party from the company default.
    async fn resolve_responsible(&self, offer: &mut Offer, company: &CompanyProfile) -> Result<()> {
        if let Some(user_id) = offer.responsible_id.as_deref().filter(|id| !id.trim().is_empty()) {
            if offer.responsible_name.trim().is_empty() {
                offer.responsible_name = self.deps.user_name(user_id).await?;
            }
            return Ok(());
        }
        let Some(default) = company.default_responsible.as_ref() else {
            return Err(DealflowError::validation(
                ValidationReason::MissingResponsible,
                format!(
                    "offer '{}' has no responsible party and company '{}' has no default",
                    offer.title, company.id
                ),
            ));
        };
        offer.responsible_id = Some(default.id.clone());
        offer.responsible_name.clone_from(&default.display_name);
        Ok(())
    }

    async fn record(&self, offer: &Offer, title: &str, body: String, actor: &Actor) {
        let entry = ActivityEntry::new(EntityRef::Offer(offer.id), &offer.title, title, body, actor);
        self.deps.effects.record(vec![entry]).await;
    }

    async fn record_closure(
        &self,
        offer: &Offer,
        title: &str,
        body: String,
        refresh: Option<Refresh>,
        actor: &Actor,
    ) {
        let mut entries =
            vec![ActivityEntry::new(EntityRef::Offer(offer.id), &offer.title, title, body, actor)];
        if let Some(Refresh { project, cancelled: true }) = refresh {
            entries.push(ActivityEntry::new(
                EntityRef::Project(project.id),
                &project.name,
                "Project cancelled",
                "No open offers remain",
                actor,
            ));
        }
        self.deps.effects.record(entries).await;
    }
}

async fn load(tx: &mut dyn StoreTx, id: Uuid) -> Result<Offer> {
    found(tx.get_offer(id).await?, "offer", id)
}

fn ensure_accepts_offers(project: &Project) -> Result<()> {
    if project.phase.is_closed() {
        return Err(DealflowError::validation(
            ValidationReason::ProjectClosed,
            format!("project '{}' is {}", project.name, project.phase),
        ));
    }
    Ok(())
}

async fn ensure_unique_reference(tx: &mut dyn StoreTx, offer: &Offer) -> Result<()> {
    let Some(reference) = offer.external_reference.as_deref() else {
        return Ok(());
    };
    match tx.find_offer_by_external_reference(&offer.company_id, reference).await? {
        Some(other) if other.id != offer.id => Err(DealflowError::conflict(
            ConflictReason::DuplicateExternalReference,
            format!("external reference '{reference}' is used by offer {}", other.id),
        )),
        _ => Ok(()),
    }
}

async fn ensure_unique_number(tx: &mut dyn StoreTx, offer: &Offer) -> Result<()> {
    let Some(number) = offer.offer_number.as_deref() else {
        return Ok(());
    };
    match tx.find_offer_by_number(&offer.company_id, number).await? {
        Some(other) if other.id != offer.id => Err(DealflowError::conflict(
            ConflictReason::DuplicateNumber,
            format!("offer number '{number}' is already issued"),
        )),
        _ => Ok(()),
    }
}

fn check_date_range(
    sent: Option<DateTime<Utc>>,
    expiration: Option<DateTime<Utc>>,
) -> Result<()> {
    match (sent, expiration) {
        (Some(sent), Some(expiration)) if expiration < sent => Err(DealflowError::validation(
            ValidationReason::InvalidDateRange,
            "expiration date precedes the sent date",
        )),
        _ => Ok(()),
    }
}

fn normalize_reference(reference: Option<String>) -> Option<String> {
    reference.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
}

fn required_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DealflowError::validation(
            ValidationReason::MissingField,
            format!("{field} must not be blank"),
        ));
    }
    Ok(trimmed.to_string())
}
