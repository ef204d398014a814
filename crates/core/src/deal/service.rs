//! Deal service - stage moves and deal-driven offer/project creation

use chrono::{DateTime, Utc};
use dealflow_domain::constants::{
    DEFAULT_CURRENCY, NOTE_DEAL_CREATED, NOTE_DEAL_REOPENED, NOTE_DEAL_WON, NOTE_OFFER_FROM_DEAL,
};
use dealflow_domain::{
    check_transition, loss_note, validate_probability, ActivityEntry, Actor, BudgetParent,
    BudgetSummary, ConflictReason, Deal, DealStage, DealStageHistory, DealflowError, DocumentKind,
    EntityRef, LossReason, Notification, Offer, OfferPhase, ProjectPhase, Result,
    ValidationReason,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    DealPatch, DealWinOutcome, DealWinRequest, NewDeal, OfferFromDeal, OfferFromDealOutcome,
};
use crate::budget::{clone_lines, CloneMode};
use crate::deps::{found, Collaborators};
use crate::ports::StoreTx;
use crate::project::blank_project;
use crate::sequence::issue_number;

/// Deal lifecycle service
pub struct DealService {
    deps: Collaborators,
}

impl DealService {
    /// Create a new deal service
    pub fn new(deps: Collaborators) -> Self {
        Self { deps }
    }

    /// Fetch a deal.
    pub async fn get(&self, id: Uuid) -> Result<Deal> {
        let mut tx = self.deps.store.begin().await?;
        load(tx.as_mut(), id).await
    }

    /// Deals, optionally restricted to one stage.
    pub async fn list_deals(&self, stage: Option<DealStage>) -> Result<Vec<Deal>> {
        let mut tx = self.deps.store.begin().await?;
        tx.list_deals(stage).await
    }

    /// Stage history of a deal, oldest first.
    pub async fn get_stage_history(&self, id: Uuid) -> Result<Vec<DealStageHistory>> {
        let mut tx = self.deps.store.begin().await?;
        load(tx.as_mut(), id).await?;
        tx.list_stage_history(id).await
    }

    /// Create a deal and its first history row.
    pub async fn create(&self, request: NewDeal, actor: &Actor) -> Result<Deal> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(DealflowError::validation(
                ValidationReason::MissingField,
                "deal title must not be blank",
            ));
        }
        let stage = request.stage.unwrap_or(DealStage::Lead);
        if stage.is_closed() {
            return Err(DealflowError::validation(
                ValidationReason::InvalidInitialPhase,
                format!("deals cannot be created in stage {stage}"),
            ));
        }
        let probability = validate_probability(request.probability)?;

        let customer = self.deps.customer(request.customer_id).await?;
        let company =
            self.deps.resolve_company(request.company_id.as_deref(), Some(&customer)).await?;
        let (owner_id, owner_name) = match request.owner_id {
            Some(owner_id) => {
                let name = self.deps.user_name(&owner_id).await?;
                (owner_id, name)
            }
            None => (actor.user_id.clone(), actor.display_name.clone()),
        };

        let now = Utc::now();
        let deal = Deal {
            id: Uuid::now_v7(),
            title,
            description: request.description,
            customer_id: customer.id,
            customer_name: customer.name,
            company_id: company.id,
            stage,
            probability: probability.unwrap_or_else(|| stage.default_probability()),
            value: request.value,
            currency: request
                .currency
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            owner_id,
            owner_name,
            offer_id: None,
            expected_close_date: request.expected_close_date,
            actual_close_date: None,
            lost_reason_category: None,
            lost_reason: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.deps.store.begin().await?;
        tx.insert_deal(&deal).await?;
        append_history(tx.as_mut(), &deal, None, NOTE_DEAL_CREATED, actor, now).await?;
        tx.commit().await?;

        info!(deal = %deal.id, stage = %deal.stage, "deal created");
        self.record(&deal, "Deal created", String::new(), actor).await;
        Ok(deal)
    }

    /// Apply a partial update. Refused on won or lost deals.
    pub async fn update(&self, id: Uuid, patch: DealPatch, actor: &Actor) -> Result<Deal> {
        let owner = match patch.owner_id {
            Some(owner_id) => {
                let name = self.deps.user_name(&owner_id).await?;
                Some((owner_id, name))
            }
            None => None,
        };

        let mut tx = self.deps.store.begin().await?;
        let mut deal = load(tx.as_mut(), id).await?;
        ensure_open(&deal, "update")?;

        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(DealflowError::validation(
                    ValidationReason::MissingField,
                    "deal title must not be blank",
                ));
            }
            deal.title = title;
        }
        if let Some(description) = patch.description {
            deal.description = description;
        }
        if let Some(value) = patch.value {
            deal.value = value;
        }
        if let Some(currency) = patch.currency.filter(|c| !c.trim().is_empty()) {
            deal.currency = currency;
        }
        if let Some((owner_id, owner_name)) = owner {
            deal.owner_id = owner_id;
            deal.owner_name = owner_name;
        }
        if let Some(notes) = patch.notes {
            deal.notes = notes;
        }
        if patch.expected_close_date.is_some() {
            deal.expected_close_date = patch.expected_close_date;
        }
        deal.updated_at = Utc::now();

        tx.update_deal(&deal).await?;
        tx.commit().await?;
        self.record(&deal, "Deal updated", String::new(), actor).await;
        Ok(deal)
    }

    /// Override the stage probability.
    pub async fn update_probability(
        &self,
        id: Uuid,
        probability: u8,
        actor: &Actor,
    ) -> Result<Deal> {
        let probability = validate_probability(Some(probability))?.unwrap_or(probability);
        let mut tx = self.deps.store.begin().await?;
        let mut deal = load(tx.as_mut(), id).await?;
        ensure_open(&deal, "update_probability")?;
        deal.probability = probability;
        deal.updated_at = Utc::now();
        tx.update_deal(&deal).await?;
        tx.commit().await?;

        self.record(&deal, "Deal probability changed", format!("{probability}%"), actor).await;
        Ok(deal)
    }

    /// Delete a deal together with its stage history.
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<()> {
        let mut tx = self.deps.store.begin().await?;
        let deal = load(tx.as_mut(), id).await?;
        let removed = tx.delete_stage_history(id).await?;
        tx.delete_deal(id).await?;
        tx.commit().await?;

        info!(deal = %id, history_rows = removed, "deal deleted");
        self.deps.effects.purge_files(EntityRef::Deal(id)).await;
        self.record(&deal, "Deal deleted", String::new(), actor).await;
        Ok(())
    }

    /// Move along the stage graph, recording exactly one history row.
    #[instrument(skip(self, notes, actor))]
    pub async fn advance_stage(
        &self,
        id: Uuid,
        target: DealStage,
        probability: Option<u8>,
        notes: Option<String>,
        actor: &Actor,
    ) -> Result<Deal> {
        let probability = validate_probability(probability)?;
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut deal = load(tx.as_mut(), id).await?;
        check_transition(deal.stage, target)?;

        let from = deal.stage;
        deal.enter_stage(target, probability, now);
        tx.update_deal(&deal).await?;
        let note = notes.unwrap_or_default();
        append_history(tx.as_mut(), &deal, Some(from), &note, actor, now).await?;
        tx.commit().await?;

        self.record(&deal, "Deal stage changed", format!("{from} -> {target}"), actor).await;
        Ok(deal)
    }

    /// Win a deal in negotiation, optionally spawning an active project.
    ///
    /// The project takes its budget from the deal's offer when one is linked,
    /// otherwise the deal value. Owner and actor are notified after commit.
    #[instrument(skip(self, request, actor))]
    pub async fn win(
        &self,
        id: Uuid,
        request: DealWinRequest,
        actor: &Actor,
    ) -> Result<DealWinOutcome> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut deal = load(tx.as_mut(), id).await?;
        if deal.stage != DealStage::Negotiation {
            return Err(DealflowError::illegal_transition("deal", deal.stage, DealStage::Won));
        }
        check_transition(deal.stage, DealStage::Won)?;

        let from = deal.stage;
        deal.enter_stage(DealStage::Won, None, now);
        tx.update_deal(&deal).await?;
        append_history(tx.as_mut(), &deal, Some(from), NOTE_DEAL_WON, actor, now).await?;

        let mut cloned_lines = 0;
        let project = if request.create_project {
            let name = request
                .project_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| deal.title.clone());
            let company = self.deps.company(&deal.company_id).await?;
            let mut project = blank_project(name, &deal.company_id, ProjectPhase::Working, now);
            project.customer_id = Some(deal.customer_id);
            project.customer_name = Some(deal.customer_name.clone());
            project.deal_id = Some(deal.id);
            project.description.clone_from(&deal.description);
            project.responsible_id = Some(deal.owner_id.clone());
            project.responsible_name = Some(deal.owner_name.clone());
            project.project_number =
                Some(issue_number(tx.as_mut(), &company, DocumentKind::Project).await?);

            let offer = match deal.offer_id {
                Some(offer_id) => tx.get_offer(offer_id).await?,
                None => None,
            };
            match offer {
                Some(offer) => {
                    project.value = offer.value;
                    project.cost = offer.cost;
                    tx.insert_project(&project).await?;
                    let report = clone_lines(
                        tx.as_mut(),
                        BudgetParent::Offer(offer.id),
                        BudgetParent::Project(project.id),
                        CloneMode::Strict,
                    )
                    .await?;
                    cloned_lines = report.cloned;
                    if report.cloned > 0 {
                        project.has_detailed_budget = true;
                        tx.update_project(&project).await?;
                    }
                }
                None => {
                    project.value = deal.value;
                    tx.insert_project(&project).await?;
                }
            }
            Some(project)
        } else {
            None
        };
        tx.commit().await?;

        info!(project = ?project.as_ref().map(|p| p.id), cloned_lines, "deal won");
        let mut entries = vec![ActivityEntry::new(
            EntityRef::Deal(deal.id),
            &deal.title,
            "Deal won",
            String::new(),
            actor,
        )];
        if let Some(project) = &project {
            entries.push(ActivityEntry::new(
                EntityRef::Project(project.id),
                &project.name,
                "Project created from deal",
                format!("Deal '{}' won", deal.title),
                actor,
            ));
        }
        self.deps.effects.record(entries).await;
        self.deps.effects.notify(win_notifications(&deal, actor)).await;

        Ok(DealWinOutcome { deal, project, cloned_lines })
    }

    /// Lose a deal. Notes are mandatory.
    #[instrument(skip(self, notes, actor))]
    pub async fn lose(
        &self,
        id: Uuid,
        category: LossReason,
        notes: &str,
        actor: &Actor,
    ) -> Result<Deal> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(DealflowError::validation(
                ValidationReason::MissingLossNotes,
                "losing a deal requires notes",
            ));
        }

        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut deal = load(tx.as_mut(), id).await?;
        if deal.stage.is_closed() {
            return Err(DealflowError::illegal_transition("deal", deal.stage, DealStage::Lost));
        }
        check_transition(deal.stage, DealStage::Lost)?;

        let from = deal.stage;
        deal.enter_stage(DealStage::Lost, None, now);
        deal.lost_reason_category = Some(category);
        deal.lost_reason = Some(notes.to_string());
        tx.update_deal(&deal).await?;
        let note = loss_note(category, notes);
        append_history(tx.as_mut(), &deal, Some(from), &note, actor, now).await?;
        tx.commit().await?;

        self.record(&deal, "Deal lost", note, actor).await;
        Ok(deal)
    }

    /// Reopen a lost deal as a lead.
    pub async fn reopen(&self, id: Uuid, actor: &Actor) -> Result<Deal> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut deal = load(tx.as_mut(), id).await?;
        if deal.stage != DealStage::Lost {
            return Err(DealflowError::illegal_transition("deal", deal.stage, DealStage::Lead));
        }
        check_transition(deal.stage, DealStage::Lead)?;

        deal.enter_stage(DealStage::Lead, None, now);
        tx.update_deal(&deal).await?;
        append_history(tx.as_mut(), &deal, Some(DealStage::Lost), NOTE_DEAL_REOPENED, actor, now)
            .await?;
        tx.commit().await?;

        self.record(&deal, "Deal reopened", String::new(), actor).await;
        Ok(deal)
    }

    /// Spawn a draft offer from a lead or qualified deal and move the deal to
    /// `Proposal`, all in one transaction.
    #[instrument(skip(self, request, actor))]
    pub async fn create_offer_from_deal(
        &self,
        id: Uuid,
        request: OfferFromDeal,
        actor: &Actor,
    ) -> Result<OfferFromDealOutcome> {
        let now = Utc::now();
        let mut tx = self.deps.store.begin().await?;
        let mut deal = load(tx.as_mut(), id).await?;
        if !matches!(deal.stage, DealStage::Lead | DealStage::Qualified) {
            return Err(DealflowError::illegal_transition("deal", deal.stage, DealStage::Proposal));
        }
        if let Some(existing) = deal.offer_id {
            return Err(DealflowError::conflict(
                ConflictReason::DealAlreadyHasOffer,
                format!("deal '{}' already has offer {existing}", deal.title),
            ));
        }

        let (responsible_id, responsible_name) = match request.responsible_id {
            Some(user_id) => {
                let name = self.deps.user_name(&user_id).await?;
                (user_id, name)
            }
            None => (actor.user_id.clone(), actor.display_name.clone()),
        };
        let title = request
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| deal.title.clone());

        let mut offer = Offer {
            id: Uuid::now_v7(),
            title,
            offer_number: None,
            external_reference: None,
            customer_id: deal.customer_id,
            customer_name: deal.customer_name.clone(),
            project_id: None,
            company_id: deal.company_id.clone(),
            phase: OfferPhase::Draft,
            probability: DealStage::Proposal.default_probability(),
            value: 0.0,
            cost: 0.0,
            margin_percent: 0.0,
            responsible_id: Some(responsible_id),
            responsible_name,
            description: deal.description.clone(),
            notes: String::new(),
            location: String::new(),
            sent_date: None,
            expiration_date: None,
            created_at: now,
            updated_at: now,
        };
        offer.set_economics(deal.value, 0.0);
        tx.insert_offer(&offer).await?;

        let mut cloned_lines = 0;
        if let Some(template_id) = request.template_offer_id {
            found(tx.get_offer(template_id).await?, "offer", template_id)?;
            let report = clone_lines(
                tx.as_mut(),
                BudgetParent::Offer(template_id),
                BudgetParent::Offer(offer.id),
                CloneMode::BestEffort,
            )
            .await?;
            cloned_lines = report.cloned;
            let summary =
                BudgetSummary::from_lines(&tx.list_budget_lines(BudgetParent::Offer(offer.id)).await?);
            if summary.total_revenue > 0.0 {
                offer.set_economics(summary.total_revenue, summary.total_cost);
                tx.update_offer(&offer).await?;
            }
        }

        let from = deal.stage;
        deal.offer_id = Some(offer.id);
        deal.enter_stage(DealStage::Proposal, None, now);
        tx.update_deal(&deal).await?;
        append_history(tx.as_mut(), &deal, Some(from), NOTE_OFFER_FROM_DEAL, actor, now).await?;
        tx.commit().await?;

        info!(offer = %offer.id, cloned_lines, "offer created from deal");
        self.deps
            .effects
            .record(vec![
                ActivityEntry::new(
                    EntityRef::Deal(deal.id),
                    &deal.title,
                    NOTE_OFFER_FROM_DEAL,
                    offer.title.clone(),
                    actor,
                ),
                ActivityEntry::new(
                    EntityRef::Offer(offer.id),
                    &offer.title,
                    "Offer created",
                    format!("Created from deal '{}'", deal.title),
                    actor,
                ),
            ])
            .await;

        Ok(OfferFromDealOutcome { deal, offer, cloned_lines })
    }

    async fn record(&self, deal: &Deal, title: &str, body: String, actor: &Actor) {
        let entry = ActivityEntry::new(EntityRef::Deal(deal.id), &deal.title, title, body, actor);
        self.deps.effects.record(vec![entry]).await;
    }
}

async fn load(tx: &mut dyn StoreTx, id: Uuid) -> Result<Deal> {
    found(tx.get_deal(id).await?, "deal", id)
}

fn ensure_open(deal: &Deal, operation: &str) -> Result<()> {
    if deal.stage.is_closed() {
        return Err(DealflowError::illegal_transition("deal", deal.stage, operation));
    }
    Ok(())
}

async fn append_history(
    tx: &mut dyn StoreTx,
    deal: &Deal,
    from: Option<DealStage>,
    note: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<()> {
    let entry = DealStageHistory {
        id: Uuid::now_v7(),
        deal_id: deal.id,
        from_stage: from,
        to_stage: deal.stage,
        changed_by_id: actor.user_id.clone(),
        changed_by_name: actor.display_name.clone(),
        notes: note.to_string(),
        changed_at: now,
    };
    tx.append_stage_history(&entry).await
}

/// Owner notification (unless the owner won it) plus a confirmation to the actor.
fn win_notifications(deal: &Deal, actor: &Actor) -> Vec<Notification> {
    let mut notifications = Vec::with_capacity(2);
    if deal.owner_id != actor.user_id {
        notifications.push(Notification {
            recipient_id: deal.owner_id.clone(),
            title: "Deal won".to_string(),
            body: format!("{} marked '{}' as won", actor.display_name, deal.title),
            target: EntityRef::Deal(deal.id),
        });
    }
    notifications.push(Notification {
        recipient_id: actor.user_id.clone(),
        title: "Deal won".to_string(),
        body: format!("You marked '{}' as won", deal.title),
        target: EntityRef::Deal(deal.id),
    });
    notifications
}
