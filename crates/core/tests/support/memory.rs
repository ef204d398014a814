//! In-memory transactional store
//!
//! `begin` takes an exclusive lock on the shared state and works on a copy;
//! `commit` writes the copy back and dropping the transaction discards it.
//! Fail-points let tests break a specific write mid-transaction.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dealflow_core::ports::{Store, StoreTx};
use dealflow_domain::{
    BudgetLineItem, BudgetParent, BudgetParentKind, ConflictReason, Deal, DealStage,
    DealStageHistory, DealflowError, Offer, Project, Result as DomainResult,
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Writes that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Inserting a budget line under a parent of this kind.
    InsertBudgetLine(BudgetParentKind),
    /// Incrementing a number sequence.
    NextSequence,
    /// Updating any project.
    UpdateProject,
}

/// Everything the store holds.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub deals: BTreeMap<Uuid, Deal>,
    pub history: Vec<DealStageHistory>,
    pub offers: BTreeMap<Uuid, Offer>,
    pub projects: BTreeMap<Uuid, Project>,
    pub lines: BTreeMap<Uuid, BudgetLineItem>,
    pub sequences: HashMap<(String, i32), u32>,
}

/// Shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<AsyncMutex<State>>,
    faults: Arc<Mutex<Vec<FailPoint>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every matching write fail until cleared.
    pub fn fail_on(&self, point: FailPoint) {
        self.faults.lock().unwrap().push(point);
    }

    /// Remove all fail-points.
    pub fn clear_faults(&self) {
        self.faults.lock().unwrap().clear();
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> State {
        self.state.lock().await.clone()
    }

    pub async fn offer(&self, id: Uuid) -> Offer {
        self.snapshot().await.offers.get(&id).cloned().expect("offer exists")
    }

    pub async fn project(&self, id: Uuid) -> Project {
        self.snapshot().await.projects.get(&id).cloned().expect("project exists")
    }

    pub async fn deal(&self, id: Uuid) -> Deal {
        self.snapshot().await.deals.get(&id).cloned().expect("deal exists")
    }

    /// Lines of `parent` in display order.
    pub async fn lines(&self, parent: BudgetParent) -> Vec<BudgetLineItem> {
        sorted_lines(&self.snapshot().await, parent)
    }

    /// Stage history of a deal, oldest first.
    pub async fn history(&self, deal_id: Uuid) -> Vec<DealStageHistory> {
        self.snapshot().await.history.into_iter().filter(|h| h.deal_id == deal_id).collect()
    }

    /// Seed a project directly, bypassing the services.
    pub async fn put_project(&self, project: Project) {
        self.state.lock().await.projects.insert(project.id, project);
    }

    /// Seed an offer directly, bypassing the services.
    pub async fn put_offer(&self, offer: Offer) {
        self.state.lock().await.offers.insert(offer.id, offer);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> DomainResult<Box<dyn StoreTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working, faults: Arc::clone(&self.faults) }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
    faults: Arc<Mutex<Vec<FailPoint>>>,
}

impl MemoryTx {
    fn check(&self, point: FailPoint) -> DomainResult<()> {
        if self.faults.lock().unwrap().contains(&point) {
            return Err(DealflowError::Database(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn check_offer_unique(&self, offer: &Offer) -> DomainResult<()> {
        for other in self.working.offers.values().filter(|o| o.id != offer.id) {
            if other.company_id != offer.company_id {
                continue;
            }
            if offer.offer_number.is_some() && other.offer_number == offer.offer_number {
                return Err(unique("offers.offer_number"));
            }
            if offer.external_reference.is_some()
                && other.external_reference == offer.external_reference
            {
                return Err(unique("offers.external_reference"));
            }
        }
        Ok(())
    }

    fn check_project_unique(&self, project: &Project) -> DomainResult<()> {
        let clash = self.working.projects.values().any(|p| {
            p.id != project.id
                && project.project_number.is_some()
                && p.project_number == project.project_number
        });
        if clash {
            return Err(unique("projects.project_number"));
        }
        Ok(())
    }
}

fn unique(column: &str) -> DealflowError {
    DealflowError::conflict(ConflictReason::UniqueViolation, format!("UNIQUE constraint failed: {column}"))
}

fn missing(entity: &str, id: Uuid) -> DealflowError {
    DealflowError::not_found(entity, id)
}

fn sorted_lines(state: &State, parent: BudgetParent) -> Vec<BudgetLineItem> {
    let mut lines: Vec<_> = state.lines.values().filter(|l| l.parent == parent).cloned().collect();
    lines.sort_by(|a, b| a.display_order.cmp(&b.display_order).then(a.created_at.cmp(&b.created_at)));
    lines
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn get_deal(&mut self, id: Uuid) -> DomainResult<Option<Deal>> {
        Ok(self.working.deals.get(&id).cloned())
    }

    async fn list_deals(&mut self, stage: Option<DealStage>) -> DomainResult<Vec<Deal>> {
        Ok(self
            .working
            .deals
            .values()
            .filter(|d| stage.map_or(true, |s| d.stage == s))
            .cloned()
            .collect())
    }

    async fn insert_deal(&mut self, deal: &Deal) -> DomainResult<()> {
        self.working.deals.insert(deal.id, deal.clone());
        Ok(())
    }

    async fn update_deal(&mut self, deal: &Deal) -> DomainResult<()> {
        let slot = self.working.deals.get_mut(&deal.id).ok_or_else(|| missing("deal", deal.id))?;
        *slot = deal.clone();
        Ok(())
    }

    async fn delete_deal(&mut self, id: Uuid) -> DomainResult<()> {
        self.working.deals.remove(&id).map(drop).ok_or_else(|| missing("deal", id))
    }

    async fn append_stage_history(&mut self, entry: &DealStageHistory) -> DomainResult<()> {
        self.working.history.push(entry.clone());
        Ok(())
    }

    async fn list_stage_history(&mut self, deal_id: Uuid) -> DomainResult<Vec<DealStageHistory>> {
        Ok(self.working.history.iter().filter(|h| h.deal_id == deal_id).cloned().collect())
    }

    async fn delete_stage_history(&mut self, deal_id: Uuid) -> DomainResult<u64> {
        let before = self.working.history.len();
        self.working.history.retain(|h| h.deal_id != deal_id);
        Ok((before - self.working.history.len()) as u64)
    }

    async fn get_offer(&mut self, id: Uuid) -> DomainResult<Option<Offer>> {
        Ok(self.working.offers.get(&id).cloned())
    }

    async fn insert_offer(&mut self, offer: &Offer) -> DomainResult<()> {
        self.check_offer_unique(offer)?;
        self.working.offers.insert(offer.id, offer.clone());
        Ok(())
    }

    async fn update_offer(&mut self, offer: &Offer) -> DomainResult<()> {
        self.check_offer_unique(offer)?;
        let slot =
            self.working.offers.get_mut(&offer.id).ok_or_else(|| missing("offer", offer.id))?;
        *slot = offer.clone();
        Ok(())
    }

    async fn delete_offer(&mut self, id: Uuid) -> DomainResult<()> {
        self.working.offers.remove(&id).map(drop).ok_or_else(|| missing("offer", id))
    }

    async fn list_offers_by_project(&mut self, project_id: Uuid) -> DomainResult<Vec<Offer>> {
        let mut offers: Vec<_> = self
            .working
            .offers
            .values()
            .filter(|o| o.project_id == Some(project_id))
            .cloned()
            .collect();
        offers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(offers)
    }

    async fn find_offer_by_number(
        &mut self,
        company_id: &str,
        number: &str,
    ) -> DomainResult<Option<Offer>> {
        Ok(self
            .working
            .offers
            .values()
            .find(|o| o.company_id == company_id && o.offer_number.as_deref() == Some(number))
            .cloned())
    }

    async fn find_offer_by_external_reference(
        &mut self,
        company_id: &str,
        reference: &str,
    ) -> DomainResult<Option<Offer>> {
        Ok(self
            .working
            .offers
            .values()
            .find(|o| {
                o.company_id == company_id && o.external_reference.as_deref() == Some(reference)
            })
            .cloned())
    }

    async fn get_project(&mut self, id: Uuid) -> DomainResult<Option<Project>> {
        Ok(self.working.projects.get(&id).cloned())
    }

    async fn insert_project(&mut self, project: &Project) -> DomainResult<()> {
        self.check_project_unique(project)?;
        self.working.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn update_project(&mut self, project: &Project) -> DomainResult<()> {
        self.check(FailPoint::UpdateProject)?;
        self.check_project_unique(project)?;
        let slot = self
            .working
            .projects
            .get_mut(&project.id)
            .ok_or_else(|| missing("project", project.id))?;
        *slot = project.clone();
        Ok(())
    }

    async fn delete_project(&mut self, id: Uuid) -> DomainResult<()> {
        self.working.projects.remove(&id).map(drop).ok_or_else(|| missing("project", id))
    }

    async fn find_project_by_number(&mut self, number: &str) -> DomainResult<Option<Project>> {
        Ok(self
            .working
            .projects
            .values()
            .find(|p| p.project_number.as_deref() == Some(number))
            .cloned())
    }

    async fn get_budget_line(&mut self, id: Uuid) -> DomainResult<Option<BudgetLineItem>> {
        Ok(self.working.lines.get(&id).cloned())
    }

    async fn list_budget_lines(&mut self, parent: BudgetParent) -> DomainResult<Vec<BudgetLineItem>> {
        Ok(sorted_lines(&self.working, parent))
    }

    async fn insert_budget_line(&mut self, line: &BudgetLineItem) -> DomainResult<()> {
        self.check(FailPoint::InsertBudgetLine(line.parent.kind()))?;
        self.working.lines.insert(line.id, line.clone());
        Ok(())
    }

    async fn update_budget_line(&mut self, line: &BudgetLineItem) -> DomainResult<()> {
        let slot = self
            .working
            .lines
            .get_mut(&line.id)
            .ok_or_else(|| missing("budget_line", line.id))?;
        *slot = line.clone();
        Ok(())
    }

    async fn delete_budget_line(&mut self, id: Uuid) -> DomainResult<()> {
        self.working.lines.remove(&id).map(drop).ok_or_else(|| missing("budget_line", id))
    }

    async fn delete_budget_lines(&mut self, parent: BudgetParent) -> DomainResult<u64> {
        let before = self.working.lines.len();
        self.working.lines.retain(|_, line| line.parent != parent);
        Ok((before - self.working.lines.len()) as u64)
    }

    async fn next_sequence(&mut self, company_id: &str, year: i32) -> DomainResult<u32> {
        self.check(FailPoint::NextSequence)?;
        let counter = self.working.sequences.entry((company_id.to_string(), year)).or_insert(0);
        *counter = counter
            .checked_add(1)
            .ok_or_else(|| DealflowError::Database("sequence overflow".into()))?;
        Ok(*counter)
    }

    async fn current_sequence(&mut self, company_id: &str, year: i32) -> DomainResult<u32> {
        Ok(self.working.sequences.get(&(company_id.to_string(), year)).copied().unwrap_or(0))
    }

    async fn reset_sequence(&mut self, company_id: &str, year: i32, value: u32) -> DomainResult<()> {
        self.working.sequences.insert((company_id.to_string(), year), value);
        Ok(())
    }

    async fn raise_sequence(&mut self, company_id: &str, year: i32, value: u32) -> DomainResult<()> {
        let counter = self.working.sequences.entry((company_id.to_string(), year)).or_insert(0);
        *counter = (*counter).max(value);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        let MemoryTx { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DomainResult<()> {
        Ok(())
    }
}
