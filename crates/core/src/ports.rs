//! Port interfaces consumed by the lifecycle services
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use dealflow_domain::{
    ActivityEntry, BudgetLineItem, BudgetParent, CompanyProfile, CustomerRef, Deal, DealStage,
    DealStageHistory, EntityRef, Notification, Offer, Project, Result, UserRef,
};
use uuid::Uuid;

/// Transactional persistence.
///
/// Every service operation runs inside one [`StoreTx`]. Dropping a
/// transaction without calling [`StoreTx::commit`] discards its writes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Start a unit of work.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

/// A unit of work against the backing store.
///
/// Lookups return `Ok(None)` for missing rows; `update_*` and `delete_*`
/// return `NotFound` when the row does not exist. Unique violations surface
/// as `Conflict`.
#[async_trait]
pub trait StoreTx: Send {
    // Deals
    async fn get_deal(&mut self, id: Uuid) -> Result<Option<Deal>>;
    async fn list_deals(&mut self, stage: Option<DealStage>) -> Result<Vec<Deal>>;
    async fn insert_deal(&mut self, deal: &Deal) -> Result<()>;
    async fn update_deal(&mut self, deal: &Deal) -> Result<()>;
    async fn delete_deal(&mut self, id: Uuid) -> Result<()>;
    async fn append_stage_history(&mut self, entry: &DealStageHistory) -> Result<()>;
    /// Oldest first.
    async fn list_stage_history(&mut self, deal_id: Uuid) -> Result<Vec<DealStageHistory>>;
    async fn delete_stage_history(&mut self, deal_id: Uuid) -> Result<u64>;

    // Offers
    async fn get_offer(&mut self, id: Uuid) -> Result<Option<Offer>>;
    async fn insert_offer(&mut self, offer: &Offer) -> Result<()>;
    async fn update_offer(&mut self, offer: &Offer) -> Result<()>;
    async fn delete_offer(&mut self, id: Uuid) -> Result<()>;
    /// Ordered by creation time.
    async fn list_offers_by_project(&mut self, project_id: Uuid) -> Result<Vec<Offer>>;
    async fn find_offer_by_number(&mut self, company_id: &str, number: &str)
        -> Result<Option<Offer>>;
    async fn find_offer_by_external_reference(
        &mut self,
        company_id: &str,
        reference: &str,
    ) -> Result<Option<Offer>>;

    // Projects
    async fn get_project(&mut self, id: Uuid) -> Result<Option<Project>>;
    async fn insert_project(&mut self, project: &Project) -> Result<()>;
    async fn update_project(&mut self, project: &Project) -> Result<()>;
    async fn delete_project(&mut self, id: Uuid) -> Result<()>;
    async fn find_project_by_number(&mut self, number: &str) -> Result<Option<Project>>;

    // Budget lines
    async fn get_budget_line(&mut self, id: Uuid) -> Result<Option<BudgetLineItem>>;
    /// Ordered by display order, then creation time.
    async fn list_budget_lines(&mut self, parent: BudgetParent) -> Result<Vec<BudgetLineItem>>;
    async fn insert_budget_line(&mut self, line: &BudgetLineItem) -> Result<()>;
    async fn update_budget_line(&mut self, line: &BudgetLineItem) -> Result<()>;
    async fn delete_budget_line(&mut self, id: Uuid) -> Result<()>;
    async fn delete_budget_lines(&mut self, parent: BudgetParent) -> Result<u64>;

    // Number sequences, keyed by (company, year)
    /// Atomically increment and return the new last-issued value.
    async fn next_sequence(&mut self, company_id: &str, year: i32) -> Result<u32>;
    /// Last issued value without consuming one; 0 when never used.
    async fn current_sequence(&mut self, company_id: &str, year: i32) -> Result<u32>;
    /// Overwrite the counter, including lowering it.
    async fn reset_sequence(&mut self, company_id: &str, year: i32, value: u32) -> Result<()>;
    /// Raise the counter to `value` if it is currently lower.
    async fn raise_sequence(&mut self, company_id: &str, year: i32, value: u32) -> Result<()>;

    /// Make every write in this unit of work durable.
    async fn commit(self: Box<Self>) -> Result<()>;
    /// Discard every write in this unit of work.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Customer and user lookup.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Find a customer by id.
    async fn find_customer(&self, id: Uuid) -> Result<Option<CustomerRef>>;

    /// Find a user by id.
    async fn find_user(&self, id: &str) -> Result<Option<UserRef>>;
}

/// Organisational unit lookup.
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// Profile for a company id, `None` when the company is unknown.
    async fn find_company(&self, id: &str) -> Result<Option<CompanyProfile>>;

    /// Company used when nothing else names one.
    fn default_company_id(&self) -> String;

    /// Days from sent date to default expiration.
    fn offer_validity_days(&self) -> i64 {
        60
    }
}

/// Append-only activity trail.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Record an entry.
    async fn record(&self, entry: ActivityEntry) -> Result<()>;
}

/// Outbound notification delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification.
    async fn notify(&self, notification: Notification) -> Result<()>;
}

/// Stored files attached to entities.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Remove every file owned by `owner`, returning how many were removed.
    async fn delete_all(&self, owner: EntityRef) -> Result<u64>;
}
