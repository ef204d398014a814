//! Directory and side-effect fakes
//!
//! Customers, users and companies live in plain maps. Activity entries,
//! notifications and file purges are recorded for assertions, and each
//! fake can be switched to fail to prove failures stay contained.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use dealflow_core::ports::{ActivityLog, CompanyDirectory, ContactDirectory, FileStore, Notifier};
use dealflow_domain::{
    ActivityEntry, CompanyProfile, CustomerRef, DealflowError, EntityRef, Notification,
    Result as DomainResult, UserRef,
};
use uuid::Uuid;

/// Customers and users keyed by id.
#[derive(Default)]
pub struct MemoryContacts {
    customers: RwLock<HashMap<Uuid, CustomerRef>>,
    users: RwLock<HashMap<String, UserRef>>,
}

impl MemoryContacts {
    pub fn add_customer(&self, name: &str, company_id: Option<&str>) -> CustomerRef {
        let customer = CustomerRef {
            id: Uuid::now_v7(),
            name: name.to_string(),
            company_id: company_id.map(str::to_string),
        };
        self.customers.write().unwrap().insert(customer.id, customer.clone());
        customer
    }

    pub fn add_user(&self, id: &str, display_name: &str) -> UserRef {
        let user = UserRef { id: id.to_string(), display_name: display_name.to_string() };
        self.users.write().unwrap().insert(user.id.clone(), user.clone());
        user
    }
}

#[async_trait]
impl ContactDirectory for MemoryContacts {
    async fn find_customer(&self, id: Uuid) -> DomainResult<Option<CustomerRef>> {
        Ok(self.customers.read().unwrap().get(&id).cloned())
    }

    async fn find_user(&self, id: &str) -> DomainResult<Option<UserRef>> {
        Ok(self.users.read().unwrap().get(id).cloned())
    }
}

/// Company profiles with a mutable default responsible party.
pub struct MemoryCompanies {
    companies: RwLock<HashMap<String, CompanyProfile>>,
    default_id: String,
}

impl MemoryCompanies {
    /// Companies `stalbygg` (ST), `tak` (TK) and `gruppen` (GR), none with a
    /// default responsible party; `gruppen` is the default company.
    pub fn seeded() -> Self {
        let companies = [("stalbygg", "ST"), ("tak", "TK"), ("gruppen", "GR")]
            .into_iter()
            .map(|(id, prefix)| {
                (
                    id.to_string(),
                    CompanyProfile {
                        id: id.to_string(),
                        prefix: prefix.to_string(),
                        default_responsible: None,
                    },
                )
            })
            .collect();
        Self { companies: RwLock::new(companies), default_id: "gruppen".to_string() }
    }

    pub fn set_default_responsible(&self, company_id: &str, user: Option<UserRef>) {
        if let Some(company) = self.companies.write().unwrap().get_mut(company_id) {
            company.default_responsible = user;
        }
    }
}

#[async_trait]
impl CompanyDirectory for MemoryCompanies {
    async fn find_company(&self, id: &str) -> DomainResult<Option<CompanyProfile>> {
        Ok(self.companies.read().unwrap().get(id).cloned())
    }

    fn default_company_id(&self) -> String {
        self.default_id.clone()
    }
}

/// Records every side effect it receives.
#[derive(Default)]
pub struct RecordingEffects {
    pub activities: Mutex<Vec<ActivityEntry>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub purged: Mutex<Vec<EntityRef>>,
    failing: Mutex<bool>,
}

impl RecordingEffects {
    /// Make every side effect fail from now on.
    pub fn fail_all(&self) {
        *self.failing.lock().unwrap() = true;
    }

    pub fn activity_titles(&self) -> Vec<String> {
        self.activities.lock().unwrap().iter().map(|a| a.title.clone()).collect()
    }

    pub fn notification_recipients(&self) -> Vec<String> {
        self.notifications.lock().unwrap().iter().map(|n| n.recipient_id.clone()).collect()
    }

    fn check(&self) -> DomainResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(DealflowError::DependencyUnavailable("side effect offline".into()));
        }
        Ok(())
    }
}

/// Adapter so one recorder serves all three side-effect ports.
#[derive(Clone)]
pub struct Recorder(pub Arc<RecordingEffects>);

#[async_trait]
impl ActivityLog for Recorder {
    async fn record(&self, entry: ActivityEntry) -> DomainResult<()> {
        self.0.check()?;
        self.0.activities.lock().unwrap().push(entry);
        Ok(())
    }
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify(&self, notification: Notification) -> DomainResult<()> {
        self.0.check()?;
        self.0.notifications.lock().unwrap().push(notification);
        Ok(())
    }
}

#[async_trait]
impl FileStore for Recorder {
    async fn delete_all(&self, owner: EntityRef) -> DomainResult<u64> {
        self.0.check()?;
        self.0.purged.lock().unwrap().push(owner);
        Ok(0)
    }
}
