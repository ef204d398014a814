//! Shared collaborator bundle handed to every service.

use std::sync::Arc;

use dealflow_domain::{CompanyProfile, CustomerRef, DealflowError, Result, UserRef, ValidationReason};
use uuid::Uuid;

use crate::effects::SideEffects;
use crate::ports::{CompanyDirectory, ContactDirectory, Store};

/// Collaborators required by the lifecycle services.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn Store>,
    pub contacts: Arc<dyn ContactDirectory>,
    pub companies: Arc<dyn CompanyDirectory>,
    pub effects: SideEffects,
}

impl Collaborators {
    /// Bundle the collaborators.
    pub fn new(
        store: Arc<dyn Store>,
        contacts: Arc<dyn ContactDirectory>,
        companies: Arc<dyn CompanyDirectory>,
        effects: SideEffects,
    ) -> Self {
        Self { store, contacts, companies, effects }
    }

    pub(crate) async fn customer(&self, id: Uuid) -> Result<CustomerRef> {
        self.contacts.find_customer(id).await?.ok_or_else(|| DealflowError::not_found("customer", id))
    }

    pub(crate) async fn company(&self, id: &str) -> Result<CompanyProfile> {
        self.companies.find_company(id).await?.ok_or_else(|| {
            DealflowError::validation(ValidationReason::UnknownCompany, format!("unknown company '{id}'"))
        })
    }

    /// Display name for a user id, falling back to the id itself.
    pub(crate) async fn user_name(&self, id: &str) -> Result<String> {
        Ok(self
            .contacts
            .find_user(id)
            .await?
            .map_or_else(|| id.to_string(), |user: UserRef| user.display_name))
    }

    /// Company named by the request, else the customer's, else the default.
    pub(crate) async fn resolve_company(
        &self,
        requested: Option<&str>,
        customer: Option<&CustomerRef>,
    ) -> Result<CompanyProfile> {
        let id = requested
            .map(str::to_string)
            .or_else(|| customer.and_then(|c| c.company_id.clone()))
            .unwrap_or_else(|| self.companies.default_company_id());
        self.company(&id).await
    }
}

/// Turn a missing row into `NotFound`.
pub(crate) fn found<T>(row: Option<T>, entity: &str, id: Uuid) -> Result<T> {
    row.ok_or_else(|| DealflowError::not_found(entity, id))
}

/// Map a store failure inside a composite step to `DependencyUnavailable`.
///
/// Business errors (not found, validation, state, conflict) pass through.
pub(crate) fn unavailable(step: &'static str) -> impl Fn(DealflowError) -> DealflowError {
    move |err| match err {
        DealflowError::Database(message) | DealflowError::Internal(message) => {
            DealflowError::DependencyUnavailable(format!("{step}: {message}"))
        }
        other => other,
    }
}
