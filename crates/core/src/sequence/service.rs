//! Sequence service and in-transaction numbering helpers

use chrono::{Datelike, Utc};
use dealflow_domain::{
    format_document_number, parse_document_number, CompanyProfile, DealflowError, DocumentKind,
    Result,
};
use tracing::{debug, info};

use crate::deps::{unavailable, Collaborators};
use crate::ports::StoreTx;

/// Issue the next number for `company` inside an open transaction.
///
/// The increment is a single store operation; a failure surfaces as
/// `DependencyUnavailable` and aborts the caller's transaction.
pub async fn issue_number(
    tx: &mut dyn StoreTx,
    company: &CompanyProfile,
    kind: DocumentKind,
) -> Result<String> {
    let year = Utc::now().year();
    let sequence =
        tx.next_sequence(&company.id, year).await.map_err(unavailable("number sequence"))?;
    let number = format_document_number(&company.prefix, year, sequence);
    debug!(company = %company.id, %kind, %number, "issued document number");
    Ok(number)
}

/// Keep the counter ahead of a manually entered number.
///
/// Free-form numbers and numbers carrying another company's prefix leave the
/// counter untouched.
pub async fn raise_for_manual_number(
    tx: &mut dyn StoreTx,
    company: &CompanyProfile,
    number: &str,
) -> Result<()> {
    let Some((prefix, year, sequence)) = parse_document_number(number) else {
        return Ok(());
    };
    if !prefix.eq_ignore_ascii_case(&company.prefix) {
        return Ok(());
    }
    tx.raise_sequence(&company.id, year, sequence).await
}

/// Numbering operations exposed to callers.
pub struct SequenceService {
    deps: Collaborators,
}

impl SequenceService {
    /// Create a new sequence service
    pub fn new(deps: Collaborators) -> Self {
        Self { deps }
    }

    /// Consume and return the next number for `company_id` in the current year.
    pub async fn next(&self, company_id: &str, kind: DocumentKind) -> Result<String> {
        let company = self.deps.company(company_id).await?;
        let mut tx = self.deps.store.begin().await.map_err(unavailable("number sequence"))?;
        let number = issue_number(tx.as_mut(), &company, kind).await?;
        tx.commit().await.map_err(unavailable("number sequence"))?;
        Ok(number)
    }

    /// Preview the number `next` would return. Never mutates the counter.
    pub async fn peek(&self, company_id: &str) -> Result<String> {
        let company = self.deps.company(company_id).await?;
        let year = Utc::now().year();
        let mut tx = self.deps.store.begin().await?;
        let current = tx.current_sequence(&company.id, year).await?;
        tx.rollback().await?;
        let next = current.checked_add(1).ok_or_else(|| {
            DealflowError::DependencyUnavailable(format!(
                "number sequence for '{}' {year} is exhausted",
                company.id
            ))
        })?;
        Ok(format_document_number(&company.prefix, year, next))
    }

    /// Administrative reset; may lower the counter.
    pub async fn reset(&self, company_id: &str, year: i32, value: u32) -> Result<()> {
        let company = self.deps.company(company_id).await?;
        let mut tx = self.deps.store.begin().await?;
        tx.reset_sequence(&company.id, year, value).await?;
        tx.commit().await?;
        info!(company = %company.id, year, value, "number sequence reset");
        Ok(())
    }

    /// Raise the counter to `value` if it is currently lower.
    pub async fn raise_to(&self, company_id: &str, year: i32, value: u32) -> Result<()> {
        let company = self.deps.company(company_id).await?;
        let mut tx = self.deps.store.begin().await?;
        tx.raise_sequence(&company.id, year, value).await?;
        tx.commit().await
    }
}
