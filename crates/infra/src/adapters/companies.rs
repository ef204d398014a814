//! Company directory served from configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use dealflow_core::CompanyDirectory;
use dealflow_domain::{CompanyProfile, Config, Result};

/// [`CompanyDirectory`] over the `companies` and `numbering` config sections.
#[derive(Debug, Clone)]
pub struct ConfiguredCompanyDirectory {
    companies: HashMap<String, CompanyProfile>,
    default_company: String,
    offer_validity_days: i64,
}

impl ConfiguredCompanyDirectory {
    /// Build the directory from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        let companies = config
            .company_profiles()
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        Self {
            companies,
            default_company: config.numbering.default_company.clone(),
            offer_validity_days: config.numbering.offer_validity_days,
        }
    }
}

#[async_trait]
impl CompanyDirectory for ConfiguredCompanyDirectory {
    async fn find_company(&self, id: &str) -> Result<Option<CompanyProfile>> {
        Ok(self.companies.get(id).cloned())
    }

    fn default_company_id(&self) -> String {
        self.default_company.clone()
    }

    fn offer_validity_days(&self) -> i64 {
        self.offer_validity_days
    }
}
