//! Shared helpers for `dealflow-infra` integration tests.

#![allow(dead_code)]

use dealflow_core::{NewOffer, NewProject, Services};
use dealflow_domain::{Actor, Config, CustomerRef, Offer, Project, UserRef};
use dealflow_infra::AppContext;
use tempfile::TempDir;
use uuid::Uuid;

const TEST_DB_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Application context over a temporary encrypted database.
///
/// The directory lives as long as the harness, so files and the database
/// disappear when the test ends.
pub struct TestApp {
    pub ctx: AppContext,
    pub actor: Actor,
    pub customer: CustomerRef,
    temp_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("dealflow.db");

        let mut config = Config::with_database_path(db_path.to_string_lossy());
        config.database.encryption_key = Some(TEST_DB_KEY.to_string());
        config.files.root = temp_dir.path().join("files").to_string_lossy().into_owned();

        let ctx = AppContext::new(config).expect("context should build");

        for (id, name) in [("u-kari", "Kari Nordmann"), ("u-ola", "Ola Hansen")] {
            ctx.contacts
                .upsert_user(UserRef { id: id.into(), display_name: name.into() })
                .await
                .expect("user seeded");
        }
        let customer = CustomerRef {
            id: Uuid::now_v7(),
            name: "Fjord Eiendom".into(),
            company_id: Some("stalbygg".into()),
        };
        ctx.contacts.upsert_customer(customer.clone()).await.expect("customer seeded");

        Self { ctx, actor: Actor::new("u-kari", "Kari Nordmann"), customer, temp_dir }
    }

    pub fn services(&self) -> &Services {
        &self.ctx.services
    }

    pub fn path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Empty bidding project in `stalbygg`.
    pub async fn bidding_project(&self, name: &str) -> Project {
        let request = NewProject { company_id: Some("stalbygg".into()), ..NewProject::new(name) };
        self.services().projects.create(request, &self.actor).await.expect("project created")
    }

    /// Sent offer for the seeded customer, valued at `value`.
    pub async fn sent_offer(&self, project_id: Option<Uuid>, value: f64) -> Offer {
        let request = NewOffer {
            project_id,
            responsible_id: Some("u-ola".into()),
            value,
            cost: value * 0.75,
            ..NewOffer::new(format!("Offer {value}"), self.customer.id)
        };
        let offer = self.services().offers.create(request, &self.actor).await.expect("created");
        self.services().offers.send(offer.id, &self.actor).await.expect("sent")
    }
}
