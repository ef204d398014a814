//! Integration tests for project phases, reopening and budget inheritance

mod support;

use dealflow_core::{NewProject, ProjectPatch, WinRequest};
use dealflow_domain::{
    BudgetParent, ConflictReason, DealflowError, EntityRef, OfferPhase, ProjectPhase,
    ValidationReason,
};
use support::Harness;

#[tokio::test]
async fn projects_start_in_bidding_or_working_only() {
    let harness = Harness::new();

    let working = harness
        .projects()
        .create(
            NewProject { phase: Some(ProjectPhase::Working), ..NewProject::new("Depot") },
            &harness.actor,
        )
        .await
        .expect("working project");
    assert!(working.start_date.is_some());
    assert!(working.project_number.as_deref().is_some_and(|n| n.starts_with("GR-")));

    let err = harness
        .projects()
        .create(
            NewProject { phase: Some(ProjectPhase::Completed), ..NewProject::new("Done") },
            &harness.actor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason().as_deref(), Some("invalid_initial_phase"));

    let blank = harness.projects().create(NewProject::new("  "), &harness.actor).await;
    assert!(matches!(
        blank,
        Err(DealflowError::ValidationFailed { reason: ValidationReason::MissingField, .. })
    ));
}

#[tokio::test]
async fn entering_working_assigns_start_date_and_number() {
    let harness = Harness::new();
    let project = harness.bidding_project("Harbour hall").await;
    assert!(project.project_number.is_none());

    let working = harness
        .projects()
        .update_phase(project.id, ProjectPhase::Working, &harness.actor)
        .await
        .expect("working");

    assert!(working.start_date.is_some());
    assert!(working.project_number.as_deref().is_some_and(|n| n.starts_with("ST-")));
}

#[tokio::test]
async fn phase_table_is_enforced() {
    let harness = Harness::new();
    let project = harness.bidding_project("Harbour hall").await;

    let err = harness
        .projects()
        .update_phase(project.id, ProjectPhase::Completed, &harness.actor)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "illegal_state_transition");
    assert_eq!(harness.store.project(project.id).await.phase, ProjectPhase::Bidding);
}

#[tokio::test]
async fn closed_projects_refuse_edits() {
    let harness = Harness::new();
    let project = harness.bidding_project("Harbour hall").await;
    harness
        .projects()
        .update_phase(project.id, ProjectPhase::Cancelled, &harness.actor)
        .await
        .expect("cancelled");

    let err = harness
        .projects()
        .update_name(project.id, "Renamed".into(), &harness.actor)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "illegal_state_transition");
}

#[tokio::test]
async fn end_date_must_follow_start_date() {
    let harness = Harness::new();
    let project = harness.bidding_project("Harbour hall").await;
    let now = chrono::Utc::now();

    let patch = ProjectPatch {
        start_date: Some(now),
        end_date: Some(now - chrono::Duration::days(2)),
        ..ProjectPatch::default()
    };
    let err = harness.projects().update(project.id, patch, &harness.actor).await.unwrap_err();

    assert_eq!(err.reason().as_deref(), Some("invalid_date_range"));
}

#[tokio::test]
async fn duplicate_project_number_is_a_conflict() {
    let harness = Harness::new();
    let first = harness.bidding_project("One").await;
    let second = harness.bidding_project("Two").await;
    harness
        .projects()
        .update_project_number(first.id, "P-1".into(), &harness.actor)
        .await
        .expect("numbered");

    let err = harness
        .projects()
        .update_project_number(second.id, "P-1".into(), &harness.actor)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DealflowError::Conflict { reason: ConflictReason::DuplicateNumber, .. }
    ));
}

#[tokio::test]
async fn reopening_a_won_project_walks_the_offer_back_to_sent() {
    let harness = Harness::new();
    let customer = harness.customer("Fjord Eiendom");
    let project = harness.bidding_project("Harbour hall").await;
    let offer = harness.sent_offer_for(&customer, Some(project.id), 800.0).await;
    harness.offers().win(offer.id, WinRequest::default(), &harness.actor).await.expect("won");
    harness.offers().complete(offer.id, &harness.actor).await.expect("completed");
    harness
        .projects()
        .update_phase(project.id, ProjectPhase::Completed, &harness.actor)
        .await
        .expect("completed");

    let reopened = harness
        .projects()
        .reopen(project.id, ProjectPhase::Bidding, &harness.actor)
        .await
        .expect("reopened");

    assert_eq!(reopened.phase, ProjectPhase::Bidding);
    assert!(reopened.winning_offer_id.is_none());
    assert!(reopened.won_at.is_none());
    let offer = harness.store.offer(offer.id).await;
    assert_eq!(offer.phase, OfferPhase::Sent);
    assert!(offer.number_invariant_holds());
    assert_eq!(reopened.customer_id, Some(customer.id));
    assert!(harness.effects.activity_titles().contains(&"Offer reverted to sent".to_string()));
}

#[tokio::test]
async fn reopen_only_leaves_closed_phases() {
    let harness = Harness::new();
    let project = harness.bidding_project("Harbour hall").await;

    let err = harness
        .projects()
        .reopen(project.id, ProjectPhase::Working, &harness.actor)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "illegal_state_transition");
}

#[tokio::test]
async fn inheriting_a_budget_requires_a_won_offer() {
    let harness = Harness::new();
    let customer = harness.customer("Fjord Eiendom");
    let offer = harness.sent_offer_for(&customer, None, 1_250.0).await;
    harness.line(BudgetParent::Offer(offer.id), "Steel", 1_000.0, 1_250.0).await;
    let project = harness
        .projects()
        .create(
            NewProject { phase: Some(ProjectPhase::Working), ..NewProject::new("Depot") },
            &harness.actor,
        )
        .await
        .expect("project");

    let err = harness
        .projects()
        .inherit_budget_from_offer(project.id, offer.id, &harness.actor)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DealflowError::ValidationFailed { reason: ValidationReason::OfferNotWon, .. }
    ));

    let won = harness
        .offers()
        .win(offer.id, WinRequest::default(), &harness.actor)
        .await
        .expect("won")
        .offer;
    let inherited = harness
        .projects()
        .inherit_budget_from_offer(project.id, offer.id, &harness.actor)
        .await
        .expect("inherited");

    assert_eq!(inherited.cloned_lines, 1);
    assert!(inherited.project.has_detailed_budget);
    assert!((inherited.project.value - 1_250.0).abs() < 1e-9);
    assert_eq!(inherited.project.winning_offer_id, Some(won.id));
    assert_eq!(harness.store.lines(BudgetParent::Project(project.id)).await.len(), 1);
}

#[tokio::test]
async fn resync_is_limited_to_bidding_projects() {
    let harness = Harness::new();
    let customer = harness.customer("Fjord Eiendom");
    let project = harness.bidding_project("Harbour hall").await;
    let offer = harness.offer_for(&customer, Some(project.id), 300.0).await;

    let mut stale = harness.store.project(project.id).await;
    stale.value = 1.0;
    stale.customer_id = None;
    harness.store.put_project(stale).await;

    let resynced = harness.projects().resync_from_best_offer(project.id).await.expect("resynced");
    assert!((resynced.value - offer.value).abs() < f64::EPSILON);
    assert_eq!(resynced.customer_id, Some(customer.id));

    harness
        .projects()
        .update_phase(project.id, ProjectPhase::OnHold, &harness.actor)
        .await
        .expect("on hold");
    let err = harness.projects().resync_from_best_offer(project.id).await.unwrap_err();
    assert_eq!(err.code(), "illegal_state_transition");
}

#[tokio::test]
async fn projects_with_offers_cannot_be_deleted() {
    let harness = Harness::new();
    let customer = harness.customer("Fjord Eiendom");
    let project = harness.bidding_project("Harbour hall").await;
    harness.offer_for(&customer, Some(project.id), 300.0).await;

    let err = harness.projects().delete(project.id, &harness.actor).await.unwrap_err();

    assert!(matches!(
        err,
        DealflowError::Conflict { reason: ConflictReason::ProjectHasOffers, .. }
    ));
}

#[tokio::test]
async fn deleting_an_empty_project_removes_lines_and_files() {
    let harness = Harness::new();
    let project = harness.bidding_project("Harbour hall").await;
    harness.line(BudgetParent::Project(project.id), "Steel", 10.0, 12.0).await;

    harness.projects().delete(project.id, &harness.actor).await.expect("deleted");

    assert!(harness.store.snapshot().await.projects.is_empty());
    assert!(harness.store.snapshot().await.lines.is_empty());
    assert_eq!(*harness.effects.purged.lock().unwrap(), vec![EntityRef::Project(project.id)]);
}
