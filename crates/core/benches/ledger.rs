use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dealflow_core::WinRequest;
use dealflow_domain::{
    check_transition, BudgetLineItem, BudgetParent, BudgetSummary, DealStage, OfferPhase, Pricing,
    ProjectPhase,
};
use uuid::Uuid;

#[path = "../tests/support/mod.rs"]
mod support;

fn sample_lines(count: usize) -> Vec<BudgetLineItem> {
    let now = Utc::now();
    let parent = BudgetParent::Project(Uuid::from_u128(0x1234));
    (0..count)
        .map(|idx| {
            let mut line = BudgetLineItem {
                id: Uuid::from_u128(idx as u128),
                parent,
                name: format!("line-{idx}"),
                cost: 0.0,
                revenue: 0.0,
                margin_override: false,
                target_margin_percent: None,
                quantity: Some(2.0),
                unit: Some("pcs".into()),
                price_per_item: None,
                description: String::new(),
                display_order: i32::try_from(idx + 1).unwrap_or(i32::MAX),
                source_line_id: None,
                created_at: now,
                updated_at: now,
            };
            line.apply_pricing(100.0 + idx as f64, Pricing::TargetMargin(20.0)).unwrap();
            line
        })
        .collect()
}

fn pure_benchmark(c: &mut Criterion) {
    let lines = sample_lines(256);

    let mut group = c.benchmark_group("ledger_pure");
    group.bench_function("summary_256_lines", |b| {
        b.iter(|| BudgetSummary::from_lines(black_box(&lines)));
    });
    group.bench_function("transition_guards", |b| {
        b.iter(|| {
            let _ = check_transition(black_box(DealStage::Negotiation), DealStage::Won);
            let _ = check_transition(black_box(OfferPhase::Sent), OfferPhase::Order);
            let _ = check_transition(black_box(ProjectPhase::Bidding), ProjectPhase::Completed);
        });
    });
    group.finish();
}

fn service_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("ledger_service");
    group.sample_size(20).measurement_time(std::time::Duration::from_secs(10));

    group.bench_function("summary_64_lines", |b| {
        let harness = support::Harness::new();
        let parent = runtime.block_on(async {
            let project = harness.bidding_project("Bench hall").await;
            let parent = BudgetParent::Project(project.id);
            for idx in 0..64 {
                harness.line(parent, &format!("line-{idx}"), 100.0, 125.0).await;
            }
            parent
        });

        b.iter(|| {
            runtime.block_on(async {
                harness.budgets().summary(parent).await.unwrap();
            });
        });
    });

    group.bench_function("win_with_budget", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let harness = support::Harness::new();
                let customer = harness.customer("Bench AS");
                let project = harness.bidding_project("Bench hall").await;
                let offer = harness.sent_offer_for(&customer, Some(project.id), 1_000.0).await;
                for idx in 0..8 {
                    harness.line(BudgetParent::Offer(offer.id), &format!("l{idx}"), 10.0, 12.0).await;
                }
                harness.offers().win(offer.id, WinRequest::default(), &harness.actor).await.unwrap();
            });
        });
    });

    group.finish();
}

criterion_group!(core_benchmarks, pure_benchmark, service_benchmark);
criterion_main!(core_benchmarks);
