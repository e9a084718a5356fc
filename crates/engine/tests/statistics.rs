use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::Database;

use engine::{
    Breakdown, CreateInvoiceCmd, Currency, Engine, EngineError, Grouping, InvoiceFilter,
    InvoiceStatistics, InvoiceStatus, ItemDraft, MAX_CUSTOM_DAYS, RateProvider, Reference,
    ReferenceKind, StaticRateSource, StatisticsOptions, StatsPeriod, SummaryPeriod,
    TimeGranularity,
};
use migration::MigratorTrait;

const ALICE: &str = "alice";

async fn engine_with_rates(rates: StaticRateSource) -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder()
        .database(db)
        .rates(Arc::new(RateProvider::fixed(rates)))
        .build()
        .await
        .unwrap()
}

async fn engine() -> Engine {
    engine_with_rates(StaticRateSource::new().with_rate("HKD", "USD", 0.128)).await
}

fn currency(code: &str) -> Currency {
    Currency::try_from(code).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

async fn invoice(engine: &Engine, cmd: CreateInvoiceCmd) -> uuid::Uuid {
    let created = engine.create_invoice(cmd).await.unwrap();
    assert!(!created.is_duplicate);
    created.detail.invoice.id
}

#[tokio::test]
async fn summary_adds_reporting_amounts_across_currencies() {
    let engine = engine().await;
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "US vendor", currency("USD"))
            .item(ItemDraft::new("Service", 1.0, 100.0)),
    )
    .await;
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "HK vendor", currency("HKD"))
            .item(ItemDraft::new("Service", 1.0, 780.0)),
    )
    .await;

    let summary = engine.summary(ALICE, SummaryPeriod::OneMonth).await.unwrap();

    assert_eq!(summary.currency, Currency::reporting());
    assert_eq!(summary.total_count, 2);
    assert_close(summary.total_amount, 199.84);
    assert_eq!(summary.by_status.unpaid.count, 2);
    assert_close(summary.by_status.unpaid.amount, 199.84);
    assert_eq!(summary.by_status.paid.count, 0);
}

#[tokio::test]
async fn day_grouping_is_dense_over_the_last_week() {
    let engine = engine().await;
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "Older", currency("USD"))
            .created_at(Utc::now() - Duration::days(3))
            .item(ItemDraft::new("A", 1.0, 5.0)),
    )
    .await;
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "Today", currency("USD")).item(ItemDraft::new("B", 1.0, 7.0)),
    )
    .await;

    let stats = engine
        .statistics(
            ALICE,
            &StatisticsOptions {
                period: StatsPeriod::LastWeek,
                grouping: Grouping::Day,
                aggregate: true,
                ..StatisticsOptions::default()
            },
        )
        .await
        .unwrap();

    let Breakdown::Time {
        granularity,
        buckets,
    } = &stats.breakdown
    else {
        panic!("expected time buckets, got {:?}", stats.breakdown);
    };
    assert_eq!(*granularity, TimeGranularity::Day);
    assert_eq!(buckets.len(), 8);
    assert_eq!(buckets.iter().map(|b| b.count).sum::<u64>(), 2);
    assert_eq!(buckets.iter().filter(|b| b.count == 0).count(), 6);
    assert!(
        buckets
            .iter()
            .filter(|b| b.count == 0)
            .all(|b| b.amount == 0.0)
    );
    assert_eq!(buckets.last().unwrap().amount, 7.0);

    let aggregations = stats.aggregations.unwrap();
    assert_eq!(aggregations.max, 7.0);
    assert_eq!(aggregations.min, 5.0);
    assert_eq!(aggregations.avg, 6.0);
    assert_eq!(aggregations.max_invoice.unwrap().title, "Today");
    assert_eq!(
        aggregations.max_bucket.unwrap().label,
        Utc::now().date_naive().to_string()
    );
}

#[tokio::test]
async fn windows_exclude_older_invoices_and_other_owners() {
    let engine = engine().await;
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "Ancient", currency("USD"))
            .created_at(Utc::now() - Duration::days(90))
            .item(ItemDraft::new("A", 1.0, 1000.0)),
    )
    .await;
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "Recent", currency("USD"))
            .item(ItemDraft::new("B", 1.0, 10.0)),
    )
    .await;
    invoice(
        &engine,
        CreateInvoiceCmd::new("bob", "Not mine", currency("USD"))
            .item(ItemDraft::new("C", 1.0, 500.0)),
    )
    .await;

    let stats = engine
        .statistics(ALICE, &StatisticsOptions::default())
        .await
        .unwrap();
    assert_eq!(stats.period, StatsPeriod::LastMonth);
    assert_eq!(stats.total_count, 1);
    assert_eq!(stats.total_amount, 10.0);
    assert_eq!(stats.aggregations, None);

    let year = engine
        .summary(ALICE, SummaryPeriod::OneYear)
        .await
        .unwrap();
    assert_eq!(year.total_count, 2);
    assert_eq!(year.total_amount, 1010.0);
}

#[tokio::test]
async fn status_breakdown_honours_entity_filters() {
    let engine = engine().await;
    let food = engine.new_category(ALICE, "Food").await.unwrap();

    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "Groceries", currency("USD"))
            .category_id(food.id)
            .status(InvoiceStatus::Paid)
            .item(ItemDraft::new("Bag", 1.0, 30.0)),
    )
    .await;
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "Restaurant", currency("HKD"))
            .description("team groceries run")
            .category_id(food.id)
            .status(InvoiceStatus::Overdue)
            .item(ItemDraft::new("Dinner", 1.0, 250.0)),
    )
    .await;
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "Electricity", currency("USD"))
            .item(ItemDraft::new("kWh", 100.0, 0.25)),
    )
    .await;

    let filtered = engine
        .statistics(
            ALICE,
            &StatisticsOptions {
                filter: InvoiceFilter {
                    category_id: Some(food.id),
                    keyword: Some("groceries".to_string()),
                    ..InvoiceFilter::default()
                },
                ..StatisticsOptions::default()
            },
        )
        .await
        .unwrap();
    let Breakdown::Status(by_status) = filtered.breakdown else {
        panic!("expected status breakdown");
    };
    assert_eq!(filtered.total_count, 2);
    assert_eq!(by_status.paid.count, 1);
    assert_eq!(by_status.paid.amount, 30.0);
    assert_eq!(by_status.overdue.count, 1);
    assert_close(by_status.overdue.amount, 32.0);
    assert_eq!(by_status.unpaid.count, 0);

    let paid_only = engine
        .statistics(
            ALICE,
            &StatisticsOptions {
                filter: InvoiceFilter {
                    status: Some(InvoiceStatus::Paid),
                    ..InvoiceFilter::default()
                },
                ..StatisticsOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(paid_only.total_count, 1);
}

#[tokio::test]
async fn category_grouping_keeps_uncategorized_invoices() {
    let engine = engine().await;
    let food = engine.new_category(ALICE, "Food").await.unwrap();
    let travel = engine.new_category(ALICE, "Travel").await.unwrap();

    for (category, price) in [(Some(food.id), 20.0), (Some(travel.id), 300.0), (None, 45.0)] {
        let mut cmd = CreateInvoiceCmd::new(ALICE, format!("spend {price}"), currency("USD"))
            .item(ItemDraft::new("x", 1.0, price));
        if let Some(id) = category {
            cmd = cmd.category_id(id);
        }
        invoice(&engine, cmd).await;
    }
    // An invoice without items counts with a zero amount.
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "empty", currency("USD")).category_id(food.id),
    )
    .await;

    let stats = engine
        .statistics(
            ALICE,
            &StatisticsOptions {
                grouping: Grouping::Category,
                aggregate: true,
                ..StatisticsOptions::default()
            },
        )
        .await
        .unwrap();

    let Breakdown::Entity { kind, buckets } = &stats.breakdown else {
        panic!("expected entity buckets");
    };
    assert_eq!(*kind, ReferenceKind::Category);
    let names: Vec<_> = buckets.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["Travel", "Uncategorized", "Food"]);
    assert_eq!(buckets[2].count, 2);
    assert_eq!(buckets[2].amount, 20.0);
    assert_eq!(buckets[1].id, None);

    let aggregations = stats.aggregations.unwrap();
    assert_eq!(aggregations.min, 0.0);
    assert_eq!(aggregations.max, 300.0);
    let max_bucket = aggregations.max_bucket.unwrap();
    assert_eq!(max_bucket.label, "Travel");
    assert_eq!(max_bucket.id, Some(travel.id));
}

#[tokio::test]
async fn receiver_grouping_reports_no_max_bucket() {
    let engine = engine().await;
    let shop = engine.new_receiver(ALICE, "Shop").await.unwrap();
    invoice(
        &engine,
        CreateInvoiceCmd::new(ALICE, "Receipt", currency("USD"))
            .receiver_id(shop.id)
            .item(ItemDraft::new("x", 1.0, 12.0)),
    )
    .await;

    let stats = engine
        .statistics(
            ALICE,
            &StatisticsOptions {
                grouping: Grouping::Receiver,
                aggregate: true,
                ..StatisticsOptions::default()
            },
        )
        .await
        .unwrap();
    let aggregations = stats.aggregations.unwrap();
    assert_eq!(aggregations.max, 12.0);
    assert_eq!(aggregations.max_bucket, None);
}

#[tokio::test]
async fn group_summaries_append_the_synthetic_bucket_last() {
    let engine = engine().await;
    let acme = engine.new_company(ALICE, "ACME").await.unwrap();
    let initech = engine.new_company(ALICE, "Initech").await.unwrap();

    for (company, price) in [(Some(acme.id), 10.0), (Some(initech.id), 40.0), (None, 99.0)] {
        let mut cmd = CreateInvoiceCmd::new(ALICE, format!("bill {price}"), currency("USD"))
            .item(ItemDraft::new("x", 1.0, price));
        if let Some(id) = company {
            cmd = cmd.company_id(id);
        }
        invoice(&engine, cmd).await;
    }

    let by_company = engine
        .summary_by_company(ALICE, SummaryPeriod::SevenDays)
        .await
        .unwrap();
    assert_eq!(by_company.kind, ReferenceKind::Company);
    assert_eq!(by_company.summary.total_count, 3);
    let names: Vec<_> = by_company.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["Initech", "ACME", "No Company"]);

    let by_receiver = engine
        .summary_by_receiver(ALICE, SummaryPeriod::SevenDays)
        .await
        .unwrap();
    assert_eq!(by_receiver.groups.len(), 1);
    assert_eq!(by_receiver.groups[0].name, "No Receiver");
    assert_eq!(by_receiver.groups[0].amount, 149.0);

    let empty = engine
        .summary_by_category(ALICE, SummaryPeriod::SevenDays)
        .await
        .unwrap();
    assert_eq!(empty.groups.len(), 1);
    assert_eq!(empty.groups[0].name, "Uncategorized");
}

#[tokio::test]
async fn unknown_selectors_are_validation_errors() {
    assert_eq!(
        Grouping::try_from("hour"),
        Err(EngineError::InvalidFilter("invalid group_by: hour".to_string()))
    );
    assert_eq!(
        StatsPeriod::try_from("forever"),
        Err(EngineError::InvalidFilter("invalid period: forever".to_string()))
    );
    assert!(InvoiceStatus::try_from("void").is_err());
}

#[tokio::test]
async fn custom_lookback_beyond_the_bound_is_rejected() {
    let engine = engine().await;
    for days in [MAX_CUSTOM_DAYS + 1, 10_000_000, i64::MAX] {
        let result = engine
            .statistics(
                ALICE,
                &StatisticsOptions {
                    period: StatsPeriod::Custom,
                    days: Some(days),
                    grouping: Grouping::Day,
                    ..StatisticsOptions::default()
                },
            )
            .await;
        assert_eq!(
            result.map(|stats| stats.total_count),
            Err(EngineError::InvalidFilter(format!("invalid days: {days}")))
        );
    }

    let stats = engine
        .statistics(
            ALICE,
            &StatisticsOptions {
                period: StatsPeriod::Custom,
                days: Some(10),
                ..StatisticsOptions::default()
            },
        )
        .await
        .unwrap();
    assert_close((stats.to - stats.from).num_days() as f64, 10.0);
}

/// One USD invoice worth 100 billed by ACME and one HKD invoice of 780
/// (99.84 in USD) billed by Initech, both created now.
async fn mixed_currency_invoices(engine: &Engine) -> (Reference, Reference) {
    let acme = engine.new_company(ALICE, "ACME").await.unwrap();
    let initech = engine.new_company(ALICE, "Initech").await.unwrap();
    invoice(
        engine,
        CreateInvoiceCmd::new(ALICE, "US vendor", currency("USD"))
            .company_id(acme.id)
            .item(ItemDraft::new("Service", 1.0, 100.0)),
    )
    .await;
    invoice(
        engine,
        CreateInvoiceCmd::new(ALICE, "HK vendor", currency("HKD"))
            .company_id(initech.id)
            .item(ItemDraft::new("Service", 2.0, 300.0))
            .item(ItemDraft::new("Shipping", 1.0, 180.0)),
    )
    .await;
    (acme, initech)
}

async fn grouped(engine: &Engine, period: StatsPeriod, grouping: Grouping) -> InvoiceStatistics {
    engine
        .statistics(
            ALICE,
            &StatisticsOptions {
                period,
                grouping,
                aggregate: true,
                ..StatisticsOptions::default()
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn week_and_month_buckets_sum_reporting_amounts() {
    let engine = engine().await;
    mixed_currency_invoices(&engine).await;

    for (period, grouping, granularity) in [
        (StatsPeriod::LastMonth, Grouping::Week, TimeGranularity::Week),
        (StatsPeriod::LastYear, Grouping::Month, TimeGranularity::Month),
    ] {
        let stats = grouped(&engine, period, grouping).await;
        assert_close(stats.total_amount, 199.84);

        let Breakdown::Time {
            granularity: actual,
            buckets,
        } = &stats.breakdown
        else {
            panic!("expected time buckets, got {:?}", stats.breakdown);
        };
        assert_eq!(*actual, granularity);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].count, 2);
        assert_close(buckets[0].amount, 199.84);

        let aggregations = stats.aggregations.unwrap();
        assert_close(aggregations.max, 100.0);
        assert_close(aggregations.min, 99.84);
        assert_close(aggregations.avg, 99.92);
        assert_eq!(aggregations.max_invoice.unwrap().title, "US vendor");
    }
}

#[tokio::test]
async fn company_buckets_rank_by_reporting_amount() {
    let engine = engine().await;
    let (acme, initech) = mixed_currency_invoices(&engine).await;

    let stats = grouped(&engine, StatsPeriod::LastWeek, Grouping::Company).await;
    let Breakdown::Entity { kind, buckets } = &stats.breakdown else {
        panic!("expected entity buckets");
    };
    assert_eq!(*kind, ReferenceKind::Company);
    let ids: Vec<_> = buckets.iter().map(|b| b.id).collect();
    assert_eq!(ids, [Some(acme.id), Some(initech.id)]);
    assert_close(buckets[0].amount, 100.0);
    assert_close(buckets[1].amount, 99.84);

    let aggregations = stats.aggregations.unwrap();
    let max_bucket = aggregations.max_bucket.unwrap();
    assert_eq!(max_bucket.label, "ACME");
    assert_close(max_bucket.amount, 100.0);
    assert_close(aggregations.avg, 99.92);

    let by_company = engine
        .summary_by_company(ALICE, SummaryPeriod::SevenDays)
        .await
        .unwrap();
    let names: Vec<_> = by_company.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["ACME", "Initech"]);
    assert_close(by_company.summary.total_amount, 199.84);
}
