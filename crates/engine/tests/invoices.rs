use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Statement};

use engine::{
    AddItemCmd, CreateInvoiceCmd, Currency, Engine, EngineError, InvoiceFilter, InvoiceStatus,
    ItemDraft, RateProvider, StaticRateSource, UpdateInvoiceCmd, UpdateItemCmd, invoice_items,
    invoice_tags,
};
use migration::MigratorTrait;
use uuid::Uuid;

const ALICE: &str = "alice";
const BOB: &str = "bob";

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let rates = StaticRateSource::new()
        .with_rate("HKD", "USD", 0.125)
        .with_rate("EUR", "USD", 1.25);
    let engine = Engine::builder()
        .database(db.clone())
        .rates(Arc::new(RateProvider::fixed(rates)))
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn hkd() -> Currency {
    Currency::try_from("HKD").unwrap()
}

fn usd() -> Currency {
    Currency::try_from("USD").unwrap()
}

#[tokio::test]
async fn invoice_totals_are_sums_of_converted_items() {
    let (engine, _db) = engine_with_db().await;

    let created = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Office supplies", hkd())
                .item(ItemDraft::new("Paper", 2.0, 40.0))
                .item(ItemDraft::new("Toner", 1.0, 160.0)),
        )
        .await
        .unwrap();

    assert!(!created.is_duplicate);
    let detail = created.detail;
    assert_eq!(detail.invoice.amount, 240.0);
    assert_eq!(detail.invoice.target_amount, 30.0);
    assert_eq!(detail.items.len(), 2);
    for item in &detail.items {
        assert_eq!(item.target_currency, usd());
        assert_eq!(item.fx_rate_used, 0.125);
        assert_eq!(item.target_amount, item.amount * 0.125);
    }
}

#[tokio::test]
async fn reporting_currency_items_mirror_their_amount() {
    let (engine, _db) = engine_with_db().await;

    let detail = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Hosting", usd())
                .item(ItemDraft::new("VPS", 3.0, 12.5))
                .item(ItemDraft::new("Backup", 1.0, 4.0).target_amount(999.0)),
        )
        .await
        .unwrap()
        .detail;

    for item in &detail.items {
        assert_eq!(item.target_amount, item.amount);
        assert_eq!(item.fx_rate_used, 1.0);
    }
    assert_eq!(detail.invoice.amount, 41.5);
    assert_eq!(detail.invoice.target_amount, 41.5);
}

#[tokio::test]
async fn currency_change_reconverts_every_item() {
    let (engine, _db) = engine_with_db().await;

    let detail = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Dinner", hkd()).item(ItemDraft::new("Set", 1.0, 80.0)),
        )
        .await
        .unwrap()
        .detail;
    assert_eq!(detail.items[0].target_amount, 10.0);

    let updated = engine
        .update_invoice_currency(ALICE, detail.invoice.id, usd())
        .await
        .unwrap();

    assert_eq!(updated.invoice.currency, usd());
    assert_eq!(updated.items[0].target_amount, 80.0);
    assert_eq!(updated.items[0].fx_rate_used, 1.0);
    assert_eq!(updated.invoice.amount, 80.0);
    assert_eq!(updated.invoice.target_amount, 80.0);

    let back = engine
        .update_invoice(
            UpdateInvoiceCmd::new(ALICE, detail.invoice.id).currency(Currency::try_from("eur").unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(back.items[0].fx_rate_used, 1.25);
    assert_eq!(back.invoice.target_amount, 100.0);
}

#[tokio::test]
async fn item_writes_keep_totals_in_step() {
    let (engine, _db) = engine_with_db().await;

    let invoice_id = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Parts", hkd()).item(ItemDraft::new("Bolt", 4.0, 10.0)),
        )
        .await
        .unwrap()
        .detail
        .invoice
        .id;

    let added = engine
        .add_item(AddItemCmd::new(
            ALICE,
            invoice_id,
            ItemDraft::new("Nut", 8.0, 5.0),
        ))
        .await
        .unwrap();
    assert_eq!(added.item.amount, 40.0);
    assert_eq!(added.item.target_amount, 5.0);
    assert_eq!(added.invoice.amount, 80.0);
    assert_eq!(added.invoice.target_amount, 10.0);

    let updated = engine
        .update_item(UpdateItemCmd::new(ALICE, added.item.id).quantity(16.0))
        .await
        .unwrap();
    assert_eq!(updated.item.amount, 80.0);
    assert_eq!(updated.invoice.amount, 120.0);
    assert_eq!(updated.invoice.target_amount, 15.0);

    let invoice = engine.delete_item(ALICE, added.item.id).await.unwrap();
    assert_eq!(invoice.amount, 40.0);
    assert_eq!(invoice.target_amount, 5.0);
}

#[tokio::test]
async fn manual_target_override_is_pinned_for_one_write_only() {
    let (engine, _db) = engine_with_db().await;

    let detail = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Consulting", hkd())
                .item(ItemDraft::new("Day rate", 1.0, 100.0)),
        )
        .await
        .unwrap()
        .detail;
    let item_id = detail.items[0].id;

    let pinned = engine
        .update_item(UpdateItemCmd::new(ALICE, item_id).target_amount(20.0))
        .await
        .unwrap();
    assert_eq!(pinned.item.target_amount, 20.0);
    assert_eq!(pinned.item.fx_rate_used, 0.2);
    assert_eq!(pinned.invoice.target_amount, 20.0);

    // A later edit without an override converts through the provider again.
    let repriced = engine
        .update_item(UpdateItemCmd::new(ALICE, item_id).unit_price(200.0))
        .await
        .unwrap();
    assert_eq!(repriced.item.amount, 200.0);
    assert_eq!(repriced.item.target_amount, 25.0);
    assert_eq!(repriced.item.fx_rate_used, 0.125);
    assert_eq!(repriced.invoice.target_amount, 25.0);
}

#[tokio::test]
async fn force_recalculate_wins_over_override() {
    let (engine, _db) = engine_with_db().await;

    let detail = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Taxi", hkd())
                .item(ItemDraft::new("Ride", 1.0, 64.0).target_amount(10.0)),
        )
        .await
        .unwrap()
        .detail;
    assert_eq!(detail.items[0].target_amount, 10.0);
    assert_eq!(detail.items[0].fx_rate_used, 10.0 / 64.0);

    let forced = engine
        .update_item(
            UpdateItemCmd::new(ALICE, detail.items[0].id)
                .target_amount(50.0)
                .force_recalculate(),
        )
        .await
        .unwrap();
    assert_eq!(forced.item.target_amount, 8.0);
    assert_eq!(forced.item.fx_rate_used, 0.125);
}

#[tokio::test]
async fn invalid_item_values_are_rejected() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Broken", hkd()).item(ItemDraft::new("x", -1.0, 1.0)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .create_invoice(CreateInvoiceCmd::new(ALICE, "   ", hkd()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidText("title must not be empty".to_string())
    );
}

#[tokio::test]
async fn duplicate_submission_returns_the_existing_invoice() {
    let (engine, db) = engine_with_db().await;
    let receiver = engine.new_receiver(ALICE, "ACME Ltd").await.unwrap();
    let start = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 9, 30, 0, 0, 0).unwrap();

    let submit = || {
        CreateInvoiceCmd::new(ALICE, "September", hkd())
            .receiver_id(receiver.id)
            .period(start, end)
            .item(ItemDraft::new("Retainer", 1.0, 800.0))
    };

    let first = engine.create_invoice(submit()).await.unwrap();
    let second = engine.create_invoice(submit()).await.unwrap();

    assert!(!first.is_duplicate);
    assert!(second.is_duplicate);
    assert_eq!(second.detail.invoice.id, first.detail.invoice.id);
    assert_eq!(second.detail.items, first.detail.items);

    let stored = engine::invoices::Entity::find().all(&db).await.unwrap();
    assert_eq!(stored.len(), 1);
    let items = invoice_items::Entity::find().all(&db).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn missing_receiver_and_dates_match_each_other() {
    let (engine, _db) = engine_with_db().await;

    let first = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Cash sale", usd()).item(ItemDraft::new("Item", 1.0, 9.5)),
        )
        .await
        .unwrap();
    let second = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Other title", usd())
                .item(ItemDraft::new("Split A", 1.0, 4.5))
                .item(ItemDraft::new("Split B", 1.0, 5.0)),
        )
        .await
        .unwrap();

    assert!(second.is_duplicate);
    assert_eq!(second.detail.invoice.id, first.detail.invoice.id);
}

#[tokio::test]
async fn duplicate_key_is_scoped_and_exact() {
    let (engine, _db) = engine_with_db().await;
    let receiver = engine.new_receiver(ALICE, "ACME Ltd").await.unwrap();

    let first = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Lunch", usd()).item(ItemDraft::new("Meal", 1.0, 20.0)),
        )
        .await
        .unwrap();

    let other_receiver = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Lunch", usd())
                .receiver_id(receiver.id)
                .item(ItemDraft::new("Meal", 1.0, 20.0)),
        )
        .await
        .unwrap();
    assert!(!other_receiver.is_duplicate);

    let other_owner = engine
        .create_invoice(
            CreateInvoiceCmd::new(BOB, "Lunch", usd()).item(ItemDraft::new("Meal", 1.0, 20.0)),
        )
        .await
        .unwrap();
    assert!(!other_owner.is_duplicate);
    assert_ne!(other_owner.detail.invoice.id, first.detail.invoice.id);

    let other_amount = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Lunch", usd()).item(ItemDraft::new("Meal", 1.0, 20.5)),
        )
        .await
        .unwrap();
    assert!(!other_amount.is_duplicate);
}

#[tokio::test]
async fn other_owners_see_not_found() {
    let (engine, _db) = engine_with_db().await;

    let detail = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Private", usd()).item(ItemDraft::new("Thing", 1.0, 1.0)),
        )
        .await
        .unwrap()
        .detail;

    assert_eq!(
        engine.invoice(BOB, detail.invoice.id).await.unwrap_err(),
        EngineError::KeyNotFound("invoice not exists".to_string())
    );
    assert_eq!(
        engine
            .update_item(UpdateItemCmd::new(BOB, detail.items[0].id).quantity(2.0))
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("item not exists".to_string())
    );
    assert_eq!(
        engine.delete_invoice(BOB, detail.invoice.id).await.unwrap_err(),
        EngineError::KeyNotFound("invoice not exists".to_string())
    );
    assert!(engine.invoice(ALICE, detail.invoice.id).await.is_ok());
}

#[tokio::test]
async fn references_must_belong_to_the_owner() {
    let (engine, _db) = engine_with_db().await;
    let bobs_category = engine.new_category(BOB, "Travel").await.unwrap();

    let err = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Flight", usd())
                .category_id(bobs_category.id)
                .item(ItemDraft::new("Seat", 1.0, 300.0)),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::KeyNotFound("category not exists".to_string())
    );

    let unknown_tag = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Flight", usd())
                .tag(Uuid::new_v4())
                .item(ItemDraft::new("Seat", 1.0, 300.0)),
        )
        .await
        .unwrap_err();
    assert_eq!(
        unknown_tag,
        EngineError::KeyNotFound("tag not exists".to_string())
    );
}

#[tokio::test]
async fn delete_invoice_removes_items_and_tags() {
    let (engine, db) = engine_with_db().await;
    let tag = engine.new_tag(ALICE, "q3").await.unwrap();

    let detail = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Tagged", usd())
                .tag(tag.id)
                .item(ItemDraft::new("A", 1.0, 1.0))
                .item(ItemDraft::new("B", 1.0, 2.0)),
        )
        .await
        .unwrap()
        .detail;
    assert_eq!(detail.tag_ids, vec![tag.id]);

    engine.delete_invoice(ALICE, detail.invoice.id).await.unwrap();

    assert!(matches!(
        engine.invoice(ALICE, detail.invoice.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(invoice_items::Entity::find().all(&db).await.unwrap().is_empty());
    assert!(invoice_tags::Entity::find().all(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn set_invoice_tags_replaces_the_tag_set() {
    let (engine, _db) = engine_with_db().await;
    let q3 = engine.new_tag(ALICE, "q3").await.unwrap();
    let travel = engine.new_tag(ALICE, "travel").await.unwrap();

    let invoice_id = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Trip", usd())
                .tag(q3.id)
                .item(ItemDraft::new("Hotel", 2.0, 90.0)),
        )
        .await
        .unwrap()
        .detail
        .invoice
        .id;

    let tags = engine
        .set_invoice_tags(ALICE, invoice_id, &[travel.id, travel.id])
        .await
        .unwrap();
    assert_eq!(tags, vec![travel.id]);
    assert_eq!(
        engine.invoice(ALICE, invoice_id).await.unwrap().tag_ids,
        vec![travel.id]
    );
}

#[tokio::test]
async fn update_invoice_patches_fields_without_touching_totals() {
    let (engine, _db) = engine_with_db().await;
    let receiver = engine.new_receiver(ALICE, "Landlord").await.unwrap();

    let detail = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Rent", usd())
                .receiver_id(receiver.id)
                .item(ItemDraft::new("October", 1.0, 1200.0)),
        )
        .await
        .unwrap()
        .detail;

    let updated = engine
        .update_invoice(
            UpdateInvoiceCmd::new(ALICE, detail.invoice.id)
                .title("Rent October")
                .status(InvoiceStatus::Paid)
                .receiver_id(None),
        )
        .await
        .unwrap();

    assert_eq!(updated.invoice.title, "Rent October");
    assert_eq!(updated.invoice.status, InvoiceStatus::Paid);
    assert_eq!(updated.invoice.receiver_id, None);
    assert_eq!(updated.invoice.amount, 1200.0);
    assert_eq!(updated.invoice.target_amount, 1200.0);
}

#[tokio::test]
async fn recompute_repairs_drifted_totals() {
    let (engine, db) = engine_with_db().await;

    let invoice_id = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Drift", hkd())
                .item(ItemDraft::new("A", 2.0, 40.0))
                .item(ItemDraft::new("B", 1.0, 160.0)),
        )
        .await
        .unwrap()
        .detail
        .invoice
        .id;

    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE invoices SET amount = 0, target_amount = 0 WHERE id = ?",
        vec![invoice_id.to_string().into()],
    ))
    .await
    .unwrap();

    let invoice = engine
        .recompute_invoice_totals(ALICE, invoice_id)
        .await
        .unwrap();
    assert_eq!(invoice.amount, 240.0);
    assert_eq!(invoice.target_amount, 30.0);
}

#[tokio::test]
async fn list_invoices_pages_newest_first_with_filters() {
    let (engine, _db) = engine_with_db().await;
    let base = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

    for (i, title) in ["Coffee beans", "Rent", "Coffee machine"].iter().enumerate() {
        engine
            .create_invoice(
                CreateInvoiceCmd::new(ALICE, *title, usd())
                    .created_at(base + Duration::days(i as i64))
                    .item(ItemDraft::new("x", 1.0, 10.0 + i as f64)),
            )
            .await
            .unwrap();
    }

    let (page, cursor) = engine
        .list_invoices_page(ALICE, 2, None, &InvoiceFilter::default())
        .await
        .unwrap();
    let titles: Vec<_> = page.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, ["Coffee machine", "Rent"]);
    let cursor = cursor.unwrap();

    let (page, next) = engine
        .list_invoices_page(ALICE, 2, Some(&cursor), &InvoiceFilter::default())
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].title, "Coffee beans");
    assert_eq!(next, None);

    let coffee = InvoiceFilter {
        keyword: Some("Coffee".to_string()),
        ..InvoiceFilter::default()
    };
    let (page, _) = engine
        .list_invoices_page(ALICE, 10, None, &coffee)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);

    assert_eq!(
        engine
            .list_invoices_page(ALICE, 10, Some("not a cursor"), &coffee)
            .await
            .unwrap_err(),
        EngineError::InvalidCursor("invalid invoices cursor".to_string())
    );
}

/// Makes every later write to `invoices` fail, so the totals refresh of an
/// item write errors after the item row has already been touched.
async fn reject_invoice_updates(db: &DatabaseConnection) {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "CREATE TRIGGER reject_invoice_updates BEFORE UPDATE ON invoices \
         BEGIN SELECT RAISE(ABORT, 'invoice updates rejected'); END;",
    ))
    .await
    .unwrap();
}

async fn stored_items(db: &DatabaseConnection) -> Vec<invoice_items::Model> {
    invoice_items::Entity::find().all(db).await.unwrap()
}

#[tokio::test]
async fn item_writes_roll_back_when_totals_refresh_fails() {
    let (engine, db) = engine_with_db().await;
    let detail = engine
        .create_invoice(
            CreateInvoiceCmd::new(ALICE, "Parts", hkd()).item(ItemDraft::new("Bolt", 4.0, 10.0)),
        )
        .await
        .unwrap()
        .detail;
    let invoice_id = detail.invoice.id;
    let item_id = detail.items[0].id;

    reject_invoice_updates(&db).await;
    let before = stored_items(&db).await;
    assert_eq!(before.len(), 1);

    let added = engine
        .add_item(AddItemCmd::new(
            ALICE,
            invoice_id,
            ItemDraft::new("Nut", 8.0, 5.0),
        ))
        .await;
    assert!(matches!(added, Err(EngineError::Database(_))), "{added:?}");
    assert_eq!(stored_items(&db).await, before);

    let updated = engine
        .update_item(UpdateItemCmd::new(ALICE, item_id).quantity(16.0))
        .await;
    assert!(matches!(updated, Err(EngineError::Database(_))), "{updated:?}");
    assert_eq!(stored_items(&db).await, before);

    let deleted = engine.delete_item(ALICE, item_id).await;
    assert!(matches!(deleted, Err(EngineError::Database(_))), "{deleted:?}");
    assert_eq!(stored_items(&db).await, before);

    let invoice = engine.invoice(ALICE, invoice_id).await.unwrap().invoice;
    assert_eq!(invoice.amount, 40.0);
    assert_eq!(invoice.target_amount, 5.0);
}

#[tokio::test]
async fn page_limit_is_clamped() {
    let (engine, _db) = engine_with_db().await;
    for title in ["First", "Second"] {
        engine
            .create_invoice(
                CreateInvoiceCmd::new(ALICE, title, usd()).item(ItemDraft::new("x", 1.0, 1.0)),
            )
            .await
            .unwrap();
    }

    let (page, next) = engine
        .list_invoices_page(ALICE, u64::MAX, None, &InvoiceFilter::default())
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(next, None);

    let (page, next) = engine
        .list_invoices_page(ALICE, 0, None, &InvoiceFilter::default())
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert!(next.is_some());
}

async fn titles_matching(engine: &Engine, keyword: &str) -> Vec<String> {
    let filter = InvoiceFilter {
        keyword: Some(keyword.to_string()),
        ..InvoiceFilter::default()
    };
    let (page, _) = engine
        .list_invoices_page(ALICE, 10, None, &filter)
        .await
        .unwrap();
    page.into_iter().map(|invoice| invoice.title).collect()
}

#[tokio::test]
async fn keyword_wildcards_match_literally() {
    let (engine, _db) = engine_with_db().await;
    for title in ["500 units", "50% deposit", "unit_a", "unitXa"] {
        engine
            .create_invoice(
                CreateInvoiceCmd::new(ALICE, title, usd()).item(ItemDraft::new("x", 1.0, 1.0)),
            )
            .await
            .unwrap();
    }

    assert_eq!(titles_matching(&engine, "50%").await, ["50% deposit"]);
    assert_eq!(titles_matching(&engine, "t_a").await, ["unit_a"]);
    assert!(titles_matching(&engine, "\\").await.is_empty());
}
