//! Store-level tests of the ledger's invariants.
//!
//! Though strecka_api::store defines its own level of API interface, most
//! other tests are at the http route level.
use jiff::SignedDuration;
use rust_decimal::dec;
use sqlx::SqlitePool;

use payloads::{
    ProductId, RankChange, Referable,
    requests::{MAX_QUANTITY, PriceUpdate},
};
use strecka_api::store::{
    self, StockAccounting, StoreError, ledger, migrate, product, upc, user,
};
use strecka_api::time::TimeSource;
use test_helpers::{alice_id, bob_id, cola_prices, spawn_app, test_epoch};

async fn setup_cola(
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<ProductId, StoreError> {
    user::create_user(&alice_id(), "Alice", time_source, pool).await?;
    user::create_user(&bob_id(), "Bob", time_source, pool).await?;
    product::create_product("Cola", &cola_prices(), time_source, pool).await
}

fn internal(price: rust_decimal::Decimal) -> PriceUpdate {
    PriceUpdate {
        internal_price: Some(price),
        ..Default::default()
    }
}

async fn open_price_count(
    product_id: &ProductId,
    pool: &SqlitePool,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM product_price
        WHERE product_id = ?1 AND valid_to IS NULL",
    )
    .bind(product_id)
    .fetch_one(pool)
    .await
}

#[tokio::test]
async fn price_resolution_uses_half_open_intervals() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let cola = setup_cola(&app.time_source, pool).await?;

    app.time_source.advance(SignedDuration::from_hours(1));
    let t1 = app.time_source.now();
    let new_price =
        product::supersede_price(&cola, &internal(dec!(9)), &app.time_source, pool)
            .await?;
    assert_eq!(new_price.valid_from, t1);
    assert!(new_price.is_open());
    assert_eq!(new_price.prices.purchase_price, dec!(5));
    assert_eq!(new_price.prices.external_price, dec!(10));

    let before = t1 - SignedDuration::from_millis(1);
    let old = product::resolve_price(&cola, before, pool).await?;
    assert_eq!(old.prices.internal_price, dec!(8));
    assert_eq!(old.valid_to, Some(t1));
    assert!(old.covers(before));
    assert!(!old.covers(t1));

    let at_t1 = product::resolve_price(&cola, t1, pool).await?;
    assert_eq!(at_t1.prices.internal_price, dec!(9));
    assert_eq!(at_t1.id, new_price.id);

    let at_creation = product::resolve_price(&cola, test_epoch(), pool).await?;
    assert_eq!(at_creation.id, old.id);

    let before_creation = test_epoch() - SignedDuration::from_millis(1);
    assert!(matches!(
        product::resolve_price(&cola, before_creation, pool).await,
        Err(StoreError::PriceNotFound)
    ));
    assert!(matches!(
        product::resolve_price(&ProductId(999), t1, pool).await,
        Err(StoreError::ProductNotFound)
    ));

    assert_eq!(open_price_count(&cola, pool).await?, 1);
    let history = product::price_history(&cola, pool).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].valid_to, Some(history[1].valid_from));
    Ok(())
}

#[tokio::test]
async fn purchases_are_priced_at_their_instant() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let cola = setup_cola(&app.time_source, pool).await?;

    let t1 = test_epoch() + SignedDuration::from_hours(1);
    let epsilon = SignedDuration::from_millis(1);

    app.time_source.set(t1 - epsilon);
    let early =
        ledger::record_purchase(&alice_id(), &cola, 1, &app.time_source, pool)
            .await?;

    app.time_source.set(t1);
    product::supersede_price(&cola, &internal(dec!(9)), &app.time_source, pool)
        .await?;

    app.time_source.set(t1 + epsilon);
    let late =
        ledger::record_purchase(&alice_id(), &cola, 1, &app.time_source, pool)
            .await?;

    assert_eq!(early.price_paid, dec!(8));
    assert_eq!(late.price_paid, dec!(9));
    assert_eq!(late.occurred_at, t1 + epsilon);
    Ok(())
}

#[tokio::test]
async fn price_paid_is_captured_at_write_time() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let cola = setup_cola(&app.time_source, pool).await?;

    let purchase =
        ledger::record_purchase(&alice_id(), &cola, 3, &app.time_source, pool)
            .await?;
    assert_eq!(purchase.price_paid, dec!(24.00));
    assert_eq!(purchase.quantity, 3);

    app.time_source.advance(SignedDuration::from_mins(1));
    product::supersede_price(&cola, &internal(dec!(12)), &app.time_source, pool)
        .await?;

    let transactions = ledger::user_transactions(&alice_id(), pool).await?;
    assert_eq!(transactions, vec![purchase]);

    let balance = user::get_balance(&alice_id(), pool).await?;
    assert_eq!(balance.total_debt_incurred, dec!(24));
    Ok(())
}

#[tokio::test]
async fn balance_is_derived_from_the_ledger() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;

    let fresh = user::get_balance(&alice_id(), pool).await?;
    assert_eq!(fresh.remaining_credits, dec!(0));
    assert_eq!(fresh.debt_incurred, dec!(0));

    // 10 units at purchase price 5
    let (stock, _) = product::add_stock(
        &cola,
        &alice_id(),
        10,
        &PriceUpdate::default(),
        ts,
        pool,
    )
    .await?;
    assert_eq!(stock.credit(), dec!(50));
    user::register_payment(&alice_id(), dec!(20), ts, pool).await?;
    ledger::record_purchase(&alice_id(), &cola, 3, ts, pool).await?;
    ledger::record_purchase(&bob_id(), &cola, 3, ts, pool).await?;

    let alice = user::get_balance(&alice_id(), pool).await?;
    assert_eq!(alice.total_credits_earned, dec!(50));
    assert_eq!(alice.total_payments_made, dec!(20));
    assert_eq!(alice.total_debt_incurred, dec!(24));
    assert_eq!(
        alice.remaining_credits,
        alice.total_credits_earned + alice.total_payments_made
            - alice.total_debt_incurred
    );
    assert_eq!(alice.remaining_credits, dec!(46));
    assert_eq!(alice.debt_incurred, dec!(0));

    let bob = user::get_balance(&bob_id(), pool).await?;
    assert_eq!(bob.remaining_credits, dec!(-24));
    assert_eq!(bob.debt_incurred, dec!(24));

    assert!(matches!(
        user::get_balance(&"nobody".into(), pool).await,
        Err(StoreError::UserNotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn leaderboard_ranks_total_and_tracks_recent_movement()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;
    let now = test_epoch() + SignedDuration::from_hours(12);

    ts.set(now - SignedDuration::from_hours(6));
    ledger::record_purchase(&bob_id(), &cola, 20, ts, pool).await?;
    ts.set(now - SignedDuration::from_mins(10));
    ledger::record_purchase(&bob_id(), &cola, 4, ts, pool).await?;
    ts.set(now - SignedDuration::from_mins(5));
    ledger::record_purchase(&alice_id(), &cola, 10, ts, pool).await?;
    ts.set(now);

    let rows = ledger::leaderboard(ts, pool).await?;
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].user_id, bob_id());
    assert_eq!(rows[0].user_name.as_deref(), Some("Bob"));
    assert_eq!(rows[0].total_quantity, 24);
    assert_eq!(rows[0].current_rank, 1);
    assert_eq!(rows[0].rank_change, RankChange::Down);

    assert_eq!(rows[1].user_id, alice_id());
    assert_eq!(rows[1].total_quantity, 10);
    assert_eq!(rows[1].current_rank, 2);
    assert_eq!(rows[1].rank_change, RankChange::New);

    // Bob's early purchase leaves the window
    ts.set(now + SignedDuration::from_hours(7));
    let rows = ledger::leaderboard(ts, pool).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].user_id, alice_id());
    assert_eq!(rows[0].rank_change, RankChange::Same);
    assert_eq!(rows[1].total_quantity, 4);
    Ok(())
}

#[tokio::test]
async fn leaderboard_ties_share_a_rank() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;
    user::create_user(&"1003".into(), "Carol", ts, pool).await?;

    ledger::record_purchase(&alice_id(), &cola, 5, ts, pool).await?;
    ledger::record_purchase(&bob_id(), &cola, 5, ts, pool).await?;
    ledger::record_purchase(&"1003".into(), &cola, 2, ts, pool).await?;

    let rows = ledger::leaderboard(ts, pool).await?;
    let ranks: Vec<_> = rows.iter().map(|r| r.current_rank).collect();
    assert_eq!(ranks, vec![1, 1, 3]);
    assert!(rows.iter().all(|r| r.rank_change == RankChange::New));
    Ok(())
}

#[tokio::test]
async fn latest_transactions_accumulate_per_member() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;

    ledger::record_purchase(&alice_id(), &cola, 2, ts, pool).await?;
    ts.advance(SignedDuration::from_mins(1));
    ledger::record_purchase(&bob_id(), &cola, 1, ts, pool).await?;
    ts.advance(SignedDuration::from_mins(1));
    ledger::record_purchase(&alice_id(), &cola, 3, ts, pool).await?;

    let latest = ledger::latest_transactions(ts, pool).await?;
    let series: Vec<_> = latest
        .iter()
        .map(|t| (t.user_id.0.as_str(), t.cumulative_quantity))
        .collect();
    assert_eq!(series, vec![("1001", 2), ("1002", 1), ("1001", 5)]);

    ts.advance(SignedDuration::from_hours(13));
    assert!(ledger::latest_transactions(ts, pool).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn transaction_numbers_sum_per_product() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;
    let mut water_prices = cola_prices();
    water_prices.internal_price = dec!(2.50);
    let water = product::create_product("Water", &water_prices, ts, pool).await?;

    ledger::record_purchase(&alice_id(), &water, 1, ts, pool).await?;
    ledger::record_purchase(&alice_id(), &cola, 2, ts, pool).await?;
    ledger::record_purchase(&alice_id(), &cola, 1, ts, pool).await?;

    let numbers = ledger::transaction_numbers(&alice_id(), pool).await?;
    assert_eq!(numbers.len(), 2);
    assert_eq!(numbers[0].product_id, cola);
    assert_eq!(numbers[0].quantity, 3);
    assert_eq!(numbers[0].price_paid, dec!(24));
    assert_eq!(numbers[1].product_name.as_deref(), Some("Water"));
    assert_eq!(numbers[1].price_paid, dec!(2.50));

    assert!(ledger::transaction_numbers(&bob_id(), pool).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn migrations_are_idempotent() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;

    let before = migrate::applied(pool).await?;
    migrate::run(pool).await?;
    migrate::run(pool).await?;
    let after = migrate::applied(pool).await?;

    let expected: Vec<_> =
        migrate::MIGRATIONS.iter().map(|m| m.name.to_string()).collect();
    assert_eq!(before, expected);
    assert_eq!(after, expected);
    Ok(())
}

#[tokio::test]
async fn purchase_errors_are_specific() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;

    assert!(matches!(
        ledger::record_purchase(&alice_id(), &cola, 0, ts, pool).await,
        Err(StoreError::QuantityMustBePositive)
    ));
    assert!(matches!(
        ledger::record_purchase(&"nobody".into(), &cola, 1, ts, pool).await,
        Err(StoreError::UserNotFound)
    ));
    assert!(matches!(
        ledger::record_purchase(&alice_id(), &ProductId(999), 1, ts, pool)
            .await,
        Err(StoreError::ProductNotFound)
    ));

    // a product with no price record at all
    let unpriced: ProductId = sqlx::query_scalar(
        "INSERT INTO products (name, created_at) VALUES ('Unpriced', 0)
        RETURNING id",
    )
    .fetch_one(pool)
    .await?;
    assert!(matches!(
        ledger::record_purchase(&alice_id(), &unpriced, 1, ts, pool).await,
        Err(StoreError::PriceNotFound)
    ));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn first_price_must_be_complete() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;

    let unpriced: ProductId = sqlx::query_scalar(
        "INSERT INTO products (name, created_at) VALUES ('Unpriced', 0)
        RETURNING id",
    )
    .fetch_one(pool)
    .await?;

    assert!(matches!(
        product::supersede_price(&unpriced, &internal(dec!(3)), ts, pool).await,
        Err(StoreError::MissingInitialPrice)
    ));
    assert!(matches!(
        product::supersede_price(&unpriced, &PriceUpdate::default(), ts, pool)
            .await,
        Err(StoreError::EmptyPriceUpdate)
    ));
    assert!(matches!(
        product::supersede_price(&ProductId(999), &internal(dec!(3)), ts, pool)
            .await,
        Err(StoreError::ProductNotFound)
    ));

    let price = product::supersede_price(
        &unpriced,
        &PriceUpdate::from(cola_prices()),
        ts,
        pool,
    )
    .await?;
    assert!(price.is_open());
    assert_eq!(open_price_count(&unpriced, pool).await?, 1);
    Ok(())
}

#[tokio::test]
async fn invalid_amounts_are_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;

    assert!(matches!(
        product::supersede_price(&cola, &internal(dec!(-1)), ts, pool).await,
        Err(StoreError::InvalidAmount(_))
    ));
    assert!(matches!(
        product::supersede_price(&cola, &internal(dec!(8.125)), ts, pool).await,
        Err(StoreError::InvalidAmount(_))
    ));
    assert!(matches!(
        user::register_payment(&alice_id(), dec!(0), ts, pool).await,
        Err(StoreError::AmountMustBePositive)
    ));
    assert!(matches!(
        user::register_payment(&"nobody".into(), dec!(10), ts, pool).await,
        Err(StoreError::UserNotFound)
    ));

    // nothing was superseded
    assert_eq!(product::price_history(&cola, pool).await?.len(), 1);
    Ok(())
}

async fn ledger_row_count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM transactions)
            + (SELECT COUNT(*) FROM product_stock)
            + (SELECT COUNT(*) FROM payments)",
    )
    .fetch_one(pool)
    .await
}

#[tokio::test]
async fn oversized_inputs_are_rejected_before_writing() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;
    ledger::record_purchase(&alice_id(), &cola, 1, ts, pool).await?;
    let rows = ledger_row_count(pool).await?;

    assert!(matches!(
        ledger::record_purchase(
            &alice_id(),
            &cola,
            100_000_000_000_000_000,
            ts,
            pool
        )
        .await,
        Err(StoreError::QuantityTooLarge)
    ));
    assert!(matches!(
        ledger::record_purchase(&alice_id(), &cola, MAX_QUANTITY + 1, ts, pool)
            .await,
        Err(StoreError::QuantityTooLarge)
    ));
    assert!(matches!(
        product::add_stock(
            &cola,
            &alice_id(),
            i64::MAX,
            &PriceUpdate::default(),
            ts,
            pool
        )
        .await,
        Err(StoreError::QuantityTooLarge)
    ));
    assert!(matches!(
        product::add_stock(
            &cola,
            &alice_id(),
            1,
            &internal(dec!(92233720368547758.07)),
            ts,
            pool
        )
        .await,
        Err(StoreError::AmountTooLarge(_))
    ));
    assert!(matches!(
        user::register_payment(&alice_id(), dec!(10000000.01), ts, pool).await,
        Err(StoreError::AmountTooLarge(_))
    ));
    assert!(matches!(
        product::supersede_price(&cola, &internal(dec!(100000000000000000000)), ts, pool).await,
        Err(StoreError::InvalidAmount(_) | StoreError::AmountTooLarge(_))
    ));

    assert_eq!(ledger_row_count(pool).await?, rows);
    assert_eq!(product::price_history(&cola, pool).await?.len(), 1);
    let balance = user::get_balance(&alice_id(), pool).await?;
    assert_eq!(balance.total_debt_incurred, dec!(8));
    Ok(())
}

#[tokio::test]
async fn largest_inputs_keep_the_balance_readable() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;
    let ceiling = dec!(10000000);

    product::add_stock(
        &cola,
        &alice_id(),
        MAX_QUANTITY,
        &PriceUpdate::from(payloads::Prices {
            purchase_price: ceiling,
            internal_price: ceiling,
            external_price: ceiling,
        }),
        ts,
        pool,
    )
    .await?;
    let purchase =
        ledger::record_purchase(&alice_id(), &cola, MAX_QUANTITY, ts, pool)
            .await?;
    assert_eq!(purchase.price_paid, dec!(10000000000000));
    user::register_payment(&alice_id(), ceiling, ts, pool).await?;

    let balance = user::get_balance(&alice_id(), pool).await?;
    assert_eq!(balance.total_credits_earned, dec!(10000000000000));
    assert_eq!(balance.total_debt_incurred, dec!(10000000000000));
    assert_eq!(balance.remaining_credits, ceiling);
    Ok(())
}

#[tokio::test]
async fn stock_with_price_update_credits_new_purchase_price()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;

    ts.advance(SignedDuration::from_hours(1));
    let update = PriceUpdate {
        purchase_price: Some(dec!(6)),
        internal_price: Some(dec!(9)),
        external_price: None,
    };
    let (stock, price) =
        product::add_stock(&cola, &bob_id(), 24, &update, ts, pool).await?;

    assert_eq!(stock.unit_cost, dec!(6));
    assert_eq!(stock.added_at, ts.now());
    assert_eq!(price.prices.purchase_price, dec!(6));
    assert_eq!(price.prices.internal_price, dec!(9));
    assert_eq!(price.prices.external_price, dec!(10));

    let balance = user::get_balance(&bob_id(), pool).await?;
    assert_eq!(balance.total_credits_earned, dec!(144));
    assert_eq!(product::price_history(&cola, pool).await?.len(), 2);
    assert_eq!(product::stock_history(&cola, pool).await?, vec![stock]);

    // a failed stock addition does not keep its price update
    assert!(matches!(
        product::add_stock(&cola, &"nobody".into(), 1, &update, ts, pool).await,
        Err(StoreError::UserNotFound)
    ));
    assert!(matches!(
        product::add_stock(&cola, &bob_id(), 0, &update, ts, pool).await,
        Err(StoreError::QuantityMustBePositive)
    ));
    assert_eq!(product::price_history(&cola, pool).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn stock_accounting_modes() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;

    product::add_stock(&cola, &alice_id(), 10, &PriceUpdate::default(), ts, pool)
        .await?;
    ledger::record_purchase(&bob_id(), &cola, 3, ts, pool).await?;

    assert_eq!(
        product::current_stock(&cola, StockAccounting::Gross, pool).await?,
        10
    );
    assert_eq!(
        product::current_stock(&cola, StockAccounting::Net, pool).await?,
        7
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_purchases_are_all_recorded() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let cola = setup_cola(&app.time_source, &app.db_pool).await?;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let pool = app.db_pool.clone();
        let ts = app.time_source.clone();
        handles.push(tokio::spawn(async move {
            ledger::record_purchase(&alice_id(), &cola, 1, &ts, &pool).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let balance = user::get_balance(&alice_id(), &app.db_pool).await?;
    assert_eq!(balance.total_debt_incurred, dec!(160));
    assert_eq!(balance.remaining_credits, dec!(-160));
    Ok(())
}

#[tokio::test]
async fn concurrent_supersedes_leave_one_open_price() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let cola = setup_cola(&app.time_source, &app.db_pool).await?;

    // all at the same instant, so some intervals are empty
    let mut handles = Vec::new();
    for i in 0..10 {
        let pool = app.db_pool.clone();
        let ts = app.time_source.clone();
        handles.push(tokio::spawn(async move {
            let update = internal(dec!(8) + rust_decimal::Decimal::from(i));
            product::supersede_price(&cola, &update, &ts, &pool)
                .await
                .map(|_| ())
        }));
        let pool = app.db_pool.clone();
        let ts = app.time_source.clone();
        handles.push(tokio::spawn(async move {
            ledger::record_purchase(&bob_id(), &cola, 1, &ts, &pool)
                .await
                .map(|_| ())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(open_price_count(&cola, &app.db_pool).await?, 1);
    let history = product::price_history(&cola, &app.db_pool).await?;
    assert_eq!(history.len(), 11);
    for pair in history.windows(2) {
        assert_eq!(pair[0].valid_to, Some(pair[1].valid_from));
    }

    // each purchase was charged one of the internal prices ever set
    let charged: Vec<_> = history.iter().map(|p| p.prices.internal_price).collect();
    let purchases = ledger::user_transactions(&bob_id(), &app.db_pool).await?;
    assert_eq!(purchases.len(), 10);
    for purchase in purchases {
        assert!(charged.contains(&purchase.price_paid));
    }
    Ok(())
}

#[tokio::test]
async fn supersede_behind_the_open_record_closes_it_empty() -> anyhow::Result<()>
{
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;
    let cola = setup_cola(ts, pool).await?;
    let created = test_epoch();

    ts.set(created - SignedDuration::from_hours(1));
    let new_price =
        product::supersede_price(&cola, &internal(dec!(9)), ts, pool).await?;
    assert_eq!(new_price.valid_from, created);
    assert!(new_price.is_open());

    let history = product::price_history(&cola, pool).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].valid_from, created);
    assert_eq!(history[0].valid_to, Some(created));
    assert!(!history[0].covers(created));
    for pair in history.windows(2) {
        assert_eq!(pair[0].valid_to, Some(pair[1].valid_from));
    }
    assert_eq!(open_price_count(&cola, pool).await?, 1);

    // the clock catching up resolves to the new record
    ts.set(created);
    let purchase =
        ledger::record_purchase(&alice_id(), &cola, 1, ts, pool).await?;
    assert_eq!(purchase.price_paid, dec!(9));
    Ok(())
}

#[tokio::test]
async fn upc_codes_resolve_to_their_referable() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;

    let alice_code = user::create_user(&alice_id(), "Alice", ts, pool).await?;
    let cola = product::create_product("Cola", &cola_prices(), ts, pool).await?;

    assert_eq!(
        upc::lookup(&alice_code, pool).await?,
        Referable::User(alice_id())
    );
    let cola_code = upc::code_for(&Referable::Product(cola), pool).await?;
    assert_ne!(cola_code, alice_code);
    assert_eq!(
        upc::lookup(&cola_code, pool).await?,
        Referable::Product(cola)
    );
    assert!(matches!(
        upc::lookup(&"00000000".into(), pool).await,
        Err(StoreError::UpcNotFound)
    ));

    let scanned =
        upc::scan(&cola_code, StockAccounting::Gross, ts, pool).await?;
    assert!(matches!(
        scanned,
        payloads::responses::ScanResult::Product(p) if p.product.id == cola
    ));
    Ok(())
}

#[tokio::test]
async fn duplicate_user_is_rejected_without_side_effects() -> anyhow::Result<()>
{
    let app = spawn_app().await;
    let pool = &app.db_pool;
    let ts = &app.time_source;

    user::create_user(&alice_id(), "Alice", ts, pool).await?;
    assert!(matches!(
        user::create_user(&alice_id(), "Alice again", ts, pool).await,
        Err(StoreError::UserAlreadyExists)
    ));
    assert_eq!(user::get_user(&alice_id(), pool).await?.name, "Alice");

    let codes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM upcs")
        .fetch_one(pool)
        .await?;
    assert_eq!(codes, 1);

    store::status(pool).await?;
    Ok(())
}
