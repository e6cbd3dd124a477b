//! The transaction ledger and the views aggregated from it.

use jiff::SignedDuration;
use payloads::{
    ProductId, Transaction, UserId,
    responses::{
        LatestTransaction, LeaderboardRow, PurchaseReceipt, TransactionNumber,
    },
};
use sqlx::SqlitePool;

use super::{
    StockAccounting, StoreError, millis, product, user, validate_quantity,
};
use crate::time::{TimeSource, Window};

/// Activity considered by the leaderboard and the latest-transactions feed.
pub const TOTAL_WINDOW: SignedDuration = SignedDuration::from_hours(12);
/// The tail of [`TOTAL_WINDOW`] that rank changes are measured over.
pub const RECENT_WINDOW: SignedDuration = SignedDuration::from_mins(15);
/// How many products [`transaction_numbers`] returns.
pub const TRANSACTION_NUMBERS_LIMIT: i64 = 10;

fn window(
    time_source: &TimeSource,
    length: SignedDuration,
) -> Result<Window, StoreError> {
    Window::trailing(time_source.now(), length)
        .map_err(|e| StoreError::UnexpectedError(e.into()))
}

/// Record a purchase of `quantity` units, charged at the internal price in
/// effect now.
///
/// Price resolution and the insert are one statement, so the charge always
/// comes from the record valid at the instant the row is written, even while
/// the price is being superseded concurrently.
pub async fn record_purchase(
    user_id: &UserId,
    product_id: &ProductId,
    quantity: i64,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<Transaction, StoreError> {
    validate_quantity(quantity)?;
    let now = millis(time_source.now());

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            user_id,
            product_id,
            quantity,
            price_paid,
            occurred_at
        )
        SELECT u.id, pp.product_id, ?3, ?3 * pp.internal_price, ?4
        FROM users u
        JOIN product_price pp
            ON pp.product_id = ?2
            AND pp.valid_from <= ?4
            AND (pp.valid_to IS NULL OR pp.valid_to > ?4)
        WHERE u.id = ?1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    let Some(transaction) = transaction else {
        let mut conn = pool.acquire().await?;
        return Err(
            product::explain_missing(user_id, product_id, &mut conn).await?
        );
    };

    tracing::info!(
        transaction_id = %transaction.id,
        %user_id,
        %product_id,
        quantity,
        price_paid = %transaction.price_paid,
        "recorded purchase"
    );
    Ok(transaction)
}

/// Record a purchase and read back what the member sees on the receipt.
pub async fn strecka(
    user_id: &UserId,
    product_id: &ProductId,
    quantity: i64,
    stock_accounting: StockAccounting,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<PurchaseReceipt, StoreError> {
    let transaction =
        record_purchase(user_id, product_id, quantity, time_source, pool)
            .await?;
    let user = user::get_user(user_id, pool).await?;
    let product =
        product::get_product(product_id, stock_accounting, pool).await?;
    let balance = user::get_balance(user_id, pool).await?;
    Ok(PurchaseReceipt {
        transaction,
        user,
        product,
        balance,
    })
}

/// A member's purchases, newest first.
pub async fn user_transactions(
    user_id: &UserId,
    pool: &SqlitePool,
) -> Result<Vec<Transaction>, StoreError> {
    user::get_user(user_id, pool).await?;
    Ok(sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE user_id = ?1
        ORDER BY occurred_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Every purchase in the last [`TOTAL_WINDOW`], oldest first, each with the
/// running total of units that member has bought within the window.
pub async fn latest_transactions(
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<Vec<LatestTransaction>, StoreError> {
    let window = window(time_source, TOTAL_WINDOW)?;
    Ok(sqlx::query_as::<_, LatestTransaction>(
        r#"
        SELECT
            t.user_id,
            u.name AS user_name,
            t.occurred_at,
            SUM(t.quantity) OVER (
                PARTITION BY t.user_id
                ORDER BY t.occurred_at, t.id
                ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
            ) AS cumulative_quantity
        FROM transactions t
        LEFT JOIN users u ON u.id = t.user_id
        WHERE t.occurred_at >= ?1 AND t.occurred_at <= ?2
        ORDER BY t.occurred_at ASC, t.id ASC
        "#,
    )
    .bind(millis(window.start))
    .bind(millis(window.end))
    .fetch_all(pool)
    .await?)
}

/// Rank members by units bought in the last [`TOTAL_WINDOW`].
///
/// Each row carries how the member's rank over the last [`RECENT_WINDOW`]
/// compares with their rank over the rest of the total window:
///
/// - `new`: bought recently but not before
/// - `up` / `down`: recent rank better / worse than the previous one
/// - `same`: equal ranks, or no recent purchases
///
/// All rankings are competition rankings: ties share a rank and the next
/// rank skips accordingly.
pub async fn leaderboard(
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<Vec<LeaderboardRow>, StoreError> {
    let total = window(time_source, TOTAL_WINDOW)?;
    let recent = window(time_source, RECENT_WINDOW)?;

    Ok(sqlx::query_as::<_, LeaderboardRow>(
        r#"
        WITH
        total AS (
            SELECT user_id, SUM(quantity) AS quantity
            FROM transactions
            WHERE occurred_at >= ?1 AND occurred_at <= ?3
            GROUP BY user_id
        ),
        recent AS (
            SELECT
                user_id,
                RANK() OVER (ORDER BY SUM(quantity) DESC) AS rank
            FROM transactions
            WHERE occurred_at >= ?2 AND occurred_at <= ?3
            GROUP BY user_id
        ),
        previous AS (
            SELECT
                user_id,
                RANK() OVER (ORDER BY SUM(quantity) DESC) AS rank
            FROM transactions
            WHERE occurred_at >= ?1 AND occurred_at < ?2
            GROUP BY user_id
        ),
        rank_changes AS (
            SELECT
                r.user_id,
                CASE
                    WHEN p.rank IS NULL THEN 'new'
                    WHEN r.rank < p.rank THEN 'up'
                    WHEN r.rank > p.rank THEN 'down'
                    ELSE 'same'
                END AS rank_change
            FROM recent r
            LEFT JOIN previous p ON p.user_id = r.user_id
        )
        SELECT
            t.user_id,
            u.name AS user_name,
            t.quantity AS total_quantity,
            RANK() OVER (ORDER BY t.quantity DESC) AS current_rank,
            COALESCE(c.rank_change, 'same') AS rank_change
        FROM total t
        LEFT JOIN users u ON u.id = t.user_id
        LEFT JOIN rank_changes c ON c.user_id = t.user_id
        WHERE t.quantity > 0
        ORDER BY current_rank ASC, t.user_id ASC
        "#,
    )
    .bind(millis(total.start))
    .bind(millis(recent.start))
    .bind(millis(total.end))
    .fetch_all(pool)
    .await?)
}

/// A member's most bought products, by units.
pub async fn transaction_numbers(
    user_id: &UserId,
    pool: &SqlitePool,
) -> Result<Vec<TransactionNumber>, StoreError> {
    user::get_user(user_id, pool).await?;
    Ok(sqlx::query_as::<_, TransactionNumber>(
        r#"
        SELECT
            t.product_id,
            p.name AS product_name,
            SUM(t.quantity) AS quantity,
            SUM(t.price_paid) AS price_paid
        FROM transactions t
        LEFT JOIN products p ON p.id = t.product_id
        WHERE t.user_id = ?1
        GROUP BY t.product_id
        ORDER BY quantity DESC, t.product_id ASC
        LIMIT ?2
        "#,
    )
    .bind(user_id)
    .bind(TRANSACTION_NUMBERS_LIMIT)
    .fetch_all(pool)
    .await?)
}
