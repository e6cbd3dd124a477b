//! Products, interval-valid price history and the stock ledger.

use jiff::Timestamp;
use payloads::sql::{Millis, OptionalMillis};
use payloads::{
    PriceId, PriceRecord, Prices, Product, ProductId, Referable, StockRecord,
    UserId,
    requests::{PriceUpdate, SEARCH_PATTERN_MAX_LEN},
    responses::ProductWithPrice,
};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::{
    StockAccounting, StoreError, millis, price_to_cents, upc, validate_name,
    validate_quantity,
};
use crate::time::TimeSource;

/// A product joined with one of its price records.
#[derive(Debug, Clone, FromRow)]
struct DbProductWithPrice {
    #[sqlx(flatten)]
    product: Product,
    price_id: PriceId,
    #[sqlx(flatten)]
    prices: Prices,
    #[sqlx(try_from = "Millis")]
    valid_from: Timestamp,
    #[sqlx(try_from = "OptionalMillis")]
    valid_to: Option<Timestamp>,
}

impl From<DbProductWithPrice> for ProductWithPrice {
    fn from(db: DbProductWithPrice) -> Self {
        ProductWithPrice {
            price: PriceRecord {
                id: db.price_id,
                product_id: db.product.id,
                prices: db.prices,
                valid_from: db.valid_from,
                valid_to: db.valid_to,
            },
            product: db.product,
        }
    }
}

/// Validate every tier and convert to stored hundredths.
fn prices_to_cents(prices: &Prices) -> Result<[i64; 3], StoreError> {
    Ok([
        price_to_cents(prices.purchase_price)?,
        price_to_cents(prices.internal_price)?,
        price_to_cents(prices.external_price)?,
    ])
}

/// Build a LIKE pattern matching `search` anywhere, with `%`, `_` and `\`
/// in the input matched literally.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn product_exists(
    product_id: &ProductId,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    Ok(
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = ?1)")
            .bind(product_id)
            .fetch_one(conn)
            .await?,
    )
}

/// Work out why a write that needed a member, a product and a price in
/// effect matched nothing.
pub(crate) async fn explain_missing(
    user_id: &UserId,
    product_id: &ProductId,
    conn: &mut SqliteConnection,
) -> Result<StoreError, StoreError> {
    let user_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
    if !user_exists {
        return Ok(StoreError::UserNotFound);
    }
    if !product_exists(product_id, conn).await? {
        return Ok(StoreError::ProductNotFound);
    }
    Ok(StoreError::PriceNotFound)
}

async fn insert_price_tx(
    product_id: &ProductId,
    prices: &Prices,
    now: Timestamp,
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
) -> Result<PriceRecord, StoreError> {
    let [purchase, internal, external] = prices_to_cents(prices)?;
    Ok(sqlx::query_as::<_, PriceRecord>(
        r#"
        INSERT INTO product_price (
            product_id,
            purchase_price,
            internal_price,
            external_price,
            valid_from
        )
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(purchase)
    .bind(internal)
    .bind(external)
    .bind(millis(now))
    .fetch_one(&mut **tx)
    .await?)
}

/// Create a product with its first, open price record and a UPC.
pub async fn create_product(
    name: &str,
    prices: &Prices,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<ProductId, StoreError> {
    let name = validate_name(name)?;
    prices_to_cents(prices)?;
    let now = time_source.now();

    let mut tx = pool.begin().await?;
    let product_id: ProductId = sqlx::query_scalar(
        "INSERT INTO products (name, created_at) VALUES (?1, ?2) RETURNING id",
    )
    .bind(name)
    .bind(millis(now))
    .fetch_one(&mut *tx)
    .await?;

    let code = upc::mint_tx(&Referable::Product(product_id), &mut tx).await?;
    insert_price_tx(&product_id, prices, now, &mut tx).await?;
    tx.commit().await?;

    tracing::info!(%product_id, name, %code, "created product");
    Ok(product_id)
}

/// Get a product with its stock level under `stock_accounting`.
pub async fn get_product(
    product_id: &ProductId,
    stock_accounting: StockAccounting,
    pool: &SqlitePool,
) -> Result<Product, StoreError> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT
            p.id,
            p.name,
            p.created_at,
            COALESCE(
                (SELECT SUM(s.quantity) FROM product_stock s
                 WHERE s.product_id = p.id), 0)
            - CASE WHEN ?2 THEN COALESCE(
                (SELECT SUM(t.quantity) FROM transactions t
                 WHERE t.product_id = p.id), 0)
              ELSE 0 END AS total_stock
        FROM products p
        WHERE p.id = ?1
        "#,
    )
    .bind(product_id)
    .bind(stock_accounting == StockAccounting::Net)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::ProductNotFound)
}

/// Units of a product in stock.
///
/// `Gross` counts every unit ever added; `Net` also subtracts purchased
/// units.
pub async fn current_stock(
    product_id: &ProductId,
    stock_accounting: StockAccounting,
    pool: &SqlitePool,
) -> Result<i64, StoreError> {
    Ok(get_product(product_id, stock_accounting, pool)
        .await?
        .total_stock)
}

async fn resolve_price_conn(
    product_id: &ProductId,
    at: Timestamp,
    conn: &mut SqliteConnection,
) -> Result<PriceRecord, StoreError> {
    let price = sqlx::query_as::<_, PriceRecord>(
        r#"
        SELECT * FROM product_price
        WHERE product_id = ?1
          AND valid_from <= ?2
          AND (valid_to IS NULL OR valid_to > ?2)
        "#,
    )
    .bind(product_id)
    .bind(millis(at))
    .fetch_optional(&mut *conn)
    .await?;

    match price {
        Some(price) => Ok(price),
        None if product_exists(product_id, conn).await? => {
            Err(StoreError::PriceNotFound)
        }
        None => Err(StoreError::ProductNotFound),
    }
}

/// The price record whose `[valid_from, valid_to)` interval contains `at`.
pub async fn resolve_price(
    product_id: &ProductId,
    at: Timestamp,
    pool: &SqlitePool,
) -> Result<PriceRecord, StoreError> {
    let mut conn = pool.acquire().await?;
    resolve_price_conn(product_id, at, &mut conn).await
}

/// Every price record of a product, oldest first.
pub async fn price_history(
    product_id: &ProductId,
    pool: &SqlitePool,
) -> Result<Vec<PriceRecord>, StoreError> {
    let mut conn = pool.acquire().await?;
    if !product_exists(product_id, &mut conn).await? {
        return Err(StoreError::ProductNotFound);
    }
    Ok(sqlx::query_as::<_, PriceRecord>(
        r#"
        SELECT * FROM product_price
        WHERE product_id = ?1
        ORDER BY valid_from ASC, id ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?)
}

/// Get a product with the price in effect now.
pub async fn get_product_with_price(
    product_id: &ProductId,
    stock_accounting: StockAccounting,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<ProductWithPrice, StoreError> {
    let product = get_product(product_id, stock_accounting, pool).await?;
    let price = resolve_price(product_id, time_source.now(), pool).await?;
    Ok(ProductWithPrice { product, price })
}

/// Case-insensitive substring search over product names. Only products with
/// a price in effect now are returned, newest first.
pub async fn search_products(
    search: &str,
    stock_accounting: StockAccounting,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<Vec<ProductWithPrice>, StoreError> {
    if search.chars().count() > SEARCH_PATTERN_MAX_LEN {
        return Err(StoreError::FieldTooLong);
    }

    let rows = sqlx::query_as::<_, DbProductWithPrice>(
        r#"
        SELECT
            p.id,
            p.name,
            p.created_at,
            COALESCE(
                (SELECT SUM(s.quantity) FROM product_stock s
                 WHERE s.product_id = p.id), 0)
            - CASE WHEN ?3 THEN COALESCE(
                (SELECT SUM(t.quantity) FROM transactions t
                 WHERE t.product_id = p.id), 0)
              ELSE 0 END AS total_stock,
            pp.id AS price_id,
            pp.purchase_price,
            pp.internal_price,
            pp.external_price,
            pp.valid_from,
            pp.valid_to
        FROM products p
        JOIN product_price pp
            ON pp.product_id = p.id
            AND pp.valid_from <= ?2
            AND (pp.valid_to IS NULL OR pp.valid_to > ?2)
        WHERE LOWER(p.name) LIKE LOWER(?1) ESCAPE '\'
        ORDER BY p.id DESC
        "#,
    )
    .bind(like_pattern(search.trim()))
    .bind(millis(time_source.now()))
    .bind(stock_accounting == StockAccounting::Net)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProductWithPrice::from).collect())
}

/// Close the open price record at `now` and open a new one where it ends.
///
/// The close is the first statement, so the write lock is held before the
/// previous prices are read. If the product has no price yet, `update` must
/// set every tier.
async fn supersede_tx(
    product_id: &ProductId,
    update: &PriceUpdate,
    now: Timestamp,
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
) -> Result<PriceRecord, StoreError> {
    for price in [
        update.purchase_price,
        update.internal_price,
        update.external_price,
    ]
    .into_iter()
    .flatten()
    {
        price_to_cents(price)?;
    }

    // A clock behind the open record's start closes it as an empty interval.
    let closed = sqlx::query_as::<_, PriceRecord>(
        r#"
        UPDATE product_price
        SET valid_to = MAX(?2, valid_from)
        WHERE product_id = ?1 AND valid_to IS NULL
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(millis(now))
    .fetch_optional(&mut **tx)
    .await?;

    let (prices, valid_from) = match closed {
        Some(closed) => {
            (update.apply(&closed.prices), closed.valid_to.unwrap_or(now))
        }
        None if product_exists(product_id, &mut **tx).await? => (
            update.complete().ok_or(StoreError::MissingInitialPrice)?,
            now,
        ),
        None => return Err(StoreError::ProductNotFound),
    };

    insert_price_tx(product_id, &prices, valid_from, tx).await
}

/// Supersede a product's prices, returning the new open record.
///
/// Fields left out of `update` carry over from the record being closed. The
/// close and the insert commit together or not at all.
pub async fn supersede_price(
    product_id: &ProductId,
    update: &PriceUpdate,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<PriceRecord, StoreError> {
    if update.is_empty() {
        return Err(StoreError::EmptyPriceUpdate);
    }
    let now = time_source.now();

    let mut tx = pool.begin().await?;
    let price = supersede_tx(product_id, update, now, &mut tx).await?;
    tx.commit().await?;

    tracing::info!(
        %product_id,
        internal_price = %price.prices.internal_price,
        "superseded price"
    );
    Ok(price)
}

/// Add stock bought by `user_id`, crediting them `quantity × purchase
/// price`.
///
/// A non-empty `price_update` supersedes the prices first, in the same
/// transaction, so the credit uses the new purchase price. Returns the stock
/// row and the price record it was valued at.
pub async fn add_stock(
    product_id: &ProductId,
    user_id: &UserId,
    quantity: i64,
    price_update: &PriceUpdate,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<(StockRecord, PriceRecord), StoreError> {
    validate_quantity(quantity)?;
    let now = time_source.now();

    let mut tx = pool.begin().await?;
    if !price_update.is_empty() {
        supersede_tx(product_id, price_update, now, &mut tx).await?;
    }

    let stock = sqlx::query_as::<_, StockRecord>(
        r#"
        INSERT INTO product_stock (
            product_id,
            added_by,
            added_at,
            quantity,
            unit_cost
        )
        SELECT pp.product_id, u.id, ?3, ?4, pp.purchase_price
        FROM product_price pp
        JOIN users u ON u.id = ?2
        WHERE pp.product_id = ?1
          AND pp.valid_from <= ?3
          AND (pp.valid_to IS NULL OR pp.valid_to > ?3)
        RETURNING product_id, added_by, added_at, quantity, unit_cost
        "#,
    )
    .bind(product_id)
    .bind(user_id)
    .bind(millis(now))
    .bind(quantity)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(stock) = stock else {
        return Err(explain_missing(user_id, product_id, &mut *tx).await?);
    };
    let price = resolve_price_conn(product_id, now, &mut *tx).await?;
    tx.commit().await?;

    tracing::info!(
        %product_id,
        %user_id,
        quantity,
        credit = %stock.credit(),
        "added stock"
    );
    Ok((stock, price))
}

/// Every stock addition of a product, oldest first.
pub async fn stock_history(
    product_id: &ProductId,
    pool: &SqlitePool,
) -> Result<Vec<StockRecord>, StoreError> {
    let mut conn = pool.acquire().await?;
    if !product_exists(product_id, &mut conn).await? {
        return Err(StoreError::ProductNotFound);
    }
    Ok(sqlx::query_as::<_, StockRecord>(
        r#"
        SELECT product_id, added_by, added_at, quantity, unit_cost
        FROM product_stock
        WHERE product_id = ?1
        ORDER BY added_at ASC, id ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?)
}
