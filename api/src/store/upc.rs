//! UPC registry: scannable codes for members and products.

use payloads::{
    ProductId, Referable, ReferableType, UpcCode, UpcEntry, UpcId, UserId,
    responses::ScanResult,
};
use rand_core::{OsRng, RngCore};
use sqlx::{FromRow, SqlitePool};

use super::{StockAccounting, StoreError, product, user};
use crate::time::TimeSource;

/// Codes are eight digits, as printed by the label generator.
const CODE_MIN: u32 = 10_000_000;
const CODE_SPAN: u32 = 90_000_000;
const MAX_MINT_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, FromRow)]
struct DbUpc {
    id: UpcId,
    upc: UpcCode,
    referable_type: ReferableType,
    referable_id: String,
    referable_name: Option<String>,
}

impl TryFrom<DbUpc> for UpcEntry {
    type Error = StoreError;

    fn try_from(db: DbUpc) -> Result<Self, Self::Error> {
        Ok(UpcEntry {
            id: db.id,
            upc: db.upc,
            referable: to_referable(db.referable_type, db.referable_id)?,
            referable_name: db.referable_name,
        })
    }
}

fn to_referable(
    referable_type: ReferableType,
    referable_id: String,
) -> Result<Referable, StoreError> {
    match referable_type {
        ReferableType::User => Ok(Referable::User(UserId(referable_id))),
        ReferableType::Product => referable_id
            .parse()
            .map(|id| Referable::Product(ProductId(id)))
            .map_err(|_| StoreError::InvalidUpcReferable(referable_id)),
    }
}

fn referable_id(referable: &Referable) -> String {
    match referable {
        Referable::User(id) => id.0.clone(),
        Referable::Product(id) => id.0.to_string(),
    }
}

fn random_code() -> UpcCode {
    UpcCode((CODE_MIN + OsRng.next_u32() % CODE_SPAN).to_string())
}

/// Bind a freshly generated, unused code to `referable`.
///
/// Collisions with existing codes are retried with a new random code. Must
/// be called inside the transaction that creates the referable.
pub(crate) async fn mint_tx(
    referable: &Referable,
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
) -> Result<UpcCode, StoreError> {
    let id = referable_id(referable);
    for attempt in 1..=MAX_MINT_ATTEMPTS {
        let code = random_code();
        let inserted: Option<UpcId> = sqlx::query_scalar(
            r#"
            INSERT INTO upcs (upc, referable_type, referable_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (upc) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&code)
        .bind(referable.referable_type())
        .bind(&id)
        .fetch_optional(&mut **tx)
        .await?;

        if inserted.is_some() {
            return Ok(code);
        }
        tracing::warn!(%code, attempt, "UPC collision, retrying");
    }
    Err(StoreError::UpcSpaceExhausted(MAX_MINT_ATTEMPTS))
}

/// Resolve a code to the member or product it identifies.
pub async fn lookup(
    upc: &UpcCode,
    pool: &SqlitePool,
) -> Result<Referable, StoreError> {
    let (referable_type, referable_id): (ReferableType, String) =
        sqlx::query_as(
            "SELECT referable_type, referable_id FROM upcs WHERE upc = ?1",
        )
        .bind(upc)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::UpcNotFound)?;

    to_referable(referable_type, referable_id)
}

/// The code assigned to `referable`.
pub async fn code_for(
    referable: &Referable,
    pool: &SqlitePool,
) -> Result<UpcCode, StoreError> {
    sqlx::query_scalar(
        "SELECT upc FROM upcs WHERE referable_type = ?1 AND referable_id = ?2",
    )
    .bind(referable.referable_type())
    .bind(referable_id(referable))
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::UpcNotFound)
}

/// All codes of one kind with the name of what they refer to, in creation
/// order. Used for printable directories.
pub async fn list(
    referable_type: ReferableType,
    pool: &SqlitePool,
) -> Result<Vec<UpcEntry>, StoreError> {
    let rows = sqlx::query_as::<_, DbUpc>(
        r#"
        SELECT
            u.id,
            u.upc,
            u.referable_type,
            u.referable_id,
            COALESCE(us.name, p.name) AS referable_name
        FROM upcs u
        LEFT JOIN users us
            ON u.referable_type = 'user' AND us.id = u.referable_id
        LEFT JOIN products p
            ON u.referable_type = 'product'
            AND CAST(p.id AS TEXT) = u.referable_id
        WHERE u.referable_type = ?1
        ORDER BY u.id ASC
        "#,
    )
    .bind(referable_type)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(UpcEntry::try_from).collect()
}

/// Resolve a scanned code to the member with their balance, or the product
/// with its current price.
pub async fn scan(
    upc: &UpcCode,
    stock_accounting: StockAccounting,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<ScanResult, StoreError> {
    match lookup(upc, pool).await? {
        Referable::User(user_id) => {
            let user = user::get_user_with_balance(&user_id, pool).await?;
            Ok(ScanResult::User(user))
        }
        Referable::Product(product_id) => {
            let product = product::get_product_with_price(
                &product_id,
                stock_accounting,
                time_source,
                pool,
            )
            .await?;
            Ok(ScanResult::Product(product))
        }
    }
}
