//! Database store for the ledger.
//!
//! ## Design Decisions
//!
//! ### Recompute on read
//! - Balances, stock levels and the leaderboard are never stored. Every read
//!   aggregates the append-only tables (`transactions`, `product_stock`,
//!   `payments`), so they can't drift from the rows they summarize.
//! - Amounts that feed those aggregates (`price_paid`, `unit_cost`) are
//!   captured when the row is written. Later price changes never alter past
//!   balances.
//!
//! ### Atomicity on SQLite
//! - SQLite serializes writers. Each write transaction issues a write as its
//!   first statement, so the write lock is held before anything is read and
//!   no other writer can commit in between.
//! - A purchase resolves the price and inserts the transaction in a single
//!   `INSERT ... SELECT`, so it is always priced from the record valid at the
//!   instant of the insert.
//! - The schema rejects a second open price record for a product with a
//!   partial unique index.
//!
//! ### Time Source Dependency
//! - Functions that need the current time accept a `TimeSource` parameter
//!   instead of reading the system clock, so time can be mocked in tests.
//!
//! ### Storage formats
//! - Timestamps are INTEGER unix milliseconds, money is INTEGER hundredths.
//!   See `payloads::sql` for the decoding side.

use std::str::FromStr;
use std::time::Duration;

use derive_more::Display;
use payloads::sql::{Cents, InvalidAmount, Millis};
use payloads::requests::{MAX_AMOUNT_CENTS, MAX_QUANTITY, NAME_MAX_LEN};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions,
    SqliteSynchronous,
};

pub mod ledger;
pub mod migrate;
pub mod product;
pub mod upc;
pub mod user;

/// How long a writer waits for another writer's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 8;

/// How "current stock" is computed from the ledger.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StockAccounting {
    /// Total ever added.
    #[default]
    #[display("gross")]
    Gross,
    /// Total added minus total purchased.
    #[display("net")]
    Net,
}

impl FromStr for StockAccounting {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gross" => Ok(Self::Gross),
            "net" => Ok(Self::Net),
            other => Err(anyhow::anyhow!(
                "unknown stock accounting mode '{other}', expected gross or net"
            )),
        }
    }
}

/// Open (creating if missing) the SQLite database and apply any pending
/// migrations.
///
/// A migration failure is returned as an error; callers must not serve
/// requests against a partially migrated schema.
#[tracing::instrument(err)]
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    migrate::run(&pool).await?;
    tracing::info!(database_url, "database ready");
    Ok(pool)
}

/// Check that the database is reachable.
pub async fn status(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Wait for in-flight queries and close every connection.
pub async fn close(pool: &SqlitePool) {
    pool.close().await;
}

/// Convert an amount into stored hundredths, bounded by
/// [`MAX_AMOUNT_CENTS`].
pub(crate) fn to_cents(amount: Decimal) -> Result<i64, StoreError> {
    let cents = Cents::try_from(amount)
        .map(|c| c.0)
        .map_err(|InvalidAmount(amount)| StoreError::InvalidAmount(amount))?;
    if cents.unsigned_abs() > MAX_AMOUNT_CENTS.unsigned_abs() {
        return Err(StoreError::AmountTooLarge(amount));
    }
    Ok(cents)
}

/// Convert a price into stored hundredths, rejecting negative values.
pub(crate) fn price_to_cents(amount: Decimal) -> Result<i64, StoreError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(StoreError::InvalidAmount(amount));
    }
    to_cents(amount)
}

pub(crate) fn millis(ts: jiff::Timestamp) -> i64 {
    Millis::from(ts).0
}

/// Validate a display name, returning it trimmed.
pub(crate) fn validate_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::EmptyField);
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(StoreError::FieldTooLong);
    }
    Ok(name)
}

pub(crate) fn validate_quantity(quantity: i64) -> Result<(), StoreError> {
    if quantity <= 0 {
        return Err(StoreError::QuantityMustBePositive);
    }
    if quantity > MAX_QUANTITY {
        return Err(StoreError::QuantityTooLarge);
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User not found")]
    UserNotFound,
    #[error("User is already registered")]
    UserAlreadyExists,
    #[error("Product not found")]
    ProductNotFound,
    #[error("No price in effect for this product")]
    PriceNotFound,
    #[error("UPC not found")]
    UpcNotFound,
    #[error("Quantity must be positive")]
    QuantityMustBePositive,
    #[error("Quantity exceeds {}", MAX_QUANTITY)]
    QuantityTooLarge,
    #[error("Amount must be positive")]
    AmountMustBePositive,
    #[error("Invalid amount {0}: must be non-negative with at most two decimals")]
    InvalidAmount(Decimal),
    #[error("Amount {0} exceeds the largest storable amount")]
    AmountTooLarge(Decimal),
    #[error("Field must not be empty")]
    EmptyField,
    #[error("Field too long")]
    FieldTooLong,
    #[error("Price update sets no price")]
    EmptyPriceUpdate,
    #[error("A product's first price must set purchase, internal and external")]
    MissingInitialPrice,
    #[error("Could not find a free UPC after {0} attempts")]
    UpcSpaceExhausted(usize),
    #[error("Database invariant violation: invalid UPC referable '{0}'")]
    InvalidUpcReferable(String),
    #[error("Unique constraint violation")]
    NotUnique(#[source] sqlx::Error),
    #[error("Database error")]
    Database(#[source] sqlx::Error),
    #[error("Unexpected error")]
    UnexpectedError(#[from] anyhow::Error),
}

impl StoreError {
    /// Failures of the storage layer itself, as opposed to domain outcomes
    /// the caller can act on.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::NotUnique(_)
                | Self::Database(_)
                | Self::UnexpectedError(_)
                | Self::UpcSpaceExhausted(_)
                | Self::InvalidUpcReferable(_)
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::NotUnique(e);
        }
        StoreError::Database(e)
    }
}
