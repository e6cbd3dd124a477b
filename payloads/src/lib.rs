pub mod api_client;
pub mod requests;
pub mod responses;
#[cfg(feature = "use-sqlx")]
pub mod sql;

pub use api_client::{APIClient, ClientError};

use derive_more::Display;
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[cfg(feature = "use-sqlx")]
use sql::{Cents, Millis, OptionalMillis};

/// Externally supplied member identity (e.g. a chat platform snowflake).
///
/// Never generated by the ledger; registration fails if the id is taken.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Id type wrappers help ensure we don't mix up ids for different tables.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct ProductId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct PriceId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct TransactionId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct PaymentId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct UpcId(pub i64);

/// A scannable code printed on member cards and product shelves.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct UpcCode(pub String);

impl From<&str> for UpcCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

/// What kind of entity a UPC refers to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ReferableType {
    #[display("user")]
    User,
    #[display("product")]
    Product,
}

/// The entity behind a scanned code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "referable_id", rename_all = "lowercase")]
pub enum Referable {
    User(UserId),
    Product(ProductId),
}

impl Referable {
    pub fn referable_type(&self) -> ReferableType {
        match self {
            Self::User(_) => ReferableType::User,
            Self::Product(_) => ReferableType::Product,
        }
    }
}

/// Movement of a member's leaderboard position between the previous window
/// and the most recent one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum RankChange {
    /// Active recently, absent from the previous window.
    #[display("new")]
    New,
    #[display("up")]
    Up,
    #[display("down")]
    Down,
    #[display("same")]
    Same,
}

/// A registered member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct Account {
    pub id: UserId,
    pub name: String,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Millis"))]
    pub created_at: Timestamp,
}

/// A member's balance, derived from the ledger on every read.
///
/// `remaining_credits` is signed: positive is credit, negative is debt.
/// `debt_incurred` is the magnitude of that debt, or zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct Balance {
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub total_credits_earned: Decimal,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub total_payments_made: Decimal,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub total_debt_incurred: Decimal,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub remaining_credits: Decimal,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub debt_incurred: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Units in stock under the configured stock accounting mode.
    pub total_stock: i64,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Millis"))]
    pub created_at: Timestamp,
}

/// The three price tiers of a product.
///
/// `internal` is what members are charged; `purchase` is what the bar paid
/// and what restocking members are credited; `external` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct Prices {
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub purchase_price: Decimal,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub internal_price: Decimal,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub external_price: Decimal,
}

/// One version of a product's prices, valid over `[valid_from, valid_to)`.
/// An absent `valid_to` means the record is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct PriceRecord {
    pub id: PriceId,
    pub product_id: ProductId,
    #[cfg_attr(feature = "use-sqlx", sqlx(flatten))]
    pub prices: Prices,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Millis"))]
    pub valid_from: Timestamp,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "OptionalMillis"))]
    pub valid_to: Option<Timestamp>,
}

impl PriceRecord {
    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Whether `at` falls inside the half-open validity interval.
    pub fn covers(&self, at: Timestamp) -> bool {
        self.valid_from <= at && self.valid_to.is_none_or(|to| at < to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct StockRecord {
    pub product_id: ProductId,
    pub added_by: UserId,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Millis"))]
    pub added_at: Timestamp,
    pub quantity: i64,
    /// Purchase price in effect when the stock was added.
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub unit_cost: Decimal,
}

impl StockRecord {
    /// Credit earned by the member who added the stock.
    pub fn credit(&self) -> Decimal {
        self.unit_cost * Decimal::from(self.quantity)
    }
}

/// An immutable purchase ("strecka") row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Total charged, captured at write time from the price then in effect.
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub price_paid: Decimal,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Millis"))]
    pub occurred_at: Timestamp,
}

/// Money paid into a member's tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub amount: Decimal,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Millis"))]
    pub paid_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcEntry {
    pub id: UpcId,
    pub upc: UpcCode,
    pub referable: Referable,
    /// Name of the member or product, if it still exists.
    pub referable_name: Option<String>,
}
