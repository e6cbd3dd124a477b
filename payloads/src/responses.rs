use crate::{
    Account, Balance, PriceRecord, Product, ProductId, RankChange,
    Transaction, UserId,
};
#[cfg(feature = "use-sqlx")]
use crate::sql::{Cents, Millis};
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A member together with the balance derived at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithBalance {
    pub user: Account,
    pub balance: Balance,
}

/// A product with the price record in effect at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWithPrice {
    pub product: Product,
    pub price: PriceRecord,
}

/// What a scanned code resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScanResult {
    User(UserWithBalance),
    Product(ProductWithPrice),
}

/// Result of a recorded purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub transaction: Transaction,
    pub user: Account,
    pub product: Product,
    pub balance: Balance,
}

/// Result of adding stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceipt {
    pub stock: crate::StockRecord,
    /// The price record in effect after the (optional) price update.
    pub price: PriceRecord,
    pub balance: Balance,
}

/// One row of the activity leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct LeaderboardRow {
    pub user_id: UserId,
    pub user_name: Option<String>,
    /// Units bought in the whole window.
    pub total_quantity: i64,
    /// Competition rank by `total_quantity`; ties share a rank.
    pub current_rank: i64,
    pub rank_change: RankChange,
}

/// One point of a member's cumulative purchase series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct LatestTransaction {
    pub user_id: UserId,
    pub user_name: Option<String>,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Millis"))]
    pub occurred_at: Timestamp,
    pub cumulative_quantity: i64,
}

/// A member's purchases of one product, summed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct TransactionNumber {
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub quantity: i64,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "Cents"))]
    pub price_paid: Decimal,
}
