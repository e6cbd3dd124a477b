use crate::{ProductId, UpcCode, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const USER_ID_MAX_LEN: usize = 64;
pub const NAME_MAX_LEN: usize = 100;
pub const SEARCH_PATTERN_MAX_LEN: usize = 100;
/// Largest quantity a single purchase or stock addition may carry.
pub const MAX_QUANTITY: i64 = 1_000_000;
/// Largest price or payment, in hundredths.
///
/// Together with [`MAX_QUANTITY`] this keeps every line total far inside the
/// INTEGER range.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub user_id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameUser {
    pub user_id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayment {
    pub user_id: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(flatten)]
    pub prices: crate::Prices,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProducts {
    pub pattern: String,
}

/// A partial price change. Fields left as `None` carry over from the price
/// record being superseded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub purchase_price: Option<Decimal>,
    pub internal_price: Option<Decimal>,
    pub external_price: Option<Decimal>,
}

impl PriceUpdate {
    pub fn is_empty(&self) -> bool {
        self.purchase_price.is_none()
            && self.internal_price.is_none()
            && self.external_price.is_none()
    }

    /// Overlay this update on the previous prices.
    pub fn apply(&self, previous: &crate::Prices) -> crate::Prices {
        crate::Prices {
            purchase_price: self
                .purchase_price
                .unwrap_or(previous.purchase_price),
            internal_price: self
                .internal_price
                .unwrap_or(previous.internal_price),
            external_price: self
                .external_price
                .unwrap_or(previous.external_price),
        }
    }

    /// The full set of prices, if every tier is specified.
    pub fn complete(&self) -> Option<crate::Prices> {
        Some(crate::Prices {
            purchase_price: self.purchase_price?,
            internal_price: self.internal_price?,
            external_price: self.external_price?,
        })
    }
}

impl From<crate::Prices> for PriceUpdate {
    fn from(prices: crate::Prices) -> Self {
        Self {
            purchase_price: Some(prices.purchase_price),
            internal_price: Some(prices.internal_price),
            external_price: Some(prices.external_price),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePrice {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub update: PriceUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddStock {
    pub product_id: ProductId,
    /// The member who bought the stock and is credited for it.
    pub user_id: UserId,
    pub quantity: i64,
    /// Optionally supersede the product's prices before the stock is
    /// credited.
    #[serde(default)]
    pub price_update: PriceUpdate,
}

/// Record a purchase ("strecka").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strecka {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupUpc {
    pub upc: UpcCode,
}
