//! Column representations used by the SQLite store.
//!
//! Timestamps are stored as unix milliseconds and money as hundredths, both
//! as INTEGER columns. These wrappers decode them into `jiff` and
//! `rust_decimal` types via `#[sqlx(try_from = "...")]`.

use jiff::Timestamp;
use rust_decimal::Decimal;

/// Scale of every stored monetary amount.
pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct Millis(pub i64);

impl From<Timestamp> for Millis {
    fn from(ts: Timestamp) -> Self {
        Self(ts.as_millisecond())
    }
}

impl TryFrom<Millis> for Timestamp {
    type Error = jiff::Error;

    fn try_from(ms: Millis) -> Result<Self, Self::Error> {
        Timestamp::from_millisecond(ms.0)
    }
}

#[derive(sqlx::Type)]
#[sqlx(transparent)]
pub struct OptionalMillis(pub Option<i64>);

impl TryFrom<OptionalMillis> for Option<Timestamp> {
    type Error = jiff::Error;

    fn try_from(ms: OptionalMillis) -> Result<Self, Self::Error> {
        ms.0.map(Timestamp::from_millisecond).transpose()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct Cents(pub i64);

impl From<Cents> for Decimal {
    fn from(cents: Cents) -> Self {
        Decimal::new(cents.0, MONEY_SCALE)
    }
}

impl TryFrom<Decimal> for Cents {
    type Error = InvalidAmount;

    /// Fails for amounts with sub-cent precision or outside the i64 range.
    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        if amount.round_dp(MONEY_SCALE) != amount {
            return Err(InvalidAmount(amount));
        }
        let mut scaled = amount;
        scaled.rescale(MONEY_SCALE);
        i64::try_from(scaled.mantissa())
            .map(Cents)
            .map_err(|_| InvalidAmount(amount))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Amount {0} cannot be stored with two decimals")]
pub struct InvalidAmount(pub Decimal);
