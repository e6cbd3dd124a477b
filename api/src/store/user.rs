//! Member accounts, payments and derived balances.

use payloads::{
    Account, Balance, Payment, Referable, UpcCode, UserId,
    requests::USER_ID_MAX_LEN, responses::UserWithBalance,
};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use super::{StoreError, millis, to_cents, upc, validate_name};
use crate::time::TimeSource;

fn validate_user_id(user_id: &UserId) -> Result<(), StoreError> {
    if user_id.0.trim().is_empty() {
        return Err(StoreError::EmptyField);
    }
    if user_id.0.len() > USER_ID_MAX_LEN {
        return Err(StoreError::FieldTooLong);
    }
    Ok(())
}

/// Register a member under an externally supplied id and mint their UPC.
///
/// Fails with `UserAlreadyExists` if the id is taken; nothing is written in
/// that case.
pub async fn create_user(
    user_id: &UserId,
    name: &str,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<UpcCode, StoreError> {
    validate_user_id(user_id)?;
    let name = validate_name(name)?;

    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(
        r#"
        INSERT INTO users (id, name, created_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(millis(time_source.now()))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Err(StoreError::UserAlreadyExists);
    }

    let code = upc::mint_tx(&Referable::User(user_id.clone()), &mut tx).await?;
    tx.commit().await?;

    tracing::info!(%user_id, %code, "registered user");
    Ok(code)
}

pub async fn get_user(
    user_id: &UserId,
    pool: &SqlitePool,
) -> Result<Account, StoreError> {
    sqlx::query_as::<_, Account>("SELECT * FROM users WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::UserNotFound)
}

/// Change a member's display name, the only mutable account field.
pub async fn rename_user(
    user_id: &UserId,
    name: &str,
    pool: &SqlitePool,
) -> Result<(), StoreError> {
    let name = validate_name(name)?;
    let updated = sqlx::query("UPDATE users SET name = ?2 WHERE id = ?1")
        .bind(user_id)
        .bind(name)
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(StoreError::UserNotFound);
    }
    Ok(())
}

/// Derive a member's balance from the ledger.
///
/// - credits earned: stock the member added, at the unit cost captured then
/// - payments made: money paid into the tab
/// - debt incurred: the `price_paid` of every purchase
///
/// `remaining_credits = credits + payments - debt`, and `debt_incurred` is
/// the part of that below zero.
pub async fn get_balance(
    user_id: &UserId,
    pool: &SqlitePool,
) -> Result<Balance, StoreError> {
    sqlx::query_as::<_, Balance>(
        r#"
        SELECT
            s.credits AS total_credits_earned,
            s.payments AS total_payments_made,
            s.debt AS total_debt_incurred,
            s.credits + s.payments - s.debt AS remaining_credits,
            MAX(s.debt - s.credits - s.payments, 0) AS debt_incurred
        FROM (
            SELECT
                (
                    SELECT COALESCE(SUM(ps.quantity * ps.unit_cost), 0)
                    FROM product_stock ps
                    WHERE ps.added_by = u.id
                ) AS credits,
                (
                    SELECT COALESCE(SUM(p.amount), 0)
                    FROM payments p
                    WHERE p.user_id = u.id
                ) AS payments,
                (
                    SELECT COALESCE(SUM(t.price_paid), 0)
                    FROM transactions t
                    WHERE t.user_id = u.id
                ) AS debt
            FROM users u
            WHERE u.id = ?1
        ) s
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::UserNotFound)
}

pub async fn get_user_with_balance(
    user_id: &UserId,
    pool: &SqlitePool,
) -> Result<UserWithBalance, StoreError> {
    let user = get_user(user_id, pool).await?;
    let balance = get_balance(user_id, pool).await?;
    Ok(UserWithBalance { user, balance })
}

/// Record money paid into a member's tab.
pub async fn register_payment(
    user_id: &UserId,
    amount: Decimal,
    time_source: &TimeSource,
    pool: &SqlitePool,
) -> Result<Payment, StoreError> {
    if amount <= Decimal::ZERO {
        return Err(StoreError::AmountMustBePositive);
    }
    let cents = to_cents(amount)?;

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (user_id, amount, paid_at)
        SELECT id, ?2, ?3 FROM users WHERE id = ?1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(cents)
    .bind(millis(time_source.now()))
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::UserNotFound)?;

    tracing::info!(%user_id, %amount, "registered payment");
    Ok(payment)
}

/// A member's payments, oldest first.
pub async fn list_payments(
    user_id: &UserId,
    pool: &SqlitePool,
) -> Result<Vec<Payment>, StoreError> {
    get_user(user_id, pool).await?;
    Ok(sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE user_id = ?1 ORDER BY paid_at, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}
