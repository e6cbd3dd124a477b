use actix_web::{HttpResponse, get, post, web};
use payloads::{UserId, requests};
use sqlx::SqlitePool;

use crate::store::{self, StockAccounting};
use crate::time::TimeSource;

use super::APIError;

/// Record a purchase against the member's tab.
#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/strecka")]
pub async fn strecka(
    details: web::Json<requests::Strecka>,
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
    stock_accounting: web::Data<StockAccounting>,
) -> Result<HttpResponse, APIError> {
    let receipt = store::ledger::strecka(
        &details.user_id,
        &details.product_id,
        details.quantity,
        **stock_accounting,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/user_transactions")]
pub async fn user_transactions(
    user_id: web::Json<UserId>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let transactions =
        store::ledger::user_transactions(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

#[tracing::instrument(skip(pool, time_source))]
#[get("/latest_transactions")]
pub async fn latest_transactions(
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let latest =
        store::ledger::latest_transactions(&time_source, &pool).await?;
    Ok(HttpResponse::Ok().json(latest))
}

#[tracing::instrument(skip(pool, time_source))]
#[get("/leaderboard")]
pub async fn leaderboard(
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let rows = store::ledger::leaderboard(&time_source, &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/transaction_numbers")]
pub async fn transaction_numbers(
    user_id: web::Json<UserId>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let numbers = store::ledger::transaction_numbers(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(numbers))
}
