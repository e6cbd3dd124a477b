use actix_web::{HttpResponse, post, web};
use payloads::{UserId, requests};
use sqlx::SqlitePool;

use crate::store;
use crate::time::TimeSource;

use super::APIError;

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/create_user")]
pub async fn create_user(
    details: web::Json<requests::CreateUser>,
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let code = store::user::create_user(
        &details.user_id,
        &details.name,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(code))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/get_user")]
pub async fn get_user(
    user_id: web::Json<UserId>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let user = store::user::get_user_with_balance(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/get_balance")]
pub async fn get_balance(
    user_id: web::Json<UserId>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let balance = store::user::get_balance(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(balance))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/rename_user")]
pub async fn rename_user(
    details: web::Json<requests::RenameUser>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    store::user::rename_user(&details.user_id, &details.name, &pool).await?;
    Ok(HttpResponse::Ok().finish())
}

/// Record a payment and return the member's updated balance.
#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/register_payment")]
pub async fn register_payment(
    details: web::Json<requests::RegisterPayment>,
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    store::user::register_payment(
        &details.user_id,
        details.amount,
        &time_source,
        &pool,
    )
    .await?;
    let balance = store::user::get_balance(&details.user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(balance))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/list_payments")]
pub async fn list_payments(
    user_id: web::Json<UserId>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let payments = store::user::list_payments(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(payments))
}
