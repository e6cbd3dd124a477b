use actix_web::{HttpResponse, get, post, web};
use payloads::{Referable, ReferableType, requests};
use sqlx::SqlitePool;

use crate::store::{self, StockAccounting};
use crate::time::TimeSource;

use super::APIError;

#[tracing::instrument(skip(pool), ret)]
#[post("/lookup_upc")]
pub async fn lookup_upc(
    details: web::Json<requests::LookupUpc>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let referable = store::upc::lookup(&details.upc, &pool).await?;
    Ok(HttpResponse::Ok().json(referable))
}

/// Resolve a scanned code to a member with their balance, or a product with
/// its current price.
#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/scan_upc")]
pub async fn scan_upc(
    details: web::Json<requests::LookupUpc>,
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
    stock_accounting: web::Data<StockAccounting>,
) -> Result<HttpResponse, APIError> {
    let result = store::upc::scan(
        &details.upc,
        **stock_accounting,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(result))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/upc_for")]
pub async fn upc_for(
    referable: web::Json<Referable>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let code = store::upc::code_for(&referable, &pool).await?;
    Ok(HttpResponse::Ok().json(code))
}

#[tracing::instrument(skip(pool))]
#[get("/user_upcs")]
pub async fn user_upcs(
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let entries = store::upc::list(ReferableType::User, &pool).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[tracing::instrument(skip(pool))]
#[get("/product_upcs")]
pub async fn product_upcs(
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let entries = store::upc::list(ReferableType::Product, &pool).await?;
    Ok(HttpResponse::Ok().json(entries))
}
