use actix_web::{HttpResponse, post, web};
use payloads::{ProductId, requests, responses::StockReceipt};
use sqlx::SqlitePool;

use crate::store::{self, StockAccounting};
use crate::time::TimeSource;

use super::APIError;

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/create_product")]
pub async fn create_product(
    details: web::Json<requests::CreateProduct>,
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let product_id = store::product::create_product(
        &details.name,
        &details.prices,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(product_id))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/get_product")]
pub async fn get_product(
    product_id: web::Json<ProductId>,
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
    stock_accounting: web::Data<StockAccounting>,
) -> Result<HttpResponse, APIError> {
    let product = store::product::get_product_with_price(
        &product_id,
        **stock_accounting,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(product))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/search_products")]
pub async fn search_products(
    details: web::Json<requests::SearchProducts>,
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
    stock_accounting: web::Data<StockAccounting>,
) -> Result<HttpResponse, APIError> {
    let products = store::product::search_products(
        &details.pattern,
        **stock_accounting,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(products))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/update_price")]
pub async fn update_price(
    details: web::Json<requests::UpdatePrice>,
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let price = store::product::supersede_price(
        &details.product_id,
        &details.update,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(price))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/price_history")]
pub async fn price_history(
    product_id: web::Json<ProductId>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let history = store::product::price_history(&product_id, &pool).await?;
    Ok(HttpResponse::Ok().json(history))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/add_stock")]
pub async fn add_stock(
    details: web::Json<requests::AddStock>,
    pool: web::Data<SqlitePool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let (stock, price) = store::product::add_stock(
        &details.product_id,
        &details.user_id,
        details.quantity,
        &details.price_update,
        &time_source,
        &pool,
    )
    .await?;
    let balance = store::user::get_balance(&details.user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(StockReceipt {
        stock,
        price,
        balance,
    }))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/stock_history")]
pub async fn stock_history(
    product_id: web::Json<ProductId>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    let history = store::product::stock_history(&product_id, &pool).await?;
    Ok(HttpResponse::Ok().json(history))
}
