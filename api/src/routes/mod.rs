pub mod ledger;
pub mod product;
pub mod upc;
pub mod user;

use actix_web::{
    HttpResponse, ResponseError, body::BoxBody, dev::HttpServiceFactory, get,
    web,
};
use sqlx::SqlitePool;

use crate::store::{self, StoreError};
use crate::telemetry::log_error;

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(health_check)
        .service(user::create_user)
        .service(user::get_user)
        .service(user::get_balance)
        .service(user::rename_user)
        .service(user::register_payment)
        .service(user::list_payments)
        .service(product::create_product)
        .service(product::get_product)
        .service(product::search_products)
        .service(product::update_price)
        .service(product::price_history)
        .service(product::add_stock)
        .service(product::stock_history)
        .service(ledger::strecka)
        .service(ledger::user_transactions)
        .service(ledger::latest_transactions)
        .service(ledger::leaderboard)
        .service(ledger::transaction_numbers)
        .service(upc::lookup_upc)
        .service(upc::scan_upc)
        .service(upc::upc_for)
        .service(upc::user_upcs)
        .service(upc::product_upcs)
}

#[tracing::instrument(skip(pool))]
#[get("/health_check")]
pub async fn health_check(
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, APIError> {
    store::status(&pool).await?;
    Ok(HttpResponse::Ok().body("healthy"))
}

#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Bad request")]
    BadRequest(#[source] anyhow::Error),
    #[error("Not found")]
    NotFound(#[source] anyhow::Error),
    #[error("Conflict")]
    Conflict(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            Self::BadRequest(e) => {
                HttpResponse::BadRequest().body(format!("{self}: {e}"))
            }
            Self::NotFound(e) => {
                HttpResponse::NotFound().body(format!("{self}: {e}"))
            }
            Self::Conflict(e) => {
                HttpResponse::Conflict().body(format!("{self}: {e}"))
            }
            Self::UnexpectedError(_) => {
                HttpResponse::InternalServerError().body(self.to_string())
            }
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        if e.is_storage_failure() {
            let e = anyhow::Error::from(e);
            log_error(&e);
            return APIError::UnexpectedError(e);
        }
        match e {
            StoreError::UserNotFound
            | StoreError::ProductNotFound
            | StoreError::PriceNotFound
            | StoreError::UpcNotFound => APIError::NotFound(e.into()),
            StoreError::UserAlreadyExists => APIError::Conflict(e.into()),
            _ => APIError::BadRequest(e.into()),
        }
    }
}
