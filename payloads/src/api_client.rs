use crate::{
    Balance, Payment, PriceRecord, ProductId, Referable, StockRecord,
    Transaction, UpcCode, UpcEntry, UserId, requests, responses,
};
use reqwest::StatusCode;
use serde::Serialize;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// An API client for the ledger, used by the front ends and in tests.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.inner_client
            .post(self.format_url(path))
            .json(body)
            .send()
            .await
    }

    async fn empty_get(&self, path: &str) -> ReqwestResult {
        self.inner_client.get(self.format_url(path)).send().await
    }
}

/// Members and balances
impl APIClient {
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self.empty_get("health_check").await?;
        ok_empty(response).await
    }

    /// Register a member, returning their new UPC. Fails with 409 if the id
    /// is already registered.
    pub async fn create_user(
        &self,
        details: &requests::CreateUser,
    ) -> Result<UpcCode, ClientError> {
        let response = self.post("create_user", details).await?;
        ok_body(response).await
    }

    pub async fn get_user(
        &self,
        user_id: &UserId,
    ) -> Result<responses::UserWithBalance, ClientError> {
        let response = self.post("get_user", user_id).await?;
        ok_body(response).await
    }

    pub async fn get_balance(
        &self,
        user_id: &UserId,
    ) -> Result<Balance, ClientError> {
        let response = self.post("get_balance", user_id).await?;
        ok_body(response).await
    }

    pub async fn rename_user(
        &self,
        details: &requests::RenameUser,
    ) -> Result<(), ClientError> {
        let response = self.post("rename_user", details).await?;
        ok_empty(response).await
    }

    pub async fn register_payment(
        &self,
        details: &requests::RegisterPayment,
    ) -> Result<Balance, ClientError> {
        let response = self.post("register_payment", details).await?;
        ok_body(response).await
    }

    pub async fn list_payments(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Payment>, ClientError> {
        let response = self.post("list_payments", user_id).await?;
        ok_body(response).await
    }
}

/// Products, prices and stock
impl APIClient {
    pub async fn create_product(
        &self,
        details: &requests::CreateProduct,
    ) -> Result<ProductId, ClientError> {
        let response = self.post("create_product", details).await?;
        ok_body(response).await
    }

    /// Get a product with the price currently in effect.
    pub async fn get_product(
        &self,
        product_id: &ProductId,
    ) -> Result<responses::ProductWithPrice, ClientError> {
        let response = self.post("get_product", product_id).await?;
        ok_body(response).await
    }

    pub async fn search_products(
        &self,
        details: &requests::SearchProducts,
    ) -> Result<Vec<responses::ProductWithPrice>, ClientError> {
        let response = self.post("search_products", details).await?;
        ok_body(response).await
    }

    /// Supersede the open price record, returning the new one.
    pub async fn update_price(
        &self,
        details: &requests::UpdatePrice,
    ) -> Result<PriceRecord, ClientError> {
        let response = self.post("update_price", details).await?;
        ok_body(response).await
    }

    pub async fn price_history(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<PriceRecord>, ClientError> {
        let response = self.post("price_history", product_id).await?;
        ok_body(response).await
    }

    pub async fn add_stock(
        &self,
        details: &requests::AddStock,
    ) -> Result<responses::StockReceipt, ClientError> {
        let response = self.post("add_stock", details).await?;
        ok_body(response).await
    }

    pub async fn stock_history(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<StockRecord>, ClientError> {
        let response = self.post("stock_history", product_id).await?;
        ok_body(response).await
    }
}

/// Purchases and activity
impl APIClient {
    pub async fn strecka(
        &self,
        details: &requests::Strecka,
    ) -> Result<responses::PurchaseReceipt, ClientError> {
        let response = self.post("strecka", details).await?;
        ok_body(response).await
    }

    pub async fn latest_transactions(
        &self,
    ) -> Result<Vec<responses::LatestTransaction>, ClientError> {
        let response = self.empty_get("latest_transactions").await?;
        ok_body(response).await
    }

    pub async fn leaderboard(
        &self,
    ) -> Result<Vec<responses::LeaderboardRow>, ClientError> {
        let response = self.empty_get("leaderboard").await?;
        ok_body(response).await
    }

    /// A member's ten most bought products.
    pub async fn transaction_numbers(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<responses::TransactionNumber>, ClientError> {
        let response = self.post("transaction_numbers", user_id).await?;
        ok_body(response).await
    }

    pub async fn user_transactions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Transaction>, ClientError> {
        let response = self.post("user_transactions", user_id).await?;
        ok_body(response).await
    }
}

/// UPC registry
impl APIClient {
    pub async fn lookup_upc(
        &self,
        upc: &UpcCode,
    ) -> Result<Referable, ClientError> {
        let response = self
            .post("lookup_upc", &requests::LookupUpc { upc: upc.clone() })
            .await?;
        ok_body(response).await
    }

    pub async fn scan_upc(
        &self,
        upc: &UpcCode,
    ) -> Result<responses::ScanResult, ClientError> {
        let response = self
            .post("scan_upc", &requests::LookupUpc { upc: upc.clone() })
            .await?;
        ok_body(response).await
    }

    /// The code assigned to a member or product.
    pub async fn upc_for(
        &self,
        referable: &Referable,
    ) -> Result<UpcCode, ClientError> {
        let response = self.post("upc_for", referable).await?;
        ok_body(response).await
    }

    pub async fn user_upcs(&self) -> Result<Vec<UpcEntry>, ClientError> {
        let response = self.empty_get("user_upcs").await?;
        ok_body(response).await
    }

    pub async fn product_upcs(&self) -> Result<Vec<UpcEntry>, ClientError> {
        let response = self.empty_get("product_upcs").await?;
        ok_body(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
