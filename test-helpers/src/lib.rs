use payloads::{
    Prices, ProductId, UpcCode, UserId, requests, responses::PurchaseReceipt,
};
use reqwest::StatusCode;
use rust_decimal::dec;
use sqlx::SqlitePool;
use strecka_api::store::{self, StockAccounting};
use strecka_api::time::TimeSource;
use strecka_api::{Config, telemetry};
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

pub struct TestApp {
    #[allow(unused)]
    pub port: u16,
    pub db_pool: SqlitePool,
    pub client: payloads::APIClient,
    pub time_source: TimeSource,
}

/// Fixtures
impl TestApp {
    pub async fn create_alice_user(&self) -> anyhow::Result<UpcCode> {
        Ok(self.client.create_user(&alice_user()).await?)
    }

    pub async fn create_bob_user(&self) -> anyhow::Result<UpcCode> {
        Ok(self.client.create_user(&bob_user()).await?)
    }

    pub async fn create_cola(&self) -> anyhow::Result<ProductId> {
        Ok(self.client.create_product(&cola_product()).await?)
    }

    /// Record a purchase through the API.
    pub async fn strecka(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> anyhow::Result<PurchaseReceipt> {
        let details = requests::Strecka {
            user_id: user_id.clone(),
            product_id: *product_id,
            quantity,
        };
        Ok(self.client.strecka(&details).await?)
    }
}

pub fn alice_id() -> UserId {
    "1001".into()
}

pub fn bob_id() -> UserId {
    "1002".into()
}

pub fn alice_user() -> requests::CreateUser {
    requests::CreateUser {
        user_id: alice_id(),
        name: "Alice".into(),
    }
}

pub fn bob_user() -> requests::CreateUser {
    requests::CreateUser {
        user_id: bob_id(),
        name: "Bob".into(),
    }
}

/// Purchase 5, internal 8, external 10.
pub fn cola_prices() -> Prices {
    Prices {
        purchase_price: dec!(5),
        internal_price: dec!(8),
        external_price: dec!(10),
    }
}

pub fn cola_product() -> requests::CreateProduct {
    requests::CreateProduct {
        name: "Cola".into(),
        prices: cola_prices(),
    }
}

/// The instant every test clock starts at.
pub fn test_epoch() -> jiff::Timestamp {
    jiff::Timestamp::constant(1_735_689_600, 0)
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(StockAccounting::default()).await
}

/// Start the api on an os-assigned port with a fresh database file.
pub async fn spawn_app_with(stock_accounting: StockAccounting) -> TestApp {
    let subscriber = telemetry::get_subscriber("error".into());
    let _ = LogTracer::init();
    let _ = subscriber.try_init();

    #[cfg(any(feature = "mock-time", test))]
    let time_source = TimeSource::new(test_epoch());

    #[cfg(not(any(feature = "mock-time", test)))]
    let time_source = TimeSource::new();

    let db_path =
        std::env::temp_dir().join(format!("strecka-test-{}.db", Uuid::new_v4()));
    let mut config = Config {
        database_url: format!("sqlite://{}", db_path.display()),
        ip: "127.0.0.1".into(),
        port: 0,
        allowed_origins: vec!["*".to_string()],
        stock_accounting,
    };

    let db_pool = store::connect(&config.database_url).await.unwrap();
    let server =
        strecka_api::build(&mut config, db_pool.clone(), time_source.clone())
            .unwrap();
    tokio::spawn(server);

    TestApp {
        port: config.port,
        db_pool,
        client: payloads::APIClient {
            address: format!("http://127.0.0.1:{}", config.port),
            inner_client: reqwest::Client::new(),
        },
        time_source,
    }
}

/// Assert that the result of an API action results in a specific status code.
pub fn assert_status_code<T>(
    result: Result<T, payloads::ClientError>,
    expected: StatusCode,
) {
    match result {
        Err(payloads::ClientError::APIError(code, _)) => {
            assert_eq!(code, expected)
        }
        _ => panic!("Expected APIError"),
    };
}
