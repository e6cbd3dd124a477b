use anyhow::Context;
use strecka_api::{
    Config, build, store,
    telemetry::{get_subscriber, init_subscriber, log_error},
    time::TimeSource,
};

/// Strecka ledger API server
///
/// Environment variables can be set directly or loaded from a .env file in
/// the project root.
///
/// - DATABASE_URL: SQLite database, e.g. sqlite://strecka.db
/// - IP_ADDRESS: bind address (optional, defaults to 127.0.0.1)
/// - PORT: server port
/// - ALLOWED_ORIGINS: CORS origins, "*" or a comma-separated list
/// - STOCK_ACCOUNTING: "gross" (default) or "net"
/// - RUST_LOG: log filter (optional, defaults to info)
///
/// Example development command:
/// DATABASE_URL=sqlite://strecka.db PORT=8000 cargo run
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // silently ignored if there is no .env file
    let _ = dotenvy::dotenv();

    let subscriber = get_subscriber("info".into());
    init_subscriber(subscriber)?;

    let mut config = Config::from_env()?;

    // refuses to start on a failed migration
    let pool = store::connect(&config.database_url)
        .await
        .context("failed to open the database")?;

    #[cfg(not(feature = "mock-time"))]
    let time_source = TimeSource::new();
    #[cfg(feature = "mock-time")]
    let time_source = TimeSource::new(jiff::Timestamp::now());

    let server = build(&mut config, pool.clone(), time_source)?;
    tracing::info!(ip = %config.ip, port = config.port, "listening");
    let result = server.await.context("server error");
    if let Err(e) = &result {
        log_error(e);
    }
    store::close(&pool).await;
    result
}
