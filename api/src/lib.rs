pub mod routes;
pub mod store;
pub mod telemetry;
pub mod time;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use sqlx::SqlitePool;
use std::net::TcpListener;

use crate::store::StockAccounting;
use crate::time::TimeSource;

/// Build the server, but not await it.
///
/// The pool must already be migrated (see [`store::connect`]). Returns the
/// port that the server has bound to by modifying the config.
pub fn build(
    config: &mut Config,
    pool: SqlitePool,
    time_source: TimeSource,
) -> std::io::Result<Server> {
    let db_pool = web::Data::new(pool);
    let time_source = web::Data::new(time_source);
    let stock_accounting = web::Data::new(config.stock_accounting);

    let allowed_origins = config.allowed_origins.clone();

    // OS assigns the port if binding to 0
    let listener = TcpListener::bind(format!("{}:{}", config.ip, config.port))?;
    config.port = listener.local_addr()?.port();
    let server = HttpServer::new(move || {
        let cors = if allowed_origins.iter().any(|o| o == "*") {
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
        } else {
            allowed_origins.iter().fold(
                Cors::default().allow_any_method().allow_any_header(),
                |cors, origin| cors.allowed_origin(origin),
            )
        };

        App::new()
            .wrap(cors)
            .service(routes::api_services())
            .app_data(db_pool.clone())
            .app_data(time_source.clone())
            .app_data(stock_accounting.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}

#[derive(Debug, Clone)]
pub struct Config {
    /// e.g. `sqlite://strecka.db`; the file is created if missing
    pub database_url: String,
    /// set to "0.0.0.0" for public access, "127.0.0.1" for local dev
    pub ip: String,
    /// set to 0 to get an os-assigned port
    pub port: u16,
    /// Allowed CORS origins. "*" allows any origin (development only)
    pub allowed_origins: Vec<String>,
    pub stock_accounting: StockAccounting,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        use std::env::var;

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let stock_accounting = match var("STOCK_ACCOUNTING") {
            Ok(mode) => mode.parse()?,
            Err(_) => StockAccounting::default(),
        };

        Ok(Config {
            database_url: var("DATABASE_URL").context("DATABASE_URL")?,
            ip: var("IP_ADDRESS").unwrap_or_else(|_| "127.0.0.1".into()),
            port: var("PORT")
                .context("PORT")?
                .parse()
                .context("PORT must be a port number")?,
            allowed_origins,
            stock_accounting,
        })
    }
}
