#[macro_use]
extern crate tracing;

use std::{process, sync::Arc};

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method, header},
};
use axum_extra::middleware::option_layer;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

mod api;
mod auth;
mod belvo;
mod config;
mod db;
mod error;
mod middleware;
mod trace;

pub use error::Error;

use auth::AuthManager;
use belvo::BelvoClient;
use crate::config::Config;

pub type DbPool = deadpool_diesel::sqlite::Pool;
pub type DbConn = deadpool_diesel::sqlite::Object;

#[derive(FromRef, Clone)]
pub struct AppState {
    pub auth: Arc<AuthManager>,
    pub belvo: Arc<BelvoClient>,
}

#[tokio::main]
async fn main() {
    launch_info();
    dotenv().ok();

    let config = match config::load() {
        Ok(config) => config,
        Err(err) => fail(err),
    };
    if let Err(err) = trace::init(&config.log) {
        fail(err);
    }
    debug!("{:#?}", config);

    if let Err(err) = db::run_migrations(&config.database_url) {
        fail(format!("failed to run migrations: {err}"));
    }
    let pool = match init_dbpool(&config) {
        Ok(pool) => pool,
        Err(err) => fail(err),
    };
    let auth = match AuthManager::new(&config.auth, pool) {
        Ok(auth) => auth,
        Err(err) => fail(err),
    };
    let belvo = match BelvoClient::new(&config.belvo) {
        Ok(belvo) => belvo,
        Err(err) => fail(err),
    };
    let state = AppState {
        auth: Arc::new(auth),
        belvo: Arc::new(belvo),
    };

    let layer = ServiceBuilder::new()
        .layer(middleware::TraceLayer)
        .layer(option_layer(cors_layer(&config)));
    let app: Router = api::routes(state).layer(layer);

    let listener = match TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(err) => fail(format!("failed to bind {}: {err}", config.addr)),
    };
    info!("listening on http://{}", config.addr);
    if let Err(err) = axum::serve(listener, app).await {
        error!("server error: {}", err);
    }
}

fn cors_layer(config: &Config) -> Option<CorsLayer> {
    if config.debug {
        return Some(
            CorsLayer::new()
                .allow_headers(Any)
                .allow_methods(Any)
                .allow_origin(Any),
        );
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid cors origin {}", origin);
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]),
    )
}

fn init_dbpool(config: &Config) -> Result<DbPool, String> {
    let manager = deadpool_diesel::sqlite::Manager::new(
        config.database_url.as_str(),
        deadpool_diesel::Runtime::Tokio1,
    );
    deadpool_diesel::sqlite::Pool::builder(manager)
        .build()
        .map_err(|err| format!("failed to build database pool: {err}"))
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("fatal: {err}");
    process::exit(1);
}

fn launch_info() {
    println!();
    println!(
        "=================== Starting finauth {} ===================",
        env!("CARGO_PKG_VERSION")
    );
    println!();
}
