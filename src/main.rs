mod auth;
mod availability;
mod config;
mod identity;
mod middleware;

mod db;
mod error;
mod models;
mod routes;

use std::sync::Arc;

use crate::{
    auth::{AdminCredential, TokenIssuer},
    config::Config,
    db::{ClinicStore, MemoryStore, PgStore},
    models::AppState,
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;

    let store: Arc<dyn ClinicStore> = match cfg.database_url.as_deref() {
        Some(url) => {
            let pool = db::connect_pg(url, cfg.database_max_connections).await?;
            tracing::info!("Using PostgreSQL store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data is kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState {
        store,
        tokens: TokenIssuer::new(cfg.session_ttl_hours),
        admin: AdminCredential::from_config(&cfg),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
