mod config;
mod middleware;

mod db;
mod error;
mod models;
mod routes;
mod schedule;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::FixedOffset;

use crate::{
    config::Config,
    models::AppState,
    schedule::{
        audit::PgAuditSink, clock::Clock, service::RecordLifecycleService, store::PgRecordStore,
    },
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
    let pool = db::connect_pg(&cfg).await?;

    let offset = FixedOffset::east_opt(cfg.clinic_utc_offset_minutes * 60)
        .context("CLINIC_UTC_OFFSET_MINUTES out of range")?;
    let records = RecordLifecycleService::new(
        Arc::new(PgRecordStore::new(pool.clone())),
        Arc::new(PgAuditSink::new(pool.clone())),
        Clock::system(offset),
        Duration::from_millis(cfg.db_timeout_ms),
    );

    let state = AppState {
        db: pool,
        records: Arc::new(records),
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
