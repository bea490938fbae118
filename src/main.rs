// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trend_data::application::trend_service::TrendService;
use trend_data::infrastructure::config::load_config;
use trend_data::infrastructure::trend_store::TrendStore;
use trend_data::presentation::app_state::AppState;
use trend_data::presentation::handlers::{
    asset_trends, current_raw_scan, downtime, downtime_by_channel,
    downtime_by_param_standard_type, health_check, latest_trend_data, time_series_points,
    time_series_rows, trend_data, trend_data_by_address,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_config()?;

    // Create repository (infrastructure layer)
    let store = TrendStore::from_settings(&config.store);
    tracing::info!(
        dialect = store.dialect_name(),
        host = %config.store.host,
        measurement = %config.store.measurement,
        "trend store configured"
    );

    // Create services (application layer)
    let trend_service = TrendService::new(Arc::new(store), config.store.page_size);
    let state = Arc::new(AppState { trend_service });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/assets/:id/trends", get(trend_data))
        .route("/assets/:id/trends/by-address", get(trend_data_by_address))
        .route("/assets/:id/trends/latest", get(latest_trend_data))
        .route("/assets/:id/scan", get(current_raw_scan))
        .route("/assets/:id/downtime", get(downtime))
        .route("/assets/:id/trend-summaries", post(asset_trends))
        .route("/time-series/points", post(time_series_points))
        .route("/time-series/rows", post(time_series_rows))
        .route(
            "/downtime/param-standard-types",
            post(downtime_by_param_standard_type),
        )
        .route("/downtime/channels", post(downtime_by_channel))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.listen_addr.parse()?;
    tracing::info!(%addr, "starting trend-data service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
