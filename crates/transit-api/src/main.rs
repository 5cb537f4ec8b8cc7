//! Transit API - host service for embedded map pages.
//!
//! Serves the normalized route collection and directions over HTTP, and hosts
//! map pages over WebSocket: each socket is one mounted page with its own
//! readiness gate, command channel and host state.

mod handlers;
mod socket;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use common::coords::Normalizer;
use common::location::FixedLocationProvider;
use common::routing::{Profile, RoutingClient};
use common::store::RouteStore;
use common::{telemetry, Config};
use map_bridge::RetryPolicy;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

pub(crate) struct AppState {
    pub routes: RouteStore,
    pub routing: RoutingClient,
    pub profile: Profile,
    pub location: FixedLocationProvider,
    pub normalizer: Normalizer,
    pub retry: RetryPolicy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let loaded = Config::from_env();
    let log_level = loaded.as_ref().map(|c| c.log_level.as_str()).unwrap_or("info");
    telemetry::init_tracing("transit-api", log_level);

    let config = loaded.unwrap_or_else(|e| {
        warn!("Failed to load config: {}. Using defaults.", e);
        Config::default()
    });

    // Ambiguous stored pairs are read relative to the service area.
    let normalizer = Normalizer::near(config.default_position());

    let routes = match RouteStore::load_from_file(&config.routes_path, &normalizer).await {
        Ok(store) => store,
        Err(e) => {
            error!("❌ Failed to load routes: {}", e);
            RouteStore::default()
        }
    };

    let profile = config.routing_profile.parse().unwrap_or_else(|e| {
        warn!("{}. Falling back to {}", e, Profile::DrivingCar);
        Profile::DrivingCar
    });

    let state = Arc::new(AppState {
        routes,
        routing: RoutingClient::from_config(&config).context("Failed to build routing client")?,
        profile,
        location: FixedLocationProvider::new(config.default_position()),
        normalizer,
        retry: RetryPolicy::from_config(&config),
    });

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/routes", get(handlers::list_routes))
        .route("/routes/:id", get(handlers::get_route))
        .route("/admin/routes", post(handlers::save_route))
        .route("/directions", get(handlers::directions))
        .route("/ws", get(socket::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive());

    info!("🚀 API listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    warn!("Received shutdown signal");
}
