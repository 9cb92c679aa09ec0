//! # Stockroom Node
//!
//! Fulfillment service and HTTP API for the Stockroom order pipeline.

use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod api;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod seed;
pub mod state;

pub use config::{ConfigError, NodeConfig};
pub use engine::{Collaborators, Fulfillment, OrderListing, OrderView, PickingStarted, ScanResult};
pub use seed::SeedFile;
pub use state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))

        // Orders
        .route(
            "/api/v1/orders",
            get(api::orders::list_orders).post(api::orders::create_order),
        )
        .route(
            "/api/v1/orders/:id",
            get(api::orders::get_order).delete(api::orders::delete_order),
        )
        .route("/api/v1/orders/:id/cancel", post(api::orders::cancel_order))
        .route("/api/v1/orders/:id/refund", post(api::orders::refund_order))

        // Picking
        .route(
            "/api/v1/orders/:id/picking",
            post(api::picking::start_picking)
                .get(api::picking::get_session)
                .delete(api::picking::abandon),
        )
        .route("/api/v1/orders/:id/picking/scan", post(api::picking::scan))
        .route("/api/v1/orders/:id/picking/verify", post(api::picking::verify))
        .route("/api/v1/orders/:id/picking/finalize", post(api::picking::finalize))

        // Packing and shipping
        .route("/api/v1/orders/:id/pack", post(api::shipping::finalize_pack))
        .route("/api/v1/orders/:id/ship", post(api::shipping::mark_shipped))
        .route(
            "/api/v1/orders/:id/shipping-status",
            put(api::shipping::update_shipping_status),
        )
        .route("/api/v1/orders/:id/tracking", put(api::shipping::update_tracking))
        .route("/api/v1/orders/:id/eta", put(api::shipping::update_estimated_delivery))

        // Dashboard
        .route("/api/v1/dashboard/delays", get(api::dashboard::delay_summary))

        // Public tracking
        .route("/api/v1/track/:code", get(api::track::track_order))

        // WebSocket endpoints
        .route("/ws/orders", get(api::ws::order_stream))

        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, create_router(state)).await
}

/// Build the node from `config` and run it until the process stops.
pub async fn run_server(config: NodeConfig) -> anyhow::Result<()> {
    info!("🚀 Stockroom node starting...");

    let state = AppState::new(&config);

    if let Some(path) = &config.seed_file {
        SeedFile::load(path)?.apply(&state).await;
    }

    let listener = TcpListener::bind(config.addr).await?;
    info!("🌐 Listening on http://{}", config.addr);

    serve(listener, state).await?;
    Ok(())
}
