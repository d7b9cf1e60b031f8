//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Token lifecycle
        .route(
            "/api/multisig/transactions",
            post(handlers::create_transaction),
        )
        .route(
            "/api/multisig/transactions/preview",
            post(handlers::preview_transaction),
        )
        .route("/api/multisig/sign", post(handlers::sign_transaction))
        .route("/api/multisig/send", post(handlers::send_transaction))
        .route(
            "/api/multisig/sign-and-send",
            post(handlers::sign_and_send_transaction),
        )
        .route("/api/multisig/decode", post(handlers::decode_transaction))
        // Multisig addresses
        .route(
            "/api/multisig/{identifier}/unspent",
            get(handlers::list_unspent),
        )
        .route("/api/multisig/{identifier}", get(handlers::resolve_multisig))
        .with_state(state)
        .layer(cors)
}
