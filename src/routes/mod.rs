// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Main router assembly and middleware
// - health.rs: Liveness, health check and metrics endpoints
// - users.rs: Account, profile and saved-contracts endpoints
// - contracts.rs: Search, details, comments and debug endpoints
// - extractors.rs: Custom Axum extractors (JWT bearer auth)
// - middleware.rs: Request logging, security headers
//
// ============================================================================

mod contracts;
mod extractors;
mod health;
mod middleware;
mod users;

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, services::ServeDir, trace::TraceLayer};

use crate::context::AppContext;

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    // The API is consumed by a separately hosted frontend; allow any origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        // Health and monitoring
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Accounts
        .route("/api/users/register", post(users::register))
        .route("/api/users/login", post(users::login))
        .route(
            "/api/users/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/api/users/saved-contracts", get(users::get_saved_contracts))
        .route(
            "/api/users/save-contract/:contract_id",
            post(users::save_contract).delete(users::remove_saved_contract),
        )
        // Contracts
        .route("/api/contracts/search", get(contracts::search))
        .route(
            "/api/contracts/search/contratos",
            get(contracts::search_contratos),
        )
        .route(
            "/api/contracts/search/contratacoes",
            get(contracts::search_contratacoes),
        )
        .route("/api/contracts/details/:contract_id", get(contracts::details))
        // POST takes a contract pncp id, DELETE a comment id; one pattern
        // because the router cannot hold both spellings of the segment
        .route(
            "/api/contracts/comment/:id",
            post(contracts::add_comment).delete(contracts::delete_comment),
        )
        .route(
            "/api/contracts/comments/:contract_id",
            get(contracts::get_comments),
        )
        .route("/api/contracts/debug", get(contracts::debug))
        // Anything else is served from the bundled frontend directory
        .fallback_service(ServeDir::new(&app_context.config.static_dir))
        // Apply middleware (order matters - last added runs first)
        .layer(
            ServiceBuilder::new()
                // Tracing layer (outermost - runs first)
                .layer(TraceLayer::new_for_http())
                // Request logging
                .layer(axum::middleware::from_fn(
                    crate::routes::middleware::request_logging,
                ))
                // Security headers
                .layer(axum::middleware::from_fn(
                    crate::routes::middleware::add_security_headers,
                ))
                .layer(cors)
                .into_inner(),
        )
        .with_state(app_context)
}
