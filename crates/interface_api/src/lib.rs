//! HTTP API Layer
//!
//! This crate provides the REST API for the hospital ledger using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one thin handler per service operation
//! - **Middleware**: bearer-token authentication, request tracing, audit logging
//! - **DTOs**: validated request bodies
//! - **Error Handling**: `{ "error": <kind>, "message": <reason> }` bodies
//!
//! The router is store-agnostic: the binary wires the PostgreSQL adapters,
//! tests wire the in-memory stores.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(ledger_store, resource_store, config);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware as axum_middleware,
};
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use domain_billing::{AccountService, BalanceOptions, LedgerStore};
use domain_resources::{ResourceService, ResourceStore};

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware};
use crate::handlers::{accounts, receivables, resources, health};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub resources: ResourceService,
    pub ledger_store: Arc<dyn LedgerStore>,
    pub resource_store: Arc<dyn ResourceStore>,
    pub config: ApiConfig,
}

impl AppState {
    /// Builds the services over the given stores
    pub fn new(
        ledger_store: Arc<dyn LedgerStore>,
        resource_store: Arc<dyn ResourceStore>,
        config: ApiConfig,
    ) -> Self {
        let options = BalanceOptions {
            legacy_advance_fallback: config.legacy_advance_fallback,
        };
        Self {
            accounts: AccountService::new(ledger_store.clone()).with_options(options),
            resources: ResourceService::new(resource_store.clone()),
            ledger_store,
            resource_store,
            config,
        }
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let account_routes = Router::new()
        .route("/", post(accounts::open_account))
        .route("/:id", get(accounts::get_statement))
        .route("/:id/totals", get(accounts::get_totals))
        .route("/:id/entries", post(accounts::append_entry))
        .route("/:id/payments", post(accounts::record_payment))
        .route("/:id/close", post(accounts::close_account));

    let receivable_routes = Router::new()
        .route("/", get(receivables::list_outstanding))
        .route("/:id/payments", get(receivables::list_payments).post(receivables::record_payment));

    let resource_routes = Router::new()
        .route("/", post(resources::register_resource))
        .route("/:id/reserve", post(resources::reserve))
        .route("/:id/release", post(resources::release))
        .route("/:id/restock", post(resources::restock))
        .route("/:id/maintenance", put(resources::set_maintenance))
        .route("/:id/movements", get(resources::list_movements));

    // Protected API routes; auth runs first so the audit line carries the actor
    let api_routes = Router::new()
        .nest("/accounts", account_routes)
        .nest("/receivables", receivable_routes)
        .nest("/resources", resource_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
