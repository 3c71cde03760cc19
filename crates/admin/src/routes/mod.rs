//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Health check
//! GET  /health/ready            - Readiness check (database)
//!
//! # Auth (email + password; accounts are created with texos-cli)
//! POST /auth/login
//! POST /auth/logout
//! GET  /auth/me
//!
//! # Orders
//! GET  /orders                  - Order listing, newest first
//! GET  /orders/statuses         - Status lookup table
//! GET  /orders/{id}             - Order detail with latest transaction
//! PUT  /orders/{id}/status      - Status override (write roles)
//! POST /orders/{id}/reconcile   - Re-verify payment with the gateway (write roles)
//!
//! # Settings
//! GET  /settings                - Settings and derived pricing
//! POST /settings                - Update delivery fee / threshold (write roles)
//! ```

pub mod auth;
pub mod orders;
pub mod settings;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Build the admin router (health routes are added in `main`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/orders", get(orders::index))
        .route("/orders/statuses", get(orders::statuses))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/orders/{id}/reconcile", post(orders::reconcile))
        .route("/settings", get(settings::show).post(settings::update))
}
