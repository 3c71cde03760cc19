//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Health check
//! GET  /health/ready                - Readiness check (database)
//!
//! # Catalog
//! GET  /products                    - Search, filter, sort, paginate
//! GET  /products/{id}               - Product detail
//! GET  /categories                  - Category list
//! GET  /settings/delivery           - Delivery fee and free-delivery threshold
//!
//! # Cart (requires auth)
//! GET    /cart                      - Cart with line totals
//! POST   /cart                      - Add item
//! DELETE /cart                      - Empty the cart
//! PUT    /cart/{product_id}         - Set quantity
//! DELETE /cart/{product_id}         - Remove item
//! POST   /cart/merge                - Fold a guest cart in
//!
//! # Orders (requires auth)
//! POST /orders/checkout             - Snapshot cart into a pending order
//! GET  /orders                      - Order history
//! GET  /orders/{id}                 - Order detail
//!
//! # Payments
//! POST /payments/initialize         - Start a gateway payment (auth)
//! GET  /payments/verify/{reference} - Confirm after redirect (auth)
//! POST /payments/webhook            - Signed gateway events
//!
//! # Addresses (requires auth)
//! GET|POST       /addresses
//! GET|PUT|DELETE /addresses/{id}
//! PUT            /addresses/{id}/default
//!
//! # Auth
//! POST /auth/register/otp           - Validate and email a code
//! POST /auth/register/verify        - Create the account
//! POST /auth/login
//! POST /auth/logout
//! GET  /auth/me
//! PUT  /auth/profile                - Update own profile (auth)
//! POST /auth/change-password        - Requires the current password (auth)
//! POST /auth/forgot-password        - Email a reset code
//! POST /auth/verify-reset-otp       - Trade the code for a reset token
//! POST /auth/reset-password         - Spend the token
//! ```

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod payments;
pub mod products;
pub mod settings;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register/otp", post(auth::request_otp))
        .route("/register/verify", post(auth::verify_otp))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/change-password", post(auth::change_password))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/verify-reset-otp", post(auth::verify_reset_otp))
        .route("/reset-password", post(auth::reset_password))
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(cart::show).post(cart::add).delete(cart::clear),
        )
        .route("/merge", post(cart::merge))
        .route("/{product_id}", put(cart::update).delete(cart::remove))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/checkout", post(orders::checkout))
        .route("/{id}", get(orders::show))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(payments::initialize))
        .route("/verify/{reference}", get(payments::verify))
        .route("/webhook", post(payments::webhook))
}

pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route(
            "/{id}",
            get(addresses::show)
                .put(addresses::update)
                .delete(addresses::delete),
        )
        .route("/{id}/default", put(addresses::set_default))
}

/// Build the complete storefront router (health routes are added in `main`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(products::categories))
        .route("/settings/delivery", get(settings::delivery))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/payments", payment_routes())
        .nest("/addresses", address_routes())
        .nest("/auth", auth_routes())
}
