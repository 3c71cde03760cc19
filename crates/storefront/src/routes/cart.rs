//! Cart route handlers.
//!
//! Every route needs a logged-in buyer; guest carts stay in the browser
//! until `POST /cart/merge` (or login) folds them in.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use texos_core::ProductId;
use texos_core::models::{CartItem, CartView, GuestCartLine, MergeReport};
use texos_core::services::CartService;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    #[serde(default)]
    pub items: Vec<GuestCartLine>,
}

#[derive(Debug, Serialize)]
pub struct MergeResponse {
    #[serde(flatten)]
    pub report: MergeReport,
    pub cart: CartView,
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.store()).view(user.id).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItem>)> {
    let carts = CartService::new(state.store());
    let cart = carts.get_or_create_cart(user.id).await?;
    let item = carts.add_item(cart.id, body.product_id, body.quantity).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartItem>> {
    let carts = CartService::new(state.store());
    let cart = carts.get_or_create_cart(user.id).await?;
    Ok(Json(
        carts.update_item(cart.id, product_id, body.quantity).await?,
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let carts = CartService::new(state.store());
    let cart = carts.get_or_create_cart(user.id).await?;
    carts.remove_item(cart.id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let carts = CartService::new(state.store());
    let cart = carts.get_or_create_cart(user.id).await?;
    carts.clear(cart.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, lines = body.items.len()))]
pub async fn merge(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<MergeRequest>,
) -> Result<Json<MergeResponse>> {
    let carts = CartService::new(state.store());
    let report = carts.merge_guest_cart(user.id, &body.items).await?;
    let cart = carts.view(user.id).await?;
    Ok(Json(MergeResponse { report, cart }))
}
