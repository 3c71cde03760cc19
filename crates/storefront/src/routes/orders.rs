//! Checkout and order history.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use texos_core::db::PgStore;
use texos_core::models::{Order, OrderDetails};
use texos_core::services::OrderService;
use texos_core::{AddressId, OrderId, Page, PageRequest};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default, alias = "addressId")]
    pub address_id: Option<AddressId>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Snapshot the cart into a `pending` order. The cart is kept until the
/// payment is confirmed.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn checkout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    body: Option<Json<CheckoutRequest>>,
) -> Result<(StatusCode, Json<OrderDetails>)> {
    let Json(body) = body.unwrap_or_default();
    let details = OrderService::new(state.store())
        .checkout(user.id, body.address_id)
        .await?;
    Ok((StatusCode::CREATED, Json(details)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Page<Order>>> {
    let page = PageRequest::new(
        params.page,
        params.per_page,
        OrderService::<PgStore>::HISTORY_PER_PAGE,
    );
    Ok(Json(
        OrderService::new(state.store())
            .list_orders_for_user(user.id, page)
            .await?,
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(
        OrderService::new(state.store())
            .get_order_for_user(user.id, id)
            .await?,
    ))
}
