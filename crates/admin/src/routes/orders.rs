//! Order management routes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use texos_core::db::PgStore;
use texos_core::models::{AdminOrderView, Order, OrderStatusRow};
use texos_core::services::{OrderService, PaymentService, PaymentSignal, ReconcileOutcome};
use texos_core::{OrderId, OrderStatus, Page, PageRequest};

use crate::error::{AppError, Result};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// All orders, newest first.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(params): Query<OrderListParams>,
) -> Result<Json<Page<Order>>> {
    let page = PageRequest::new(
        params.page,
        params.per_page,
        OrderService::<PgStore>::ADMIN_PER_PAGE,
    );
    Ok(Json(
        OrderService::new(state.store()).list_all_orders(page).await?,
    ))
}

/// The order status lookup table.
pub async fn statuses(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderStatusRow>>> {
    Ok(Json(OrderService::new(state.store()).order_statuses().await?))
}

/// Order with line items, address and latest payment attempt.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<AdminOrderView>> {
    Ok(Json(OrderService::new(state.store()).order_details(id).await?))
}

/// Manual status override along the order state machine.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update_status(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.store())
        .set_status(id, body.status)
        .await?;
    tracing::info!(order_id = %order.id, status = %order.status, "Order status set by admin");
    Ok(Json(order))
}

/// Re-run payment reconciliation against the gateway for the order's
/// latest payment attempt.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn reconcile(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<ReconcileOutcome>> {
    let view = OrderService::new(state.store()).order_details(id).await?;
    let transaction = view
        .transaction
        .ok_or_else(|| AppError::BadRequest("Order has no payment attempt".to_owned()))?;

    let signal = PaymentSignal::admin(transaction.reference, id);
    let task_state = state.clone();
    let outcome = tokio::spawn(async move {
        PaymentService::new(task_state.store(), task_state.gateway())
            .reconcile(&signal)
            .await
    })
    .await
    .map_err(|e| AppError::Internal(format!("reconciliation task failed: {e}")))??;

    tracing::info!(order_id = %id, outcome = ?outcome, "Manual reconciliation finished");
    Ok(Json(outcome))
}
