//! Payment initialization, buyer verification and the gateway webhook.
//!
//! Verification and webhook handling run in a spawned task that the handler
//! awaits, so a client disconnecting mid-request cannot abandon a
//! reconciliation halfway through.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use texos_core::gateway::InitializedPayment;
use texos_core::models::Order;
use texos_core::services::{
    Buyer, OrderService, PaymentService, PaymentSignal, ReconcileOutcome, WebhookOutcome,
};
use texos_core::webhook::{SIGNATURE_HEADER, WebhookEvent, verify_signature};
use texos_core::{OrderId, OrderStatus, ShopResult};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    #[serde(alias = "orderId")]
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(alias = "orderId")]
    pub order_id: OrderId,
}

/// Buyer-facing result of a verification.
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyResponse {
    Success { order: Order },
    Failed { message: String, order: Order },
    Pending { message: String },
    Unknown { message: String },
}

impl VerifyResponse {
    fn from_outcome(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Paid { order, .. } => Self::Success { order },
            ReconcileOutcome::AlreadySettled { order } => match order.status {
                OrderStatus::Pending => Self::Pending {
                    message: "Payment is still being processed".to_owned(),
                },
                OrderStatus::Cancelled => Self::failed(order),
                _ => Self::Success { order },
            },
            ReconcileOutcome::Cancelled { order } | ReconcileOutcome::Reversed { order } => {
                Self::failed(order)
            }
            ReconcileOutcome::Pending => Self::Pending {
                message: "Payment is still being processed".to_owned(),
            },
            // Money moved but the order could not follow; staff resolve it.
            ReconcileOutcome::NeedsAttention { .. } => Self::Pending {
                message: "Payment received and under review".to_owned(),
            },
            ReconcileOutcome::VerificationUnavailable => Self::Unknown {
                message: "Payment could not be verified right now. Please try again shortly"
                    .to_owned(),
            },
        }
    }

    fn failed(order: Order) -> Self {
        Self::Failed {
            message: "Payment was not successful".to_owned(),
            order,
        }
    }

    const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unknown { .. } => StatusCode::ACCEPTED,
            _ => StatusCode::OK,
        }
    }
}

/// Start a payment for a pending order. The amount is taken from the order.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn initialize(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<InitializeRequest>,
) -> Result<Json<InitializedPayment>> {
    let buyer = Buyer {
        id: user.id,
        email: user.email,
    };
    let payment = PaymentService::new(state.store(), state.gateway())
        .initialize_payment(&buyer, body.order_id)
        .await?;
    Ok(Json(payment))
}

/// Confirm a payment after the buyer returns from the gateway.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn verify(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(params): Query<VerifyParams>,
) -> Result<(StatusCode, Json<VerifyResponse>)> {
    // Only the buyer's own orders may be reconciled from here.
    OrderService::new(state.store())
        .get_order_for_user(user.id, params.order_id)
        .await?;

    let signal = PaymentSignal::poll(reference, params.order_id, &user.email);
    let outcome = run_detached(state, move |state| async move {
        PaymentService::new(state.store(), state.gateway())
            .reconcile(&signal)
            .await
    })
    .await??;

    let response = VerifyResponse::from_outcome(outcome);
    Ok((response.status_code(), Json(response)))
}

/// Gateway webhook.
///
/// Only signature and body problems are reported back; once an event is
/// authentic it is acknowledged so the gateway does not keep retrying, and
/// processing failures are left in the logs for staff.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    verify_signature(
        state.webhook_secret().expose_secret().as_bytes(),
        &body,
        signature,
    )?;
    let event = WebhookEvent::parse(&body)?;
    let event_name = event.event.clone();

    let result = run_detached(state, move |state| async move {
        PaymentService::new(state.store(), state.gateway())
            .apply_webhook(&event)
            .await
    })
    .await;

    match result {
        Ok(Ok(outcome)) => log_webhook_outcome(&event_name, &outcome),
        Ok(Err(e)) => tracing::error!(
            event = %event_name,
            error = %e,
            "Webhook processing failed; manual reconciliation required"
        ),
        Err(e) => tracing::error!(
            event = %event_name,
            error = %e,
            "Webhook task failed; manual reconciliation required"
        ),
    }

    Ok(Json(json!({ "received": true })))
}

fn log_webhook_outcome(event: &str, outcome: &WebhookOutcome) {
    match outcome {
        WebhookOutcome::Reconciled(ReconcileOutcome::NeedsAttention { order, reason }) => {
            tracing::error!(event, order_id = %order.id, reason, "Webhook needs manual attention");
        }
        WebhookOutcome::Reconciled(inner) => {
            tracing::info!(event, outcome = ?inner, "Webhook reconciled");
        }
        WebhookOutcome::StatusChanged { order } => {
            tracing::info!(event, order_id = %order.id, status = %order.status, "Webhook changed order status");
        }
        WebhookOutcome::Unchanged { order } => {
            tracing::info!(event, order_id = %order.id, "Webhook left order unchanged");
        }
        WebhookOutcome::Ignored { .. } => {
            tracing::debug!(event, "Webhook ignored");
        }
    }
}

/// Run payment work on its own task and wait for it.
async fn run_detached<T, F, Fut>(state: AppState, work: F) -> Result<ShopResult<T>>
where
    T: Send + 'static,
    F: FnOnce(AppState) -> Fut + Send + 'static,
    Fut: Future<Output = ShopResult<T>> + Send + 'static,
{
    tokio::spawn(work(state))
        .await
        .map_err(|e| AppError::Internal(format!("payment task failed: {e}")))
}
