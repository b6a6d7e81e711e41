use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use crate::payments::webhook::ReconcileAction;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /api/webhook
///
/// Verifies the delivery over the raw body, then applies the event to the
/// admin store. Once the signature checks out the response is always 200;
/// store failures are logged and left to the processor's redelivery.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let event = match state.verifier.construct_event(&body, signature) {
        Ok(event) => event,
        Err(e) => {
            error!("Webhook signature verification failed: {}", e);
            return (StatusCode::BAD_REQUEST, format!("Webhook Error: {}", e)).into_response();
        }
    };

    match event.reconcile_action(Utc::now()) {
        Ok(ReconcileAction::Update {
            payment_intent_id,
            update,
        }) => {
            match state
                .webhook_orders
                .apply_payment_update(&payment_intent_id, &update, state.terminal_status_policy)
                .await
            {
                Ok(0) => warn!(
                    event_type = %event.event_type,
                    payment_intent_id = %payment_intent_id,
                    "No order updated for payment intent"
                ),
                Ok(_) => info!(
                    event_type = %event.event_type,
                    payment_intent_id = %payment_intent_id,
                    status = %update.status,
                    "Order updated from webhook"
                ),
                Err(e) => error!(
                    event_type = %event.event_type,
                    payment_intent_id = %payment_intent_id,
                    retryable = e.is_retryable(),
                    "Failed to apply webhook update: {}",
                    e
                ),
            }
        }
        Ok(ReconcileAction::Ignore { event_type }) => {
            info!(event_type = %event_type, "Unhandled event type");
        }
        Err(e) => warn!(event_type = %event.event_type, "Malformed event: {}", e),
    }

    Json(json!({ "received": true })).into_response()
}

/// Non-POST requests get an empty 405.
pub async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}
