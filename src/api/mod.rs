pub mod cors;
pub mod health;
pub mod payment_intents;
pub mod payment_status;
pub mod webhook;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

async fn method_not_allowed() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

/// Build the HTTP surface.
pub fn router(state: AppState) -> Router {
    let checkout = Router::new()
        .route(
            "/api/create-payment-intent",
            post(payment_intents::create_payment_intent)
                .options(payment_intents::preflight)
                .fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            cors::checkout_cors,
        ));

    let open = Router::new()
        .route(
            "/api/update-payment-status",
            post(payment_status::update_payment_status)
                .options(payment_intents::preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/webhook",
            post(webhook::handle_webhook).fallback(webhook::method_not_allowed),
        )
        .layer(cors::open_cors());

    Router::new()
        .route("/health", get(health::health_check))
        .merge(checkout)
        .merge(open)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}
