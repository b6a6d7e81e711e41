use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.orders.ping().await.is_ok();

    Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.clone(),
        database,
    })
}
