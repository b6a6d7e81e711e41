use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::database::brand_store::BrandCredentials;
use crate::error::{AppError, AppResult};
use crate::models::{BrandOrderUpdate, PaymentUpdate};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusRequest {
    pub brand: Option<String>,
    pub order_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub status: Option<String>,
    pub brand_database_url: Option<String>,
    pub brand_database_key: Option<String>,
}

/// Outcome of one best-effort store write
#[derive(Debug, Clone, PartialEq)]
pub enum SubUpdate {
    /// Not attempted.
    Skipped,
    /// The store accepted the write; `rows` is what it reported touching.
    Applied { rows: u64 },
    Failed { reason: String },
}

impl SubUpdate {
    pub fn attempted(&self) -> bool {
        !matches!(self, SubUpdate::Skipped)
    }

    pub fn raised(&self) -> bool {
        matches!(self, SubUpdate::Failed { .. })
    }

    pub fn confirmed(&self) -> bool {
        matches!(self, SubUpdate::Applied { rows } if *rows > 0)
    }
}

/// `adminUpdated` means "no error was raised" and `brandUpdated` means "a brand
/// URL was supplied"; neither confirms a row changed. The `*Confirmed` fields do.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusResponse {
    pub success: bool,
    pub admin_updated: bool,
    pub brand_updated: bool,
    pub admin_confirmed: bool,
    pub brand_attempted: bool,
    pub brand_confirmed: bool,
}

impl UpdatePaymentStatusResponse {
    fn summarize(admin: &SubUpdate, brand: &SubUpdate, brand_url_supplied: bool) -> Self {
        Self {
            success: true,
            admin_updated: !admin.raised(),
            brand_updated: brand_url_supplied,
            admin_confirmed: admin.confirmed(),
            brand_attempted: brand.attempted(),
            brand_confirmed: brand.confirmed(),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// POST /api/update-payment-status
///
/// Applies a caller-reported status to the admin order and, when brand store
/// credentials are supplied, mirrors it into that brand's store. The status is
/// passed through as given. Both writes are best effort: failures are logged
/// and reported in the response, never turned into an error status.
pub async fn update_payment_status(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePaymentStatusRequest>, JsonRejection>,
) -> AppResult<Json<UpdatePaymentStatusResponse>> {
    let Json(request) = payload.map_err(|e| {
        error!("Update payment status error: {}", e);
        AppError::internal(e.body_text())
    })?;

    // A missing intent id matches no order.
    let payment_intent_id = request.payment_intent_id.unwrap_or_default();
    let status = request.status.unwrap_or_default();
    let now = Utc::now();

    let admin = match state
        .orders
        .apply_payment_update(
            &payment_intent_id,
            &PaymentUpdate::manual(&status, now),
            state.terminal_status_policy,
        )
        .await
    {
        Ok(rows) => SubUpdate::Applied { rows },
        Err(e) => SubUpdate::Failed {
            reason: e.to_string(),
        },
    };

    match &admin {
        SubUpdate::Failed { reason } => {
            error!(payment_intent_id = %payment_intent_id, "Admin DB update error: {}", reason)
        }
        SubUpdate::Applied { rows: 0 } => warn!(
            payment_intent_id = %payment_intent_id,
            "Admin DB update matched no order"
        ),
        _ => {}
    }

    let brand_url = present(request.brand_database_url);
    let brand_url_supplied = brand_url.is_some();
    let brand = match (brand_url, present(request.brand_database_key)) {
        (Some(url), Some(key)) => {
            let credentials = BrandCredentials { url, key };
            let update = BrandOrderUpdate::new(&status, &payment_intent_id, now);
            update_brand_order(&state, &credentials, request.order_id.as_deref(), &update).await
        }
        _ => SubUpdate::Skipped,
    };

    if let SubUpdate::Failed { reason } = &brand {
        error!(
            brand = ?request.brand,
            order_id = ?request.order_id,
            "Brand DB update error: {}",
            reason
        );
    }

    info!(
        payment_intent_id = %payment_intent_id,
        status = %status,
        admin = ?admin,
        brand = ?brand,
        "Payment status reported"
    );

    Ok(Json(UpdatePaymentStatusResponse::summarize(
        &admin,
        &brand,
        brand_url_supplied,
    )))
}

async fn update_brand_order(
    state: &AppState,
    credentials: &BrandCredentials,
    order_id: Option<&str>,
    update: &BrandOrderUpdate,
) -> SubUpdate {
    let Some(order_id) = order_id.filter(|id| !id.trim().is_empty()) else {
        return SubUpdate::Failed {
            reason: "orderId is required to update the brand store".to_string(),
        };
    };

    let result: AppResult<u64> = async {
        let store = state.brand_stores.connect(credentials)?;
        store.update_order(order_id, update).await
    }
    .await;

    match result {
        Ok(rows) => SubUpdate::Applied { rows },
        Err(e) => SubUpdate::Failed {
            reason: e.to_string(),
        },
    }
}
