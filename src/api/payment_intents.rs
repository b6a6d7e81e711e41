use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::NewOrder;
use crate::payments::types::CreatePaymentIntent;
use crate::state::AppState;

const DEFAULT_CURRENCY: &str = "cad";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    pub order_id: Option<String>,
    pub order_number: Option<String>,
    pub brand: Option<String>,
    pub product: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub success: bool,
    pub client_secret: String,
    pub payment_intent_id: String,
    pub admin_order_id: Uuid,
}

/// Validated form of [`CreatePaymentIntentRequest`]
#[derive(Debug, Clone, PartialEq)]
struct CheckoutOrder {
    order: NewOrder,
}

impl CheckoutOrder {
    fn description(&self) -> String {
        let reference = self
            .order
            .order_number
            .as_deref()
            .unwrap_or(&self.order.brand_order_id);
        format!("{} - Order {}", self.order.brand, reference)
    }

    fn intent_request(&self, admin_order_id: Uuid) -> CreatePaymentIntent {
        let mut metadata = BTreeMap::new();
        metadata.insert("brand".to_string(), self.order.brand.clone());
        if let Some(number) = &self.order.order_number {
            metadata.insert("order_number".to_string(), number.clone());
        }
        metadata.insert(
            "brand_order_id".to_string(),
            self.order.brand_order_id.clone(),
        );
        metadata.insert("admin_order_id".to_string(), admin_order_id.to_string());

        CreatePaymentIntent {
            amount: self.order.amount,
            currency: self.order.currency.clone(),
            description: self.description(),
            receipt_email: Some(self.order.customer_email.clone()),
            metadata,
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CreatePaymentIntentRequest {
    fn validate(self) -> AppResult<CheckoutOrder> {
        let missing = || AppError::validation("Missing required fields");

        let brand_order_id = present(self.order_id).ok_or_else(missing)?;
        let brand = present(self.brand).ok_or_else(missing)?;
        let amount = self.amount.filter(|a| *a != 0).ok_or_else(missing)?;
        let customer_email = present(self.customer_email).ok_or_else(missing)?;

        if amount < 0 {
            return Err(AppError::validation("Amount must be positive"));
        }

        Ok(CheckoutOrder {
            order: NewOrder {
                brand,
                brand_order_id,
                order_number: present(self.order_number),
                product: present(self.product),
                amount,
                currency: present(self.currency)
                    .map(|c| c.to_ascii_lowercase())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                customer_email,
                customer_name: present(self.customer_name),
            },
        })
    }
}

/// POST /api/create-payment-intent
///
/// Records a pending order, creates the processor intent, links the two and
/// hands the client secret back to the checkout frontend.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    payload: Result<Json<CreatePaymentIntentRequest>, JsonRejection>,
) -> AppResult<Json<CreatePaymentIntentResponse>> {
    let Json(request) = payload.map_err(|e| {
        warn!("Rejected payment intent request body: {}", e);
        AppError::validation("Missing required fields")
    })?;
    let checkout = request.validate()?;

    // The row must exist first: the intent metadata carries its id.
    let order = state
        .orders
        .insert_pending(&checkout.order)
        .await
        .map_err(|e| {
            error!(brand = %checkout.order.brand, "Database error: {}", e);
            AppError::persistence("Failed to create payment record", e)
        })?;

    let intent = state
        .processor
        .create_payment_intent(checkout.intent_request(order.id))
        .await
        .map_err(|e| {
            error!(admin_order_id = %order.id, "Payment intent creation error: {}", e);
            e
        })?;

    match state
        .orders
        .attach_payment_intent(order.id, &intent.id)
        .await
    {
        Ok(0) => warn!(
            admin_order_id = %order.id,
            payment_intent_id = %intent.id,
            "Order vanished before the payment intent could be attached"
        ),
        Ok(_) => {}
        Err(e) => error!(
            admin_order_id = %order.id,
            payment_intent_id = %intent.id,
            "Failed to attach payment intent: {}",
            e
        ),
    }

    info!(
        admin_order_id = %order.id,
        payment_intent_id = %intent.id,
        brand = %checkout.order.brand,
        "Payment intent created"
    );

    Ok(Json(CreatePaymentIntentResponse {
        success: true,
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        admin_order_id: order.id,
    }))
}

/// OPTIONS /api/create-payment-intent
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
