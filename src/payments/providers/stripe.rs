//! Stripe payment processor implementation
//!
//! Talks to the Stripe REST API directly: form-encoded requests, bearer
//! authentication with the secret key, JSON responses.

use crate::error::{AppError, AppResult};
use crate::payments::traits::PaymentProcessor;
use crate::payments::types::{CreatePaymentIntent, PaymentIntent};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

const PROVIDER: &str = "Stripe";

/// Stripe API configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Stripe secret key (`sk_...`)
    pub secret_key: String,
    /// API base URL (defaults to https://api.stripe.com)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            base_url: "https://api.stripe.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl From<&crate::config::StripeConfig> for StripeConfig {
    fn from(config: &crate::config::StripeConfig) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            base_url: config.api_base.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// Stripe payment processor
pub struct StripeProvider {
    config: StripeConfig,
    client: Client,
}

impl StripeProvider {
    pub fn new(config: StripeConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// POST a form to the Stripe API and decode the JSON response.
    async fn post_form<T>(&self, endpoint: &str, form: &[(String, String)]) -> AppResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                error!("Stripe request failed: {}", e);
                AppError::upstream(PROVIDER, format!("Request error: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return serde_json::from_str::<T>(&body).map_err(|e| {
                error!("Failed to parse Stripe response: {}", e);
                AppError::upstream(PROVIDER, format!("Invalid response format: {}", e))
            });
        }

        let message = serde_json::from_str::<StripeErrorResponse>(&body)
            .ok()
            .and_then(|r| r.error.message)
            .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

        error!(%status, "Stripe API error: {}", message);
        Err(AppError::upstream(PROVIDER, message))
    }
}

/// Flatten an intent request into Stripe's form encoding (`metadata[key]=value`).
fn intent_form(request: &CreatePaymentIntent) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), request.amount.to_string()),
        ("currency".to_string(), request.currency.clone()),
        ("description".to_string(), request.description.clone()),
    ];

    if let Some(email) = &request.receipt_email {
        form.push(("receipt_email".to_string(), email.clone()));
    }

    for (key, value) in &request.metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }

    form
}

#[async_trait]
impl PaymentProcessor for StripeProvider {
    async fn create_payment_intent(&self, request: CreatePaymentIntent) -> AppResult<PaymentIntent> {
        info!(
            amount = request.amount,
            currency = %request.currency,
            "Creating Stripe payment intent"
        );

        let intent: StripePaymentIntent = self
            .post_form("/v1/payment_intents", &intent_form(&request))
            .await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            AppError::upstream(PROVIDER, "Payment intent has no client secret")
        })?;

        info!(payment_intent_id = %intent.id, "Stripe payment intent created");

        Ok(PaymentIntent {
            id: intent.id,
            client_secret,
            status: intent.status,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: Option<String>,
}
