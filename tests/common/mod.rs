#![allow(dead_code)]

pub mod memory_store;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use brandpay_backend::api;
use brandpay_backend::api::cors::OriginAllowList;
use brandpay_backend::database::brand_store::{
    BrandCredentials, BrandHostPolicy, BrandStore, BrandStoreConnector,
};
use brandpay_backend::error::{AppError, AppResult};
use brandpay_backend::models::{BrandOrderUpdate, TerminalStatusPolicy};
use brandpay_backend::payments::traits::PaymentProcessor;
use brandpay_backend::payments::types::{CreatePaymentIntent, PaymentIntent};
use brandpay_backend::payments::webhook::WebhookVerifier;
use brandpay_backend::state::AppState;

pub use memory_store::MemoryOrderStore;

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const FRONTEND_ORIGIN: &str = "http://localhost:8080";

/// Processor double handing out sequential intent ids
#[derive(Default)]
pub struct FakeProcessor {
    counter: AtomicU64,
    fail_with: Mutex<Option<String>>,
    pub requests: Mutex<Vec<CreatePaymentIntent>>,
}

impl FakeProcessor {
    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_payment_intent(&self, request: CreatePaymentIntent) -> AppResult<PaymentIntent> {
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(AppError::upstream("Stripe", message));
        }
        self.requests.lock().unwrap().push(request);
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentIntent {
            id: format!("pi_test_{}", n),
            client_secret: format!("pi_test_{}_secret_abc", n),
            status: Some("requires_payment_method".to_string()),
        })
    }
}

/// Brand store double that records writes instead of sending them
pub struct FakeBrandConnector {
    policy: BrandHostPolicy,
    pub rows_per_update: AtomicU64,
    pub fail: AtomicBool,
    pub updates: Arc<Mutex<Vec<(String, String, BrandOrderUpdate)>>>,
}

impl FakeBrandConnector {
    pub fn new(allowed_hosts: Option<Vec<String>>) -> Self {
        Self {
            policy: BrandHostPolicy::new(allowed_hosts),
            rows_per_update: AtomicU64::new(1),
            fail: AtomicBool::new(false),
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

struct RecordingBrandStore {
    url: String,
    rows: u64,
    fail: bool,
    updates: Arc<Mutex<Vec<(String, String, BrandOrderUpdate)>>>,
}

#[async_trait]
impl BrandStore for RecordingBrandStore {
    async fn update_order(&self, order_id: &str, update: &BrandOrderUpdate) -> AppResult<u64> {
        if self.fail {
            return Err(AppError::upstream("Brand store", "HTTP 401: invalid key"));
        }
        self.updates
            .lock()
            .unwrap()
            .push((self.url.clone(), order_id.to_string(), update.clone()));
        Ok(self.rows)
    }
}

impl BrandStoreConnector for FakeBrandConnector {
    fn connect(&self, credentials: &BrandCredentials) -> AppResult<Box<dyn BrandStore>> {
        self.policy.check(&credentials.url)?;
        Ok(Box::new(RecordingBrandStore {
            url: credentials.url.clone(),
            rows: self.rows_per_update.load(Ordering::SeqCst),
            fail: self.fail.load(Ordering::SeqCst),
            updates: self.updates.clone(),
        }))
    }
}

pub struct Harness {
    pub router: Router,
    pub orders: Arc<MemoryOrderStore>,
    pub processor: Arc<FakeProcessor>,
    pub brands: Arc<FakeBrandConnector>,
    pub verifier: WebhookVerifier,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(TerminalStatusPolicy::Overwrite, None)
    }

    pub fn with_options(
        policy: TerminalStatusPolicy,
        allowed_brand_hosts: Option<Vec<String>>,
    ) -> Self {
        let orders = Arc::new(MemoryOrderStore::new());
        let processor = Arc::new(FakeProcessor::default());
        let brands = Arc::new(FakeBrandConnector::new(allowed_brand_hosts));
        let verifier = WebhookVerifier::new(WEBHOOK_SECRET);

        let state = AppState {
            orders: orders.clone(),
            webhook_orders: orders.clone(),
            processor: processor.clone(),
            brand_stores: brands.clone(),
            verifier: Arc::new(verifier.clone()),
            allowed_origins: Arc::new(
                OriginAllowList::new(vec![
                    FRONTEND_ORIGIN.to_string(),
                    "https://shop.example.com".to_string(),
                ])
                .unwrap(),
            ),
            terminal_status_policy: policy,
            environment: "development".to_string(),
        };

        Self {
            router: api::router(state),
            orders,
            processor,
            brands,
            verifier,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("origin", FRONTEND_ORIGIN)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.send(request).await;
        let status = response.status();
        (status, json_body(response).await)
    }

    /// Deliver `event` to the webhook, signed now.
    pub async fn deliver(&self, event: &serde_json::Value) -> Response<Body> {
        let body = event.to_string();
        let signature = self
            .verifier
            .sign(body.as_bytes(), chrono::Utc::now().timestamp());
        self.deliver_raw(body, &signature).await
    }

    pub async fn deliver_raw(&self, body: String, signature: &str) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhook")
            .header("stripe-signature", signature)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

pub fn intent_event(event_type: &str, intent_id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "evt_test",
        "object": "event",
        "type": event_type,
        "created": chrono::Utc::now().timestamp(),
        "data": {
            "object": {
                "id": intent_id,
                "object": "payment_intent",
                "latest_charge": "ch_test_1"
            }
        }
    })
}

pub fn checkout_body() -> serde_json::Value {
    serde_json::json!({
        "orderId": "A1",
        "brand": "Acme",
        "amount": 1999,
        "customerEmail": "a@b.com"
    })
}
