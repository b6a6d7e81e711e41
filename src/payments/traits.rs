//! Payment processor trait definitions

use crate::error::AppResult;
use crate::payments::types::{CreatePaymentIntent, PaymentIntent};
use async_trait::async_trait;

/// Trait for payment processor implementations
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a payment intent the checkout frontend can confirm with its client secret.
    ///
    /// Processor failures are returned as `AppError::Upstream` carrying the
    /// processor's own message. Nothing is retried.
    async fn create_payment_intent(&self, request: CreatePaymentIntent) -> AppResult<PaymentIntent>;
}
