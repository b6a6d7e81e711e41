//! Payment processor request and response types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request to create a payment intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentIntent {
    /// Amount in the smallest currency unit
    pub amount: i64,
    /// Lowercase ISO currency code
    pub currency: String,
    /// Human-readable description shown in the processor dashboard
    pub description: String,
    /// Address the processor sends the receipt to
    pub receipt_email: Option<String>,
    /// Links back to the brand and admin records
    pub metadata: BTreeMap<String, String>,
}

/// Payment intent as returned by the processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    #[serde(default)]
    pub status: Option<String>,
}
