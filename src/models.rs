//! Order domain types shared by the admin store, the brand stores and the handlers.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Payment method recorded by manual status reports.
pub const MANUAL_PAYMENT_METHOD: &str = "card";

/// Lifecycle of an admin order: `pending_payment -> {paid, failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::PendingPayment)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(OrderStatus::PendingPayment),
            "paid" => Ok(OrderStatus::Paid),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Whether a terminal order may be moved again by a later status write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminalStatusPolicy {
    /// Later writes overwrite earlier ones (last write wins).
    #[default]
    Overwrite,
    /// Only `pending_payment` orders accept a status write.
    Reject,
}

impl TerminalStatusPolicy {
    pub fn permits(&self, current: OrderStatus) -> bool {
        match self {
            TerminalStatusPolicy::Overwrite => true,
            TerminalStatusPolicy::Reject => !current.is_terminal(),
        }
    }
}

impl FromStr for TerminalStatusPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(TerminalStatusPolicy::Overwrite),
            "reject" => Ok(TerminalStatusPolicy::Reject),
            other => Err(anyhow!(
                "TERMINAL_STATUS_POLICY must be 'overwrite' or 'reject', got {}",
                other
            )),
        }
    }
}

/// Admin order row (`admin.orders`)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub brand: String,
    pub brand_order_id: String,
    pub order_number: Option<String>,
    pub product: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_charge_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a pending order is first recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub brand: String,
    pub brand_order_id: String,
    pub order_number: Option<String>,
    pub product: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
}

impl NewOrder {
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "brand_order_id": self.brand_order_id,
            "brand_order_number": self.order_number,
        })
    }
}

/// What happens to `paid_at` during a status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidAt {
    Keep,
    Clear,
    Set(DateTime<Utc>),
    /// Set only when the column is still empty; redelivered events keep the first timestamp.
    SetIfUnset(DateTime<Utc>),
}

impl PaidAt {
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            PaidAt::Keep => "keep",
            PaidAt::Clear => "clear",
            PaidAt::Set(_) => "set",
            PaidAt::SetIfUnset(_) => "set_if_unset",
        }
    }

    pub(crate) fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            PaidAt::Set(ts) | PaidAt::SetIfUnset(ts) => Some(*ts),
            PaidAt::Keep | PaidAt::Clear => None,
        }
    }
}

/// A status write matched by payment intent id.
///
/// `status` is written as given; the admin store's status check is what
/// rejects values outside [`OrderStatus`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub status: String,
    /// Written only when present.
    pub charge_id: Option<String>,
    /// Written only when present.
    pub payment_method: Option<String>,
    pub paid_at: PaidAt,
}

impl PaymentUpdate {
    /// Manual report from the checkout frontend. Any status other than `paid` clears `paid_at`.
    pub fn manual(status: &str, now: DateTime<Utc>) -> Self {
        Self {
            status: status.to_string(),
            charge_id: None,
            payment_method: Some(MANUAL_PAYMENT_METHOD.to_string()),
            paid_at: if status == OrderStatus::Paid.as_str() {
                PaidAt::Set(now)
            } else {
                PaidAt::Clear
            },
        }
    }

    /// `payment_intent.succeeded`
    pub fn succeeded(charge_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: OrderStatus::Paid.to_string(),
            charge_id,
            payment_method: None,
            paid_at: PaidAt::SetIfUnset(now),
        }
    }

    /// `payment_intent.payment_failed`
    pub fn failed() -> Self {
        Self {
            status: OrderStatus::Failed.to_string(),
            charge_id: None,
            payment_method: None,
            paid_at: PaidAt::Keep,
        }
    }
}

impl Order {
    /// Applies `update` in place. Returns `Ok(false)` when the policy refuses
    /// the write and an error when the status is not a known order status.
    pub fn apply(
        &mut self,
        update: &PaymentUpdate,
        policy: TerminalStatusPolicy,
        now: DateTime<Utc>,
    ) -> Result<bool, String> {
        if !policy.permits(self.status) {
            return Ok(false);
        }

        self.status = update.status.parse()?;
        if let Some(charge_id) = &update.charge_id {
            self.stripe_charge_id = Some(charge_id.clone());
        }
        if let Some(method) = &update.payment_method {
            self.payment_method = Some(method.clone());
        }
        self.paid_at = match update.paid_at {
            PaidAt::Keep => self.paid_at,
            PaidAt::Clear => None,
            PaidAt::Set(ts) => Some(ts),
            PaidAt::SetIfUnset(ts) => self.paid_at.or(Some(ts)),
        };
        self.updated_at = now;
        Ok(true)
    }
}

/// Mirror write applied to a brand's own `orders` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandOrderUpdate {
    pub payment_status: String,
    pub stripe_payment_intent_id: String,
    pub paid_at: Option<DateTime<Utc>>,
}

impl BrandOrderUpdate {
    pub fn new(status: &str, payment_intent_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            payment_status: status.to_string(),
            stripe_payment_intent_id: payment_intent_id.to_string(),
            paid_at: (status == OrderStatus::Paid.as_str()).then_some(now),
        }
    }
}
