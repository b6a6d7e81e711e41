//! Stripe webhook verification and event decoding
//!
//! Stripe signs each delivery with a header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The signed payload is
//! `"<t>.<raw body>"`, keyed with the endpoint's signing secret (HMAC-SHA256).

use crate::error::{AppError, AppResult};
use crate::models::PaymentUpdate;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance between the signature timestamp and the local clock.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

/// Decoded `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> AppResult<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        AppError::signature("Unable to extract timestamp and signatures from header")
                    })?)
                }
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            AppError::signature("Unable to extract timestamp and signatures from header")
        })?;
        if signatures.is_empty() {
            return Err(AppError::signature(
                "No signatures found with expected scheme",
            ));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verifies Stripe webhook deliveries against the endpoint signing secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify the signature and decode the event, using the system clock.
    pub fn construct_event(&self, payload: &[u8], header: &str) -> AppResult<WebhookEvent> {
        self.construct_event_at(payload, header, Utc::now())
    }

    /// Verify the signature and decode the event as of `now`.
    pub fn construct_event_at(
        &self,
        payload: &[u8],
        header: &str,
        now: DateTime<Utc>,
    ) -> AppResult<WebhookEvent> {
        self.verify_at(payload, header, now)?;
        serde_json::from_slice(payload)
            .map_err(|e| AppError::signature(format!("Invalid webhook payload: {}", e)))
    }

    /// Check the signature over the exact raw bytes. Pure in (payload, header, secret, now).
    pub fn verify_at(&self, payload: &[u8], header: &str, now: DateTime<Utc>) -> AppResult<()> {
        let header = SignatureHeader::parse(header)?;

        let matched = header.signatures.iter().any(|candidate| {
            let Ok(expected) = hex::decode(candidate) else {
                return false;
            };
            self.mac(header.timestamp, payload)
                .verify_slice(&expected)
                .is_ok()
        });

        if !matched {
            return Err(AppError::signature(
                "No signatures found matching the expected signature for payload",
            ));
        }

        if (now.timestamp() - header.timestamp).abs() > self.tolerance_secs {
            return Err(AppError::signature("Timestamp outside the tolerance zone"));
        }

        Ok(())
    }

    /// Produce a header for `payload` signed at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let signature = hex::encode(self.mac(timestamp, payload).finalize().into_bytes());
        format!("t={},v1={}", timestamp, signature)
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

/// Minimal view of a Stripe event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    /// Only read for the handled payment intent events.
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub object: serde_json::Value,
}

/// What a verified event asks of the admin store
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    Update {
        payment_intent_id: String,
        update: PaymentUpdate,
    },
    Ignore {
        event_type: String,
    },
}

impl WebhookEvent {
    fn object_str(&self, field: &str) -> Option<String> {
        match self.data.object.get(field)? {
            serde_json::Value::String(s) => Some(s.clone()),
            // Expanded objects carry their own id.
            serde_json::Value::Object(map) => map.get("id")?.as_str().map(str::to_string),
            _ => None,
        }
    }

    /// Map the event to an admin store write.
    pub fn reconcile_action(&self, now: DateTime<Utc>) -> AppResult<ReconcileAction> {
        let intent_id = || {
            self.object_str("id")
                .ok_or_else(|| AppError::validation("Payment intent event has no object id"))
        };

        match self.event_type.as_str() {
            PAYMENT_INTENT_SUCCEEDED => Ok(ReconcileAction::Update {
                payment_intent_id: intent_id()?,
                update: PaymentUpdate::succeeded(self.object_str("latest_charge"), now),
            }),
            PAYMENT_INTENT_FAILED => Ok(ReconcileAction::Update {
                payment_intent_id: intent_id()?,
                update: PaymentUpdate::failed(),
            }),
            other => Ok(ReconcileAction::Ignore {
                event_type: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderStatus, PaidAt};

    const SECRET: &str = "whsec_test_secret";

    fn event_body(event_type: &str) -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_700_000_000,
            "data": {"object": {"id": "pi_123", "latest_charge": "ch_456"}}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_parse_signature_header() {
        let header = SignatureHeader::parse("t=1609459200,v1=abcdef,v0=ignored,v1=123456").unwrap();
        assert_eq!(header.timestamp, 1_609_459_200);
        assert_eq!(header.signatures, vec!["abcdef".to_string(), "123456".to_string()]);
    }

    #[test]
    fn test_parse_signature_header_invalid() {
        assert!(SignatureHeader::parse("invalid").is_err());
        assert!(SignatureHeader::parse("t=1609459200").is_err());
        assert!(SignatureHeader::parse("t=abc,v1=deadbeef").is_err());
    }

    #[test]
    fn test_valid_signature_is_accepted_repeatedly() {
        let verifier = WebhookVerifier::new(SECRET);
        let now = Utc::now();
        let body = event_body(PAYMENT_INTENT_SUCCEEDED);
        let header = verifier.sign(&body, now.timestamp());

        assert!(verifier.verify_at(&body, &header, now).is_ok());
        assert!(verifier.verify_at(&body, &header, now).is_ok());
    }

    #[test]
    fn test_altered_body_is_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let now = Utc::now();
        let body = event_body(PAYMENT_INTENT_SUCCEEDED);
        let header = verifier.sign(&body, now.timestamp());

        let mut tampered = body.clone();
        let last = tampered.len() - 2;
        tampered[last] ^= 0x01;
        assert!(verifier.verify_at(&tampered, &header, now).is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let now = Utc::now();
        let body = event_body(PAYMENT_INTENT_SUCCEEDED);
        let header = WebhookVerifier::new("whsec_other").sign(&body, now.timestamp());
        assert!(WebhookVerifier::new(SECRET).verify_at(&body, &header, now).is_err());
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let verifier = WebhookVerifier::new(SECRET).with_tolerance(300);
        let now = Utc::now();
        let body = event_body(PAYMENT_INTENT_SUCCEEDED);
        let header = verifier.sign(&body, now.timestamp() - 301);

        let err = verifier.verify_at(&body, &header, now).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let verifier = WebhookVerifier::new(SECRET);
        let now = Utc::now();
        let body = event_body(PAYMENT_INTENT_SUCCEEDED);
        let signed = verifier.sign(&body, now.timestamp());
        let header = signed.replacen("v1=", "v1=00ff,v1=", 1);
        assert!(verifier.verify_at(&body, &header, now).is_ok());
    }

    #[test]
    fn test_succeeded_event_maps_to_paid_update() {
        let verifier = WebhookVerifier::new(SECRET);
        let now = Utc::now();
        let body = event_body(PAYMENT_INTENT_SUCCEEDED);
        let event = verifier
            .construct_event_at(&body, &verifier.sign(&body, now.timestamp()), now)
            .unwrap();

        match event.reconcile_action(now).unwrap() {
            ReconcileAction::Update {
                payment_intent_id,
                update,
            } => {
                assert_eq!(payment_intent_id, "pi_123");
                assert_eq!(update.status, OrderStatus::Paid.as_str());
                assert_eq!(update.charge_id.as_deref(), Some("ch_456"));
                assert_eq!(update.paid_at, PaidAt::SetIfUnset(now));
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_failed_event_maps_to_failed_update() {
        let event: WebhookEvent =
            serde_json::from_slice(&event_body(PAYMENT_INTENT_FAILED)).unwrap();
        assert_eq!(
            event.reconcile_action(Utc::now()).unwrap(),
            ReconcileAction::Update {
                payment_intent_id: "pi_123".to_string(),
                update: PaymentUpdate::failed(),
            }
        );
    }

    #[test]
    fn test_expanded_latest_charge() {
        let event: WebhookEvent = serde_json::from_value(serde_json::json!({
            "type": PAYMENT_INTENT_SUCCEEDED,
            "data": {"object": {"id": "pi_9", "latest_charge": {"id": "ch_9", "object": "charge"}}}
        }))
        .unwrap();
        match event.reconcile_action(Utc::now()).unwrap() {
            ReconcileAction::Update { update, .. } => {
                assert_eq!(update.charge_id.as_deref(), Some("ch_9"))
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_other_events_are_ignored() {
        let event: WebhookEvent =
            serde_json::from_slice(&event_body("charge.refunded")).unwrap();
        assert_eq!(
            event.reconcile_action(Utc::now()).unwrap(),
            ReconcileAction::Ignore {
                event_type: "charge.refunded".to_string()
            }
        );
    }

    #[test]
    fn test_event_without_data_is_accepted() {
        let verifier = WebhookVerifier::new(SECRET);
        let now = Utc::now();
        let body = br#"{"id":"evt_2","type":"customer.created"}"#.to_vec();
        let header = verifier.sign(&body, now.timestamp());

        let event = verifier.construct_event_at(&body, &header, now).unwrap();
        assert_eq!(
            event.reconcile_action(now).unwrap(),
            ReconcileAction::Ignore {
                event_type: "customer.created".to_string()
            }
        );

        let failed: WebhookEvent =
            serde_json::from_str(r#"{"type":"payment_intent.payment_failed"}"#).unwrap();
        assert!(failed.reconcile_action(now).is_err());
    }

    #[test]
    fn test_signed_garbage_body_is_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let now = Utc::now();
        let body = b"not json".to_vec();
        let header = verifier.sign(&body, now.timestamp());
        assert!(verifier.construct_event_at(&body, &header, now).is_err());
    }
}
