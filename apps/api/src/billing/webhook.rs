//! Stripe webhook signature verification and the signed event envelope.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

use crate::billing::BillingError;

/// Maximum accepted distance between the signature timestamp and now, in
/// seconds. Limits replay of captured deliveries.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Signed event envelope as delivered by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Provider-side creation time, epoch seconds.
    pub created: i64,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Verifies a `Stripe-Signature` header against the raw request body.
///
/// The header carries `t=<unix seconds>,v1=<hex hmac>` pairs; the signed
/// payload is `"{t}.{body}"` keyed with the endpoint secret. Nothing in the
/// body may be trusted before this check passes.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str) -> Result<(), BillingError> {
    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;

    for part in header.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            match key {
                "t" => timestamp = Some(value),
                "v1" => signature = Some(value),
                _ => {}
            }
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        BillingError::Webhook("missing timestamp in signature header".to_string())
    })?;
    let signature = signature.ok_or_else(|| {
        BillingError::Webhook("missing v1 signature in signature header".to_string())
    })?;

    let body = std::str::from_utf8(payload)
        .map_err(|_| BillingError::Webhook("payload is not valid UTF-8".to_string()))?;
    let signed_payload = format!("{timestamp}.{body}");

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| BillingError::Webhook("invalid webhook secret".to_string()))?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        warn!("Webhook signature mismatch");
        return Err(BillingError::Webhook("signature mismatch".to_string()));
    }

    let ts: i64 = timestamp.parse().map_err(|_| {
        BillingError::Webhook("invalid timestamp in signature header".to_string())
    })?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
        warn!("Webhook timestamp {ts} outside tolerance");
        return Err(BillingError::Webhook("timestamp outside tolerance".to_string()));
    }

    Ok(())
}

/// Constant-time comparison over byte slices.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
