//! Webhook security tests
//!
//! Signature verification is the only thing standing between the public
//! internet and the subscription reconciler, so every rejection path gets
//! exercised against the real verification routine.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use resumeai_api::billing::webhook::verify_signature;
use resumeai_api::billing::BillingError;

const SECRET: &str = "whsec_test_secret_key";

/// Generate a valid Stripe webhook signature header for testing
fn generate_stripe_signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap());

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("t={},v1={}", timestamp, signature)
}

/// Generate a webhook payload for testing
fn test_webhook_payload(event_type: &str) -> Vec<u8> {
    let payload = serde_json::json!({
        "id": "evt_test_123",
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "sub_test_123",
                "customer": "cus_test_123",
                "status": "active",
                "current_period_end": Utc::now().timestamp() + 30 * 24 * 60 * 60
            }
        }
    });
    serde_json::to_vec(&payload).unwrap()
}

#[test]
fn test_correctly_signed_fresh_envelope_accepted() {
    let payload = test_webhook_payload("customer.subscription.updated");
    let header = generate_stripe_signature(&payload, SECRET, Utc::now().timestamp());

    assert!(verify_signature(&payload, &header, SECRET).is_ok());
}

#[test]
fn test_tampered_payload_rejected() {
    let payload = test_webhook_payload("customer.subscription.updated");
    let header = generate_stripe_signature(&payload, SECRET, Utc::now().timestamp());

    let mut tampered = payload.clone();
    let needle = b"\"status\":\"active\"";
    let pos = tampered
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("payload contains status field");
    tampered[pos + needle.len() - 2] = b'X';

    let err = verify_signature(&tampered, &header, SECRET).unwrap_err();
    assert!(matches!(err, BillingError::Webhook(_)));
}

#[test]
fn test_wrong_secret_rejected() {
    let payload = test_webhook_payload("checkout.session.completed");
    let header = generate_stripe_signature(&payload, "whsec_other_key", Utc::now().timestamp());

    assert!(verify_signature(&payload, &header, SECRET).is_err());
}

#[test]
fn test_stale_timestamp_rejected_even_when_correctly_signed() {
    let payload = test_webhook_payload("customer.subscription.updated");
    let stale = Utc::now().timestamp() - 400;
    let header = generate_stripe_signature(&payload, SECRET, stale);

    let err = verify_signature(&payload, &header, SECRET).unwrap_err();
    assert!(err.to_string().contains("timestamp"));
}

#[test]
fn test_future_timestamp_rejected() {
    let payload = test_webhook_payload("customer.subscription.updated");
    let future = Utc::now().timestamp() + 400;
    let header = generate_stripe_signature(&payload, SECRET, future);

    assert!(verify_signature(&payload, &header, SECRET).is_err());
}

#[test]
fn test_timestamp_just_inside_tolerance_accepted() {
    let payload = test_webhook_payload("customer.subscription.updated");
    let recent = Utc::now().timestamp() - 250;
    let header = generate_stripe_signature(&payload, SECRET, recent);

    assert!(verify_signature(&payload, &header, SECRET).is_ok());
}

#[test]
fn test_header_missing_timestamp_rejected() {
    let payload = test_webhook_payload("invoice.paid");
    assert!(verify_signature(&payload, "v1=abc123def456", SECRET).is_err());
}

#[test]
fn test_header_missing_signature_rejected() {
    let payload = test_webhook_payload("invoice.paid");
    assert!(verify_signature(&payload, "t=1234567890", SECRET).is_err());
}

#[test]
fn test_garbage_header_rejected() {
    let payload = test_webhook_payload("invoice.paid");
    assert!(verify_signature(&payload, "not_a_signature_header", SECRET).is_err());
    assert!(verify_signature(&payload, "", SECRET).is_err());
}

#[test]
fn test_unknown_scheme_alone_rejected() {
    let payload = test_webhook_payload("invoice.paid");
    let ts = Utc::now().timestamp();
    // Correct pair under a future scheme name nobody verifies yet.
    let header = generate_stripe_signature(&payload, SECRET, ts).replace("v1=", "v9=");

    assert!(verify_signature(&payload, &header, SECRET).is_err());
}
