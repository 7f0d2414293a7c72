// Webhook signature verification at the crate boundary

use hirepath_backend_core::services::stripe::{
    compute_test_signature, StripeEventType, WebhookError, WebhookVerifier,
};

const SECRET: &str = "whsec_integration_secret";

fn signed_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        compute_test_signature(secret, timestamp, payload)
    )
}

fn checkout_payload() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "id": "evt_integration_1",
        "type": "checkout.session.completed",
        "created": 1704067200,
        "data": {
            "object": {
                "id": "cs_test_abc",
                "mode": "payment",
                "metadata": {
                    "user_id": "5d2f1a34-9c1b-4f68-8f50-8b8f53f1a111",
                    "package_type": "base",
                    "job_domain": "contract",
                    "subdomains": "[\"c2c\"]"
                }
            }
        },
        "livemode": false
    }))
    .unwrap()
}

#[test]
fn correctly_signed_event_parses() {
    let verifier = WebhookVerifier::new(SECRET);
    let payload = checkout_payload();
    let timestamp = chrono::Utc::now().timestamp();

    let event = verifier
        .verify_and_parse(&payload, &signed_header(SECRET, timestamp, &payload))
        .expect("valid signature should verify");

    assert_eq!(event.id, "evt_integration_1");
    assert_eq!(event.parsed_type(), StripeEventType::CheckoutSessionCompleted);
    assert_eq!(event.data.object["metadata"]["package_type"], "base");
}

#[test]
fn wrong_secret_is_rejected() {
    let verifier = WebhookVerifier::new(SECRET);
    let payload = checkout_payload();
    let timestamp = chrono::Utc::now().timestamp();

    let result = verifier.verify_and_parse(
        &payload,
        &signed_header("whsec_other", timestamp, &payload),
    );
    assert_eq!(result.unwrap_err(), WebhookError::InvalidSignature);
}

#[test]
fn replayed_old_event_is_rejected() {
    let verifier = WebhookVerifier::new(SECRET);
    let payload = checkout_payload();
    let old = chrono::Utc::now().timestamp() - 3600;

    let result = verifier.verify_and_parse(&payload, &signed_header(SECRET, old, &payload));
    assert_eq!(result.unwrap_err(), WebhookError::TimestampOutOfRange);
}

#[test]
fn garbage_header_is_rejected() {
    let verifier = WebhookVerifier::new(SECRET);
    let payload = checkout_payload();

    for header in ["", "t=abc", "v1=zzzz", "t=123", "no-equals-at-all"] {
        let result = verifier.verify_and_parse(&payload, header);
        assert!(
            matches!(result, Err(WebhookError::ParseError(_))),
            "header {:?} should fail to parse",
            header
        );
    }
}
