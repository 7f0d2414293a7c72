// Stripe payment gateway client and webhook signature verification
//
// The client speaks the Stripe REST API directly with form-encoded bodies;
// only the handful of endpoints this service needs are wrapped. Webhook
// verification follows Stripe's v1 scheme: HMAC-SHA256 over
// "{timestamp}.{payload}" with a constant-time signature comparison and a
// bounded timestamp window.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::app_config::StripeConfig;

/// Maximum allowed age for webhook events (5 minutes)
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute)
const MAX_CLOCK_SKEW_SECS: i64 = 60;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum WebhookError {
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfRange,

    #[error("Webhook header parse error: {0}")]
    ParseError(String),
}

// =============================================================================
// EVENT TYPES
// =============================================================================

/// Stripe webhook event (only the fields this service processes)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format)
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed")
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp)
    pub created: i64,

    /// Object containing event-specific data
    pub data: StripeEventData,

    /// Whether this is a live mode event (vs test mode)
    #[serde(default)]
    pub livemode: bool,
}

/// Container for event-specific data
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type)
    pub object: serde_json::Value,
}

/// Known Stripe event types that we handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    CheckoutSessionCompleted,
    CustomerSubscriptionCreated,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    Unknown,
}

impl StripeEventType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            _ => Self::Unknown,
        }
    }
}

impl StripeEvent {
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::from_str(&self.event_type)
    }
}

// =============================================================================
// WEBHOOK SIGNATURE VERIFICATION
// =============================================================================

/// Parsed components from the Stripe-Signature header.
/// Format: `t=<timestamp>,v1=<signature>[,v1=<more>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures: Vec<Vec<u8>> = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                },
                "v1" => {
                    v1_signatures.push(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                },
                // Ignore v0 and unknown fields for forward compatibility
                _ => {},
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::ParseError("missing v1 signature".to_string()));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifier for Stripe webhook signatures
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verifies the webhook signature and parses the event.
    /// Verification failure leaves no room for partial processing: callers
    /// reject with 400 and change no state.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        self.validate_timestamp(header.timestamp)?;

        let expected = self.compute_signature(header.timestamp, payload);
        let matched = header
            .v1_signatures
            .iter()
            .any(|sig| constant_time_compare(&expected, sig));
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    /// Validates that the timestamp is within acceptable bounds
    fn validate_timestamp(&self, timestamp: i64) -> Result<(), WebhookError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > MAX_EVENT_AGE_SECS || age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::TimestampOutOfRange);
        }

        Ok(())
    }

    /// Computes the HMAC-SHA256 signature for the given timestamp and payload
    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Constant-time comparison of two byte slices
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes a valid Stripe-Signature value for test fixtures
pub fn compute_test_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

// =============================================================================
// API CLIENT
// =============================================================================

/// Checkout session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Subscription,
    Payment,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Subscription => "subscription",
            CheckoutMode::Payment => "payment",
        }
    }
}

/// Single line item on a checkout session: either a pre-configured price
/// or an ad-hoc amount (used for one-time visibility packages)
#[derive(Debug, Clone)]
pub enum CheckoutLineItem {
    Price {
        price_id: String,
        quantity: u32,
    },
    Amount {
        name: String,
        amount_cents: i64,
        currency: String,
        quantity: u32,
    },
}

/// Parameters for creating a checkout session
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams {
    pub mode: CheckoutMode,
    pub customer_id: Option<String>,
    pub line_item: CheckoutLineItem,
    pub success_url: String,
    pub cancel_url: String,
    /// Free-form metadata echoed back on the completion event
    pub metadata: Vec<(String, String)>,
}

impl CheckoutSessionParams {
    /// Flatten into the form pairs Stripe's API expects
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), self.mode.as_str().to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        match &self.line_item {
            CheckoutLineItem::Price { price_id, quantity } => {
                form.push(("line_items[0][price]".to_string(), price_id.clone()));
                form.push(("line_items[0][quantity]".to_string(), quantity.to_string()));
            },
            CheckoutLineItem::Amount {
                name,
                amount_cents,
                currency,
                quantity,
            } => {
                form.push((
                    "line_items[0][price_data][currency]".to_string(),
                    currency.clone(),
                ));
                form.push((
                    "line_items[0][price_data][product_data][name]".to_string(),
                    name.clone(),
                ));
                form.push((
                    "line_items[0][price_data][unit_amount]".to_string(),
                    amount_cents.to_string(),
                ));
                form.push(("line_items[0][quantity]".to_string(), quantity.to_string()));
            },
        }

        if let Some(customer) = &self.customer_id {
            form.push(("customer".to_string(), customer.clone()));
        }

        for (key, value) in &self.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        form
    }
}

/// Created checkout session
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Created Stripe customer
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct StripeApiErrorBody {
    error: StripeApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Thin client over the Stripe REST API
pub struct StripeClient {
    http_client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.clone(),
        }
    }

    /// Create a billing customer
    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
    ) -> Result<StripeCustomer, StripeError> {
        let form = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
        ];

        self.post_form("/v1/customers", &form).await
    }

    /// Create a checkout session (subscription or payment mode)
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, StripeError> {
        self.post_form("/v1/checkout/sessions", &params.to_form())
            .await
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeError> {
        let url = format!("{}{}", self.api_base, path);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<StripeApiErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => "unreadable error body".to_string(),
            };
            tracing::error!("Stripe API call to {} failed ({}): {}", path, status, message);
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StripeError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";

    fn signed_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            compute_test_signature(secret, timestamp, payload)
        )
    }

    #[test]
    fn test_parse_header_with_v1() {
        let signature = "a".repeat(64);
        let header = SignatureHeader::parse(&format!("t=1234567890,v1={}", signature)).unwrap();

        assert_eq!(header.timestamp, 1234567890);
        assert_eq!(header.v1_signatures.len(), 1);
        assert_eq!(header.v1_signatures[0].len(), 32);
    }

    #[test]
    fn test_parse_header_ignores_unknown_fields() {
        let signature = "a".repeat(64);
        let header =
            SignatureHeader::parse(&format!("t=1234567890,v1={},v0=legacy,x=y", signature))
                .unwrap();
        assert_eq!(header.v1_signatures.len(), 1);
    }

    #[test]
    fn test_parse_header_missing_parts_fails() {
        assert!(matches!(
            SignatureHeader::parse("t=1234567890"),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse(&format!("v1={}", "a".repeat(64))),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("t=nan,v1=zz"),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn test_verify_valid_signature() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = br#"{"id":"evt_test123","type":"checkout.session.completed","created":1704067200,"data":{"object":{}},"livemode":false}"#;
        let timestamp = chrono::Utc::now().timestamp();

        let event = verifier
            .verify_and_parse(payload, &signed_header(TEST_SECRET, timestamp, payload))
            .unwrap();

        assert_eq!(event.id, "evt_test123");
        assert_eq!(event.parsed_type(), StripeEventType::CheckoutSessionCompleted);
    }

    #[test]
    fn test_verify_wrong_secret_fails() {
        let verifier = WebhookVerifier::new("some_other_secret");
        let payload = br#"{"id":"evt_test"}"#;
        let timestamp = chrono::Utc::now().timestamp();

        let result =
            verifier.verify_and_parse(payload, &signed_header(TEST_SECRET, timestamp, payload));
        assert_eq!(result.unwrap_err(), WebhookError::InvalidSignature);
    }

    #[test]
    fn test_verify_tampered_payload_fails() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let original = br#"{"id":"evt_test"}"#;
        let tampered = br#"{"id":"evt_hacked"}"#;
        let timestamp = chrono::Utc::now().timestamp();

        let result =
            verifier.verify_and_parse(tampered, &signed_header(TEST_SECRET, timestamp, original));
        assert_eq!(result.unwrap_err(), WebhookError::InvalidSignature);
    }

    #[test]
    fn test_verify_stale_timestamp_fails() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = br#"{"id":"evt_test"}"#;
        let stale = chrono::Utc::now().timestamp() - 600;

        let result =
            verifier.verify_and_parse(payload, &signed_header(TEST_SECRET, stale, payload));
        assert_eq!(result.unwrap_err(), WebhookError::TimestampOutOfRange);
    }

    #[test]
    fn test_verify_future_timestamp_beyond_skew_fails() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = br#"{"id":"evt_test"}"#;
        let future = chrono::Utc::now().timestamp() + 120;

        let result =
            verifier.verify_and_parse(payload, &signed_header(TEST_SECRET, future, payload));
        assert_eq!(result.unwrap_err(), WebhookError::TimestampOutOfRange);
    }

    #[test]
    fn test_event_type_dispatch() {
        assert_eq!(
            StripeEventType::from_str("customer.subscription.updated"),
            StripeEventType::CustomerSubscriptionUpdated
        );
        assert_eq!(
            StripeEventType::from_str("customer.subscription.deleted"),
            StripeEventType::CustomerSubscriptionDeleted
        );
        assert_eq!(
            StripeEventType::from_str("invoice.payment_succeeded"),
            StripeEventType::Unknown
        );
    }

    #[test]
    fn test_checkout_params_form_encoding_with_price() {
        let params = CheckoutSessionParams {
            mode: CheckoutMode::Subscription,
            customer_id: Some("cus_123".to_string()),
            line_item: CheckoutLineItem::Price {
                price_id: "price_abc".to_string(),
                quantity: 1,
            },
            success_url: "https://app.example.com/ok".to_string(),
            cancel_url: "https://app.example.com/no".to_string(),
            metadata: vec![("user_id".to_string(), "u-1".to_string())],
        };

        let form = params.to_form();
        assert!(form.contains(&("mode".to_string(), "subscription".to_string())));
        assert!(form.contains(&("line_items[0][price]".to_string(), "price_abc".to_string())));
        assert!(form.contains(&("customer".to_string(), "cus_123".to_string())));
        assert!(form.contains(&("metadata[user_id]".to_string(), "u-1".to_string())));
    }

    #[test]
    fn test_checkout_params_form_encoding_with_inline_amount() {
        let params = CheckoutSessionParams {
            mode: CheckoutMode::Payment,
            customer_id: None,
            line_item: CheckoutLineItem::Amount {
                name: "Visibility: contract bundle".to_string(),
                amount_cents: 9900,
                currency: "usd".to_string(),
                quantity: 1,
            },
            success_url: "https://app.example.com/ok".to_string(),
            cancel_url: "https://app.example.com/no".to_string(),
            metadata: vec![("package_type".to_string(), "single_domain_bundle".to_string())],
        };

        let form = params.to_form();
        assert!(form.contains(&("mode".to_string(), "payment".to_string())));
        assert!(form.contains(&(
            "line_items[0][price_data][unit_amount]".to_string(),
            "9900".to_string()
        )));
        assert!(form.contains(&(
            "line_items[0][price_data][currency]".to_string(),
            "usd".to_string()
        )));
        assert!(!form.iter().any(|(k, _)| k == "customer"));
        assert!(form.contains(&(
            "metadata[package_type]".to_string(),
            "single_domain_bundle".to_string()
        )));
    }
}
