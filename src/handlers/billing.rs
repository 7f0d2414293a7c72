// Billing handlers: checkout-session creation and the Stripe webhook

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{
    app::AppState,
    handlers::auth::AuthResponse,
    middleware::auth::AuthenticatedUser,
    models::payment::{JobDomain, PackageType},
    models::user::User,
    services::visibility,
    utils::errors::ApiError,
};

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct VisibilityCheckoutRequest {
    /// `base`, `subdomain_addon`, `single_domain_bundle`, or `full_bundle`
    pub package_type: String,
    /// `contract` or `full_time`; required for every package except full_bundle
    pub domain: Option<String>,
    /// Specific subdomains for base/addon packages
    #[serde(default)]
    pub subdomains: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

/// Validate a visibility checkout request against the domain vocabulary
fn validate_visibility_request(
    request: &VisibilityCheckoutRequest,
) -> Result<(PackageType, Option<JobDomain>), ApiError> {
    let package = PackageType::from_str(&request.package_type)
        .map_err(|e| ApiError::Validation(e))?;

    let domain = match &request.domain {
        Some(raw) => Some(JobDomain::from_str(raw).map_err(|e| ApiError::Validation(e))?),
        None => None,
    };

    match package {
        PackageType::FullBundle => {},
        PackageType::SingleDomainBundle => {
            if domain.is_none() {
                return Err(ApiError::Validation(
                    "A domain is required for a single-domain bundle".to_string(),
                ));
            }
        },
        PackageType::Base | PackageType::SubdomainAddon => {
            let domain = domain.ok_or_else(|| {
                ApiError::Validation("A domain is required for this package".to_string())
            })?;
            if request.subdomains.is_empty() {
                return Err(ApiError::Validation(
                    "At least one subdomain is required for this package".to_string(),
                ));
            }
            for subdomain in &request.subdomains {
                if !visibility::is_known_subdomain(domain, subdomain) {
                    return Err(ApiError::Validation(format!(
                        "Unknown subdomain '{}' for domain '{}'",
                        subdomain,
                        domain.as_str()
                    )));
                }
            }
        },
    }

    Ok((package, domain))
}

// =============================================================================
// CHECKOUT HANDLERS
// =============================================================================

/// POST /billing/subscription/checkout - Start a pro-plan subscription checkout
pub async fn create_subscription_checkout(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = state.db_conn().await?;
    let user = User::find_by_id(&mut conn, auth.user_id).await?;
    drop(conn);

    let session = state.billing_service.create_subscription_checkout(&user).await?;

    let response = AuthResponse {
        success: true,
        data: Some(CheckoutResponse {
            session_id: session.id,
            checkout_url: session.url,
        }),
        message: "Checkout session created".to_string(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// POST /billing/visibility/checkout - Start a one-time visibility purchase.
/// Candidates only; the purchase details ride along as session metadata.
pub async fn create_visibility_checkout(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(request): Json<VisibilityCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.is_candidate() {
        return Err(ApiError::Unauthorized(
            "Only candidates can purchase visibility packages",
        ));
    }

    let (package, domain) = validate_visibility_request(&request)?;

    let mut conn = state.db_conn().await?;
    let user = User::find_by_id(&mut conn, auth.user_id).await?;
    drop(conn);

    let session = state
        .billing_service
        .create_visibility_checkout(&user, package, domain, &request.subdomains)
        .await?;

    let response = AuthResponse {
        success: true,
        data: Some(CheckoutResponse {
            session_id: session.id,
            checkout_url: session.url,
        }),
        message: "Checkout session created".to_string(),
    };

    Ok((StatusCode::OK, Json(response)))
}

// =============================================================================
// WEBHOOK HANDLER
// =============================================================================

/// POST /billing/webhook - Stripe webhook receiver.
/// Signature verification happens against the raw body before anything is
/// parsed; a bad signature is rejected with 400 and changes no state.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::SignatureInvalid)?;

    let event = state
        .webhook_verifier
        .verify_and_parse(&body, signature)
        .map_err(|e| {
            tracing::warn!("Webhook signature verification failed: {}", e);
            ApiError::SignatureInvalid
        })?;

    tracing::info!("Processing webhook event {} ({})", event.id, event.event_type);

    state.billing_service.handle_webhook_event(&event).await?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "received": true }))))
}
