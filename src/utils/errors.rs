// API error taxonomy and response envelope
//
// Every handler failure funnels through ApiError so status codes and the
// response shape stay uniform. Server-side details are logged where they
// occur; only safe messages are echoed to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use thiserror::Error;

use crate::models::refresh_token::RefreshTokenError;
use crate::models::subscription::SubscriptionError;
use crate::models::user::UserError;
use crate::services::billing::BillingError;
use crate::services::jwt::JwtError;
use crate::services::oauth::OAuthError;

/// API-level errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Upstream service failure")]
    Upstream,

    #[error("Internal server error")]
    Internal,
}

/// Standard error response structure
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub description: String,
}

impl ApiError {
    /// Convert to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::SignatureInvalid => StatusCode::BAD_REQUEST,
            ApiError::Upstream => StatusCode::BAD_GATEWAY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::SignatureInvalid => "SIGNATURE_INVALID",
            ApiError::Upstream => "UPSTREAM_ERROR",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }

    /// Shorthand for the common invalid-credentials rejection
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("Invalid email or password")
    }

    /// Shorthand for invalid/expired/revoked token rejections.
    /// Deliberately the same message for every token failure mode.
    pub fn invalid_token() -> Self {
        ApiError::Unauthorized("Invalid or expired token")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let response = ApiErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.error_code().to_string(),
                description: self.to_string(),
            },
            message: self.to_string(),
        };

        (status, Json(response)).into_response()
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound => ApiError::NotFound("User"),
            UserError::EmailTaken => {
                ApiError::Conflict("An account with this email address already exists".to_string())
            },
            UserError::InvalidId => ApiError::Validation("Invalid user id".to_string()),
            other => {
                tracing::error!("User store failure: {}", other);
                ApiError::Internal
            },
        }
    }
}

impl From<RefreshTokenError> for ApiError {
    fn from(e: RefreshTokenError) -> Self {
        match e {
            RefreshTokenError::NotFound
            | RefreshTokenError::Expired
            | RefreshTokenError::Revoked => ApiError::invalid_token(),
            other => {
                tracing::error!("Refresh token store failure: {}", other);
                ApiError::Internal
            },
        }
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(e: SubscriptionError) -> Self {
        match e {
            SubscriptionError::NotFound => ApiError::NotFound("Subscription"),
            other => {
                tracing::error!("Subscription store failure: {}", other);
                ApiError::Internal
            },
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::InvalidToken => ApiError::invalid_token(),
            JwtError::DatabaseError(inner) => inner.into(),
            other => {
                tracing::error!("Token service failure: {}", other);
                ApiError::Internal
            },
        }
    }
}

impl From<OAuthError> for ApiError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::InvalidState => {
                ApiError::Validation("Malformed OAuth state parameter".to_string())
            },
            OAuthError::AccountDeactivated => ApiError::Unauthorized("Account is deactivated"),
            OAuthError::User(inner) => inner.into(),
            other => {
                tracing::error!("OAuth provider failure: {}", other);
                ApiError::Upstream
            },
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::Stripe(inner) => {
                tracing::error!("Payment gateway failure: {}", inner);
                ApiError::Upstream
            },
            BillingError::MissingField(field) => {
                ApiError::Validation(format!("Missing field: {}", field))
            },
            BillingError::MalformedPayload(detail) => {
                ApiError::Validation(format!("Malformed payload: {}", detail))
            },
            BillingError::User(inner) => inner.into(),
            BillingError::Subscription(inner) => inner.into(),
            other => {
                tracing::error!("Billing failure: {}", other);
                ApiError::Internal
            },
        }
    }
}

/// Helper function to log authentication failures
pub fn log_auth_failure(user_email: &str, error: &ApiError) {
    tracing::warn!(
        email = user_email,
        error_code = error.error_code(),
        "Authentication failure"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NotFound("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::SignatureInvalid.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Upstream.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ApiError::Validation("x".into()).error_code(), "VALIDATION_ERROR");
        assert_eq!(ApiError::Conflict("x".into()).error_code(), "CONFLICT");
        assert_eq!(ApiError::Unauthorized("x").error_code(), "UNAUTHORIZED");
        assert_eq!(ApiError::NotFound("x").error_code(), "NOT_FOUND");
        assert_eq!(ApiError::SignatureInvalid.error_code(), "SIGNATURE_INVALID");
        assert_eq!(ApiError::Upstream.error_code(), "UPSTREAM_ERROR");
        assert_eq!(ApiError::Internal.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_token_failures_collapse_to_one_message() {
        let from_expired: ApiError = RefreshTokenError::Expired.into();
        let from_revoked: ApiError = RefreshTokenError::Revoked.into();
        let from_missing: ApiError = RefreshTokenError::NotFound.into();

        assert_eq!(from_expired.to_string(), from_revoked.to_string());
        assert_eq!(from_revoked.to_string(), from_missing.to_string());
    }
}
