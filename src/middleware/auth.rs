// Authentication middleware for protected routes
// Validates JWT tokens and injects a typed AuthenticatedUser into request
// extensions; handlers receive the validated identity value, never raw
// claims.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use crate::{app::AppState, models::user::UserRole};

/// Authenticated identity extracted once from the access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub token_id: String,
    pub email: String,
    pub role: UserRole,
    pub plan: String,
    pub username: String,
    pub exp: u64,
}

impl AuthenticatedUser {
    pub fn is_candidate(&self) -> bool {
        self.role == UserRole::Candidate
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "message": message
        })),
    )
        .into_response()
}

/// Middleware function that validates JWT tokens and adds AuthenticatedUser to extensions
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return unauthorized("Missing or invalid authorization header"),
    };

    match app_state.jwt_service.validate_access_token(token) {
        Ok(claims) => {
            let user_id = match Uuid::parse_str(&claims.sub) {
                Ok(id) => id,
                Err(_) => return unauthorized("Invalid or expired token"),
            };
            let role = match UserRole::from_str(&claims.role) {
                Ok(role) => role,
                Err(_) => return unauthorized("Invalid or expired token"),
            };

            let auth_user = AuthenticatedUser {
                user_id,
                token_id: claims.jti,
                email: claims.email,
                role,
                plan: claims.plan,
                username: claims.username,
                exp: claims.exp,
            };

            request.extensions_mut().insert(auth_user);

            next.run(request).await
        },
        Err(e) => {
            tracing::warn!("JWT validation failed: {}", e);
            unauthorized("Invalid or expired token")
        },
    }
}

/// Extractor for AuthenticatedUser from request extensions
/// This allows handlers to use Extension<AuthenticatedUser> in their parameters
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "success": false,
                        "message": "Authentication required"
                    })),
                )
            })
    }
}
