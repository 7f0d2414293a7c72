// Authentication handlers: registration, login, refresh rotation, logout,
// account deletion, and Google OAuth login/linking

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        subscription::{PlanTier, Subscription, SubscriptionError},
        user::{NewUser, User, UserError, UserRole},
    },
    services::{email::EmailService, oauth},
    utils::{
        errors::{log_auth_failure, ApiError},
        generate_username, hash_password, trim_and_validate_field, verify_password,
    },
};

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 320, message = "Email must be less than 320 characters"))]
    pub email: String,

    #[validate(custom(function = "validate_password"))]
    pub password: String,

    pub password_confirmation: String,

    #[validate(length(
        min = 1,
        max = 255,
        message = "First name must be between 1 and 255 characters"
    ))]
    pub first_name: String,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Last name must be between 1 and 255 characters"
    ))]
    pub last_name: String,

    /// `candidate` or `vendor`
    pub role: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleStartParams {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackParams {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenResponse,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub role: String,
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub role: String,
    pub plan: String,
    pub has_purchased_visibility: bool,
    pub membership_config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct GoogleStartResponse {
    pub auth_url: String,
}

/// Custom password validation - min 8 chars, must have uppercase, lowercase, number, special char
fn validate_password(password: &str) -> Result<(), validator::ValidationError> {
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if password.len() < 8 {
        return Err(validator::ValidationError::new("password_too_short"));
    }

    if !has_uppercase || !has_lowercase || !has_digit || !has_special {
        return Err(validator::ValidationError::new("password_complexity"));
    }

    Ok(())
}

/// Flatten validator errors into one user-facing message
fn validation_message(errors: validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect::<Vec<String>>()
        .join(", ")
}

/// Look up the user's current plan, defaulting to free when no
/// subscription row exists yet
async fn plan_for_user(
    conn: &mut diesel_async::AsyncPgConnection,
    user_id: Uuid,
) -> Result<String, ApiError> {
    match Subscription::find_by_user_id(conn, user_id).await {
        Ok(subscription) => Ok(subscription.plan),
        Err(SubscriptionError::NotFound) => Ok(PlanTier::Free.as_str().to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Issue an access/refresh pair for a user
async fn issue_token_pair(
    state: &AppState,
    user: &User,
    plan: &str,
) -> Result<TokenResponse, ApiError> {
    let access_token = state
        .jwt_service
        .generate_access_token(user, plan)
        .map_err(|e| {
            tracing::error!("Failed to generate access token: {}", e);
            ApiError::Internal
        })?;

    let refresh_token = state
        .jwt_service
        .generate_refresh_token(user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to generate refresh token: {}", e);
            ApiError::Internal
        })?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        expires_in: state.jwt_service.access_token_expiry(),
        token_type: "Bearer".to_string(),
    })
}

fn user_summary(user: &User, plan: &str) -> UserSummary {
    UserSummary {
        id: user.id.to_string(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
        role: user.role.clone(),
        plan: plan.to_string(),
    }
}

fn spawn_welcome_email(email_service: &Arc<EmailService>, user: &User) {
    let email_service = Arc::clone(email_service);
    let to_email = user.email.clone();
    let name = user.first_name.clone();
    tokio::spawn(async move {
        if let Err(e) = email_service.send_welcome_email(&to_email, &name).await {
            tracing::warn!("Failed to send welcome email to {}: {}", to_email, e);
        }
    });
}

// =============================================================================
// AUTHENTICATION HANDLERS
// =============================================================================

/// POST /auth/register - Register a new account with email and password
pub async fn register(
    State(state): State<AppState>,
    Json(register_req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(validation_errors) = register_req.validate() {
        return Err(ApiError::Validation(validation_message(validation_errors)));
    }

    if register_req.password != register_req.password_confirmation {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }

    let role = UserRole::from_str(register_req.role.trim())
        .map_err(|_| ApiError::Validation("Role must be 'candidate' or 'vendor'".to_string()))?;

    let first_name = trim_and_validate_field(&register_req.first_name, true)
        .map_err(|_| ApiError::Validation("First name cannot be empty".to_string()))?;
    let last_name = trim_and_validate_field(&register_req.last_name, true)
        .map_err(|_| ApiError::Validation("Last name cannot be empty".to_string()))?;
    let email = register_req.email.trim().to_lowercase();

    let mut conn = state.db_conn().await?;

    // Email uniqueness holds across active and inactive accounts
    match User::find_by_email(&mut conn, &email).await {
        Ok(_) => {
            return Err(ApiError::Conflict(
                "An account with this email address already exists".to_string(),
            ));
        },
        Err(UserError::NotFound) => {},
        Err(e) => return Err(e.into()),
    }

    let password_hash = hash_password(&register_req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::Internal
    })?;

    // Generate the id up front so the username suffix derives from it
    let user_id = Uuid::new_v4();
    let new_user = NewUser {
        id: user_id,
        email,
        password_hash: Some(password_hash),
        google_id: None,
        username: generate_username(&first_name, &last_name, &user_id),
        first_name,
        last_name,
        role: role.as_str().to_string(),
    };

    let created_user = User::create(&mut conn, new_user).await?;

    // Default free-tier subscription, created eagerly at registration
    let subscription = Subscription::create_default(&mut conn, created_user.id).await?;
    drop(conn);

    let tokens = issue_token_pair(&state, &created_user, &subscription.plan).await?;

    spawn_welcome_email(&state.email_service, &created_user);

    tracing::info!("New user registered: {}", created_user.email);

    let response = AuthResponse {
        success: true,
        data: Some(LoginResponse {
            user: user_summary(&created_user, &subscription.plan),
            tokens,
        }),
        message: "Registration successful".to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login - Authenticate with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(login_req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = login_req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::invalid_credentials());
    }

    let mut conn = state.db_conn().await?;

    let user = match User::find_by_email(&mut conn, &email).await {
        Ok(user) => user,
        Err(UserError::NotFound) => {
            let err = ApiError::invalid_credentials();
            log_auth_failure(&email, &err);
            return Err(err);
        },
        Err(e) => return Err(e.into()),
    };

    if !user.is_active {
        let err = ApiError::Unauthorized("Account is deactivated");
        log_auth_failure(&email, &err);
        return Err(err);
    }

    // OAuth-only accounts carry no password hash and cannot log in this way
    let stored_hash = match &user.password_hash {
        Some(hash) => hash,
        None => {
            let err = ApiError::invalid_credentials();
            log_auth_failure(&email, &err);
            return Err(err);
        },
    };

    match verify_password(&login_req.password, stored_hash) {
        Ok(true) => {},
        Ok(false) => {
            let err = ApiError::invalid_credentials();
            log_auth_failure(&email, &err);
            return Err(err);
        },
        Err(e) => {
            tracing::error!("Password verification error: {}", e);
            return Err(ApiError::Internal);
        },
    }

    let plan = plan_for_user(&mut conn, user.id).await?;
    drop(conn);

    let tokens = issue_token_pair(&state, &user, &plan).await?;

    tracing::info!("Login successful for {}", user.email);

    let response = AuthResponse {
        success: true,
        data: Some(LoginResponse {
            user: user_summary(&user, &plan),
            tokens,
        }),
        message: "Login successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// POST /auth/refresh - Rotate the refresh token and mint a new pair.
/// The presented token is revoked on use; a replay fails as unauthorized.
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(refresh_req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (access_token, refresh_token) = state
        .jwt_service
        .rotate_refresh_token(&refresh_req.refresh_token)
        .await?;

    let response = AuthResponse {
        success: true,
        data: Some(TokenResponse {
            access_token,
            refresh_token,
            expires_in: state.jwt_service.access_token_expiry(),
            token_type: "Bearer".to_string(),
        }),
        message: "Token refreshed successfully".to_string(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// POST /auth/logout - Revoke the presented refresh token.
/// Idempotent: an unknown or already-revoked token is a successful no-op.
pub async fn logout(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(logout_req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state
        .jwt_service
        .revoke_refresh_token(&logout_req.refresh_token)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Logout revocation failed for {}: {}", user.email, e);
            false
        });

    let response = AuthResponse::<()> {
        success: true,
        data: None,
        message: if revoked {
            "Logout successful".to_string()
        } else {
            "Logout successful (token was already inactive)".to_string()
        },
    };

    Ok((StatusCode::OK, Json(response)))
}

/// GET /auth/me - Get current user information
pub async fn get_current_user(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = state.db_conn().await?;

    let db_user = User::find_by_id(&mut conn, user.user_id).await?;
    let plan = plan_for_user(&mut conn, db_user.id).await?;

    let user_info = UserInfo {
        id: db_user.id.to_string(),
        email: db_user.email,
        first_name: db_user.first_name,
        last_name: db_user.last_name,
        username: db_user.username,
        role: db_user.role,
        plan,
        has_purchased_visibility: db_user.has_purchased_visibility,
        membership_config: db_user.membership_config,
    };

    let response = AuthResponse {
        success: true,
        data: Some(user_info),
        message: "User info retrieved successfully".to_string(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// DELETE /auth/account - Delete the authenticated account.
/// Refresh tokens, payments, and the subscription row cascade with it.
pub async fn delete_account(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = state.db_conn().await?;

    User::delete(&mut conn, user.user_id).await?;

    tracing::info!("Account deleted: {}", user.email);

    let response = AuthResponse::<()> {
        success: true,
        data: None,
        message: "Account deleted".to_string(),
    };

    Ok((StatusCode::OK, Json(response)))
}

// =============================================================================
// GOOGLE OAUTH HANDLERS
// =============================================================================

/// GET /auth/google?role= - Start the Google OAuth flow.
/// Returns the provider authorization URL carrying the role hint in state.
pub async fn google_auth_start(
    State(state): State<AppState>,
    Query(params): Query<GoogleStartParams>,
) -> Result<impl IntoResponse, ApiError> {
    let role = match params.role.as_deref() {
        None => UserRole::Candidate,
        Some(raw) => UserRole::from_str(raw)
            .map_err(|_| ApiError::Validation("Role must be 'candidate' or 'vendor'".to_string()))?,
    };

    let (auth_url, _state) = state.oauth_service.authorization_url(role);

    let response = AuthResponse {
        success: true,
        data: Some(GoogleStartResponse { auth_url }),
        message: "Authorization URL generated".to_string(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// GET /auth/google/callback - Complete the Google OAuth flow.
/// Resolves the external identity onto a local account (link-or-create)
/// and issues a token pair.
pub async fn google_auth_callback(
    State(state): State<AppState>,
    Query(params): Query<GoogleCallbackParams>,
) -> Result<impl IntoResponse, ApiError> {
    let role_hint = oauth::parse_state(&params.state)?;

    let profile = state.oauth_service.exchange_code(&params.code).await?;

    let mut conn = state.db_conn().await?;
    let resolution = oauth::resolve_account(&mut conn, &profile, role_hint).await?;

    if !resolution.user().is_active {
        return Err(ApiError::Unauthorized("Account is deactivated"));
    }

    let is_new = resolution.is_new_account();
    let user = resolution.into_user();

    if is_new {
        Subscription::create_default(&mut conn, user.id).await?;
        spawn_welcome_email(&state.email_service, &user);
    }

    let plan = plan_for_user(&mut conn, user.id).await?;
    drop(conn);

    let tokens = issue_token_pair(&state, &user, &plan).await?;

    tracing::info!(
        "Google OAuth {} for {}",
        if is_new { "signup" } else { "login" },
        user.email
    );

    let response = AuthResponse {
        success: true,
        data: Some(LoginResponse {
            user: user_summary(&user, &plan),
            tokens,
        }),
        message: "Login successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_validation_rules() {
        assert!(validate_password("Sh0rt!").is_err());
        assert!(validate_password("alllowercase1!").is_err());
        assert!(validate_password("ALLUPPERCASE1!").is_err());
        assert!(validate_password("NoDigitsHere!").is_err());
        assert!(validate_password("NoSpecials123").is_err());
        assert!(validate_password("Valid-Passw0rd").is_ok());
    }

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            email: "jane@example.com".to_string(),
            password: "Valid-Passw0rd".to_string(),
            password_confirmation: "Valid-Passw0rd".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            role: "candidate".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..valid_request()
        };
        assert!(bad_email.validate().is_err());

        let empty_name = RegisterRequest {
            first_name: "".to_string(),
            ..valid_request()
        };
        assert!(empty_name.validate().is_err());
    }

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            email: "jane@example.com".to_string(),
            password: "Valid-Passw0rd".to_string(),
            password_confirmation: "Valid-Passw0rd".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            role: "candidate".to_string(),
        }
    }

    #[test]
    fn test_validation_message_flattens_fields() {
        let request = RegisterRequest {
            email: "nope".to_string(),
            first_name: "".to_string(),
            ..valid_request()
        };

        let message = validation_message(request.validate().unwrap_err());
        assert!(message.contains("email"));
        assert!(message.contains("first_name"));
    }
}
