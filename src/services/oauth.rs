// Google OAuth authorization-code flow and account resolution
//
// The role hint survives the round trip through the provider's opaque
// state parameter as "<role>:<nonce>".

use diesel_async::AsyncPgConnection;
use rand::Rng;
use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

use crate::app_config::GoogleOAuthConfig;
use crate::models::user::{NewUser, User, UserError, UserRole};
use crate::utils::username::generate_username;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Code exchange rejected ({status}): {message}")]
    Exchange { status: u16, message: String },

    #[error("Malformed state parameter")]
    InvalidState,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("User error: {0}")]
    User(#[from] UserError),
}

/// Profile returned by the identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    /// Stable external account id
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// How an external identity mapped onto a local account.
/// The three branches are evaluated in strict order so a user who
/// registered by email first and signs in with Google later never ends up
/// with a duplicate account.
#[derive(Debug)]
pub enum OAuthResolution {
    /// An account already linked to this provider id
    LinkedExisting(User),
    /// An account matched by email; the provider id was attached to it
    LinkedByEmail(User),
    /// A brand-new account created from the provider profile
    Created(User),
}

impl OAuthResolution {
    pub fn user(&self) -> &User {
        match self {
            OAuthResolution::LinkedExisting(user)
            | OAuthResolution::LinkedByEmail(user)
            | OAuthResolution::Created(user) => user,
        }
    }

    pub fn into_user(self) -> User {
        match self {
            OAuthResolution::LinkedExisting(user)
            | OAuthResolution::LinkedByEmail(user)
            | OAuthResolution::Created(user) => user,
        }
    }

    pub fn is_new_account(&self) -> bool {
        matches!(self, OAuthResolution::Created(_))
    }
}

/// Encode the role hint into the provider state parameter
pub fn encode_state(role: UserRole) -> String {
    let nonce: u64 = rand::thread_rng().gen();
    format!("{}:{:016x}", role.as_str(), nonce)
}

/// Recover the role hint from the echoed state parameter
pub fn parse_state(state: &str) -> Result<UserRole, OAuthError> {
    let (role, nonce) = state.split_once(':').ok_or(OAuthError::InvalidState)?;
    if nonce.is_empty() {
        return Err(OAuthError::InvalidState);
    }
    UserRole::from_str(role).map_err(|_| OAuthError::InvalidState)
}

/// Client for Google's authorization-code flow
pub struct GoogleOAuthService {
    http_client: reqwest::Client,
    config: GoogleOAuthConfig,
}

impl GoogleOAuthService {
    pub fn new(config: GoogleOAuthConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            config,
        }
    }

    /// Build the provider authorization URL carrying the role hint
    pub fn authorization_url(&self, role: UserRole) -> (String, String) {
        let state = encode_state(role);
        let mut url = url::Url::parse(&self.config.auth_url)
            .expect("configured auth URL is valid");
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile")
            .append_pair("state", &state);

        (url.to_string(), state)
    }

    /// Exchange an authorization code for the user's profile
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleUserInfo, OAuthError> {
        let form = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!("Google code exchange failed ({}): {}", status, message);
            return Err(OAuthError::Exchange {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response.json().await?;

        let userinfo = self
            .http_client
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        let status = userinfo.status();
        if !status.is_success() {
            let message = userinfo.text().await.unwrap_or_default();
            return Err(OAuthError::Exchange {
                status: status.as_u16(),
                message,
            });
        }

        Ok(userinfo.json::<GoogleUserInfo>().await?)
    }
}

/// Map an external identity to a local account, creating or linking as
/// needed. Branch order matters: provider id first, email second,
/// creation last.
pub async fn resolve_account(
    conn: &mut AsyncPgConnection,
    info: &GoogleUserInfo,
    role_hint: UserRole,
) -> Result<OAuthResolution, OAuthError> {
    // (a) already linked to this provider id
    match User::find_by_google_id(conn, &info.sub).await {
        Ok(user) => return Ok(OAuthResolution::LinkedExisting(user)),
        Err(UserError::NotFound) => {},
        Err(e) => return Err(e.into()),
    }

    // (b) same email registered earlier: attach the provider id
    match User::find_by_email(conn, &info.email).await {
        Ok(user) => {
            if !user.is_active {
                return Err(OAuthError::AccountDeactivated);
            }
            let linked = User::attach_google_id(conn, user.id, &info.sub).await?;
            return Ok(OAuthResolution::LinkedByEmail(linked));
        },
        Err(UserError::NotFound) => {},
        Err(e) => return Err(e.into()),
    }

    // (c) first time: create the account with no password
    let user_id = Uuid::new_v4();
    let first_name = if info.given_name.is_empty() {
        info.email
            .split('@')
            .next()
            .unwrap_or("member")
            .to_string()
    } else {
        info.given_name.clone()
    };
    let last_name = info.family_name.clone();

    let new_user = NewUser {
        id: user_id,
        email: info.email.to_lowercase(),
        password_hash: None,
        google_id: Some(info.sub.clone()),
        username: generate_username(&first_name, &last_name, &user_id),
        first_name,
        last_name,
        role: role_hint.as_str().to_string(),
    };

    let created = User::create(conn, new_user).await?;
    Ok(OAuthResolution::Created(created))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        let state = encode_state(UserRole::Vendor);
        assert!(state.starts_with("vendor:"));
        assert_eq!(parse_state(&state).unwrap(), UserRole::Vendor);

        let state = encode_state(UserRole::Candidate);
        assert_eq!(parse_state(&state).unwrap(), UserRole::Candidate);
    }

    #[test]
    fn test_state_rejects_malformed_values() {
        assert!(matches!(parse_state("vendor"), Err(OAuthError::InvalidState)));
        assert!(matches!(parse_state("vendor:"), Err(OAuthError::InvalidState)));
        assert!(matches!(
            parse_state("admin:deadbeef"),
            Err(OAuthError::InvalidState)
        ));
        assert!(matches!(parse_state(""), Err(OAuthError::InvalidState)));
    }

    #[test]
    fn test_authorization_url_carries_role_state() {
        let service = GoogleOAuthService::new(GoogleOAuthConfig {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8080/api/v1/auth/google/callback".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
        });

        let (auth_url, state) = service.authorization_url(UserRole::Candidate);

        let parsed = url::Url::parse(&auth_url).unwrap();
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().collect();
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["state"], state.as_str());
        assert_eq!(parse_state(&state).unwrap(), UserRole::Candidate);
    }
}
