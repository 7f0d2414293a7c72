// JWT Token Generation Service with Diesel Integration
// HS256 access/refresh pairs with rotation-on-use refresh semantics

use diesel_async::AsyncPgConnection;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::auth::{AccessTokenClaims, RefreshTokenClaims};
use crate::models::refresh_token::{RefreshToken, RefreshTokenError};
use crate::models::subscription::{PlanTier, Subscription};
use crate::models::user::{User, UserError};

// Error types for JWT operations
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    EncodingError(String),

    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Database error: {0}")]
    DatabaseError(#[from] RefreshTokenError),

    #[error("User error: {0}")]
    UserError(#[from] UserError),

    #[error("Pool error: {0}")]
    PoolError(String),

    #[error("Diesel error: {0}")]
    DieselError(#[from] diesel::result::Error),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        // Expired, malformed, and bad-signature tokens are deliberately
        // indistinguishable to callers
        JwtError::InvalidToken
    }
}

// JWT Configuration with separate keys for access and refresh tokens
#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_expiry: u64,
    pub refresh_token_expiry: u64,
    pub algorithm: Algorithm,

    pub audience: String,
    pub issuer: String,

    pub access_encoding_key: EncodingKey,
    pub access_decoding_key: DecodingKey,

    pub refresh_encoding_key: EncodingKey,
    pub refresh_decoding_key: DecodingKey,

    // Key versioning for rotation
    pub key_version: u32,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("algorithm", &self.algorithm)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("access_encoding_key", &"<redacted>")
            .field("access_decoding_key", &"<redacted>")
            .field("refresh_encoding_key", &"<redacted>")
            .field("refresh_decoding_key", &"<redacted>")
            .field("key_version", &self.key_version)
            .finish()
    }
}

impl JwtConfig {
    /// Build JWT config from provided parameters - shared logic for from_env and for_test
    fn build_from_params(
        access_secret: &str,
        refresh_secret: &str,
        access_expiry: u64,
        refresh_expiry: u64,
        audience: String,
        issuer: String,
        key_version: u32,
    ) -> Self {
        JwtConfig {
            access_token_expiry: access_expiry,
            refresh_token_expiry: refresh_expiry,
            algorithm: Algorithm::HS256,
            audience,
            issuer,
            access_encoding_key: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(refresh_secret.as_bytes()),
            key_version,
        }
    }

    /// Create JWT config from centralized app configuration
    pub fn from_env() -> Self {
        let crate::app_config::JwtConfig {
            access_secret,
            refresh_secret,
            access_expiry,
            refresh_expiry,
            audience,
            issuer,
            key_version,
        } = &crate::app_config::config().jwt;

        Self::build_from_params(
            access_secret,
            refresh_secret,
            *access_expiry,
            *refresh_expiry,
            audience.clone(),
            issuer.clone(),
            *key_version,
        )
    }

    /// Create JWT config for tests without touching the environment
    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::build_from_params(
            "test-access-secret-hs256",
            "test-refresh-secret-hs256",
            3600,   // 1 hour
            604800, // 7 days
            "test.hirepath.io".to_string(),
            "test.hirepath.io".to_string(),
            1,
        )
    }
}

// JWT Service with Diesel database integration
pub struct JwtService {
    config: JwtConfig,
    db_pool: Option<DieselPool>,
}

impl JwtService {
    /// Create new JWT service with configuration only (no refresh persistence)
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config,
            db_pool: None,
        }
    }

    /// Create new JWT service with Diesel database integration
    pub fn new_with_diesel(config: JwtConfig, db_pool: DieselPool) -> Self {
        Self {
            config,
            db_pool: Some(db_pool),
        }
    }

    /// Create JWT service from environment with Diesel
    pub fn from_env_with_diesel(db_pool: DieselPool) -> Self {
        Self::new_with_diesel(JwtConfig::from_env(), db_pool)
    }

    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    fn require_db_pool(&self) -> Result<&DieselPool, JwtError> {
        self.db_pool
            .as_ref()
            .ok_or_else(|| JwtError::PoolError("Database pool not configured".to_string()))
    }

    fn now_secs() -> Result<u64, JwtError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|e| JwtError::KeyGenerationError(e.to_string()))
    }

    /// Generate access token embedding identity, role, and plan claims
    pub fn generate_access_token(&self, user: &User, plan: &str) -> Result<String, JwtError> {
        let now = Self::now_secs()?;

        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            plan: plan.to_string(),
            username: user.username.clone(),
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now + self.config.access_token_expiry,
        };

        let mut header = Header::new(self.config.algorithm);
        header.kid = Some(self.config.key_version.to_string());

        encode(&header, &claims, &self.config.access_encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Generate refresh token and persist its id hash
    pub async fn generate_refresh_token(&self, user_id: Uuid) -> Result<String, JwtError> {
        let pool = self.require_db_pool()?;
        let mut conn = pool
            .get()
            .await
            .map_err(|e| JwtError::PoolError(e.to_string()))?;

        self.issue_refresh_token(&mut conn, user_id).await
    }

    /// Issue and persist a refresh token on an existing connection
    /// (used inside the rotation transaction)
    async fn issue_refresh_token(
        &self,
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<String, JwtError> {
        let now = Self::now_secs()?;
        let jti = Uuid::new_v4().to_string();

        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            jti: jti.clone(),
            iat: now,
            exp: now + self.config.refresh_token_expiry,
        };

        let expires_at =
            chrono::Utc::now() + chrono::Duration::seconds(self.config.refresh_token_expiry as i64);
        RefreshToken::store(conn, user_id, &jti, expires_at).await?;

        let mut header = Header::new(self.config.algorithm);
        header.kid = Some(self.config.key_version.to_string());

        encode(&header, &claims, &self.config.refresh_encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Validates an access token and returns the decoded claims.
    /// Every failure mode collapses to `JwtError::InvalidToken`.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;

        let token_data =
            decode::<AccessTokenClaims>(token, &self.config.access_decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    /// Decode refresh token claims (signature + expiry only; the database
    /// state check happens in the rotation transaction)
    fn decode_refresh_claims(&self, token: &str) -> Result<RefreshTokenClaims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let token_data =
            decode::<RefreshTokenClaims>(token, &self.config.refresh_decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    /// Rotate a refresh token: revoke the presented token and issue a fresh
    /// pair, all inside one transaction. The revoke is a conditional update
    /// on the active row; of two concurrent rotations of the same token,
    /// exactly one observes the update and wins.
    pub async fn rotate_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<(String, String), JwtError> {
        let claims = self.decode_refresh_claims(refresh_token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken)?;

        let pool = self.require_db_pool()?;
        let mut conn = pool
            .get()
            .await
            .map_err(|e| JwtError::PoolError(e.to_string()))?;

        use diesel_async::AsyncConnection;
        let jti = claims.jti.clone();
        conn.transaction::<_, JwtError, _>(|tx| {
            Box::pin(async move {
                // Reject absent, revoked, and expired tokens uniformly
                RefreshToken::validate(tx, &jti).await.map_err(|e| match e {
                    RefreshTokenError::NotFound
                    | RefreshTokenError::Revoked
                    | RefreshTokenError::Expired => JwtError::InvalidToken,
                    other => JwtError::DatabaseError(other),
                })?;

                // The race guard: only the caller whose update lands wins
                let won = RefreshToken::revoke_if_active(tx, &jti, Some("rotation")).await?;
                if !won {
                    return Err(JwtError::InvalidToken);
                }

                let user = User::find_by_id(tx, user_id).await.map_err(|e| match e {
                    UserError::NotFound => JwtError::InvalidToken,
                    other => JwtError::UserError(other),
                })?;

                let plan = match Subscription::find_by_user_id(tx, user.id).await {
                    Ok(subscription) => subscription.plan,
                    Err(_) => PlanTier::Free.as_str().to_string(),
                };

                let new_access_token = self.generate_access_token(&user, &plan)?;
                let new_refresh_token = self.issue_refresh_token(tx, user.id).await?;

                Ok((new_access_token, new_refresh_token))
            })
        })
        .await
    }

    /// Revoke the presented refresh token if it is currently active.
    /// Idempotent: unknown, malformed, or already-revoked tokens are a no-op.
    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<bool, JwtError> {
        let claims = match self.decode_refresh_claims(refresh_token) {
            Ok(claims) => claims,
            Err(_) => return Ok(false),
        };

        let pool = self.require_db_pool()?;
        let mut conn = pool
            .get()
            .await
            .map_err(|e| JwtError::PoolError(e.to_string()))?;

        Ok(RefreshToken::revoke_if_active(&mut conn, &claims.jti, Some("logout")).await?)
    }

    /// Revoke all refresh tokens for a user
    pub async fn revoke_all_user_tokens(&self, user_id: Uuid) -> Result<usize, JwtError> {
        let pool = self.require_db_pool()?;
        let mut conn = pool
            .get()
            .await
            .map_err(|e| JwtError::PoolError(e.to_string()))?;

        Ok(RefreshToken::revoke_all_for_user(&mut conn, user_id).await?)
    }
}
