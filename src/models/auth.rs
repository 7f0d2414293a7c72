// JWT claims structures for access and refresh tokens

use serde::{Deserialize, Serialize};

/// Access token claims structure
/// Contains user identification, role, and plan information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// User ID (subject)
    pub sub: String,

    /// JWT ID for token revocation (UUID format)
    pub jti: String,

    /// User email address
    pub email: String,

    /// Account role (candidate, vendor)
    pub role: String,

    /// Subscription plan (free, pro)
    pub plan: String,

    /// Generated URL-safe username
    pub username: String,

    /// Audience (aud)
    pub aud: String,

    /// Issuer (iss)
    pub iss: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,

    /// Expires at timestamp (Unix epoch seconds)
    pub exp: u64,
}

/// Refresh token claims structure
/// Contains minimal information for token refresh and revocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshTokenClaims {
    /// User ID (subject)
    pub sub: String,

    /// JWT ID for token revocation (UUID format)
    pub jti: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,

    /// Expires at timestamp (Unix epoch seconds)
    pub exp: u64,
}

impl AccessTokenClaims {
    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.exp < now
    }
}

impl RefreshTokenClaims {
    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.exp < now
    }
}
