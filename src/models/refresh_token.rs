// Refresh Token Database Model
// Database storage for refresh tokens with revocation support.
//
// Rows are never physically deleted on logout or rotation; revocation is a
// timestamped state transition so the table doubles as an audit trail.
// Rotation safety under concurrent use relies on the conditional revoke
// (update filtered to active rows, affected count checked) rather than
// row locks.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::schema::refresh_tokens;

/// Refresh token database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = refresh_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub jti_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// New refresh token for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub jti_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Errors for refresh token operations
#[derive(thiserror::Error, Debug)]
pub enum RefreshTokenError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Token not found")]
    NotFound,

    #[error("Token expired")]
    Expired,

    #[error("Token revoked")]
    Revoked,

    #[error("Connection pool error")]
    Pool(String),
}

impl RefreshToken {
    /// Create SHA-256 hash of the token id for storage.
    /// JTIs are random UUIDs, so the raw value never needs to be queryable.
    pub fn hash_jti(jti: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(jti.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Store new refresh token hash in database
    pub async fn store(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
        jti: &str,
        expires_at_val: DateTime<Utc>,
    ) -> Result<Self, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();
        let new_token = NewRefreshToken {
            user_id: user_id_val,
            jti_hash: Self::hash_jti(jti),
            created_at: now,
            expires_at: expires_at_val,
        };

        diesel::insert_into(refresh_tokens)
            .values(&new_token)
            .get_result::<RefreshToken>(conn)
            .await
            .map_err(RefreshTokenError::Database)
    }

    /// Validate refresh token by JTI
    pub async fn validate(
        conn: &mut AsyncPgConnection,
        jti: &str,
    ) -> Result<Self, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let jti_hash_val = Self::hash_jti(jti);
        let now = Utc::now();

        let token = refresh_tokens
            .filter(jti_hash.eq(jti_hash_val))
            .first::<RefreshToken>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => RefreshTokenError::NotFound,
                _ => RefreshTokenError::Database(e),
            })?;

        if token.revoked_at.is_some() {
            return Err(RefreshTokenError::Revoked);
        }

        if token.expires_at <= now {
            return Err(RefreshTokenError::Expired);
        }

        Ok(token)
    }

    /// Conditionally revoke a token: the update only matches rows that are
    /// still active and unexpired, and the affected count reports whether
    /// this caller won. Two concurrent rotations of the same token race
    /// here; exactly one observes `true`.
    pub async fn revoke_if_active(
        conn: &mut AsyncPgConnection,
        jti: &str,
        reason: Option<&str>,
    ) -> Result<bool, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let jti_hash_val = Self::hash_jti(jti);
        let now = Utc::now();

        let updated = diesel::update(
            refresh_tokens
                .filter(jti_hash.eq(jti_hash_val))
                .filter(revoked_at.is_null())
                .filter(expires_at.gt(now)),
        )
        .set((
            revoked_at.eq(Some(now)),
            revoked_reason.eq(reason),
            updated_at.eq(now),
        ))
        .execute(conn)
        .await?;

        Ok(updated > 0)
    }

    /// Revoke all active refresh tokens for a user
    pub async fn revoke_all_for_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();

        let updated = diesel::update(
            refresh_tokens
                .filter(user_id.eq(user_id_val))
                .filter(revoked_at.is_null())
                .filter(expires_at.gt(now)),
        )
        .set((revoked_at.eq(Some(now)), updated_at.eq(now)))
        .execute(conn)
        .await?;

        Ok(updated)
    }

    /// Check if token is active (not expired and not revoked)
    pub fn is_active(&self) -> bool {
        let now = Utc::now();
        self.revoked_at.is_none() && self.expires_at > now
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_jti_hashing() {
        let jti1 = "test-jti-123";
        let jti2 = "test-jti-456";

        let hash1 = RefreshToken::hash_jti(jti1);
        let hash2 = RefreshToken::hash_jti(jti2);

        assert_ne!(hash1, hash2);

        // Same input should produce same hash
        let hash1_again = RefreshToken::hash_jti(jti1);
        assert_eq!(hash1, hash1_again);

        // Hash should be hex string
        assert!(hash1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash1.len(), 64); // SHA-256 produces 32 bytes = 64 hex chars
    }

    #[test]
    fn test_token_state_checks() {
        let now = Utc::now();

        let active_token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            jti_hash: "hash123".to_string(),
            created_at: now - Duration::hours(1),
            expires_at: now + Duration::hours(1),
            revoked_at: None,
            revoked_reason: None,
            updated_at: now,
        };

        assert!(active_token.is_active());
        assert!(!active_token.is_expired());
        assert!(!active_token.is_revoked());

        let expired_token = RefreshToken {
            expires_at: now - Duration::hours(1),
            ..active_token.clone()
        };

        assert!(!expired_token.is_active());
        assert!(expired_token.is_expired());
        assert!(!expired_token.is_revoked());

        let revoked_token = RefreshToken {
            revoked_at: Some(now - Duration::minutes(30)),
            revoked_reason: Some("rotation".to_string()),
            expires_at: now + Duration::hours(1),
            ..active_token.clone()
        };

        assert!(!revoked_token.is_active());
        assert!(!revoked_token.is_expired());
        assert!(revoked_token.is_revoked());
    }
}
