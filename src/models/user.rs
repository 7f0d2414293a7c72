// User Database Model
// Identity, role, and visibility configuration storage

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::users;

/// Account role enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    Candidate,
    Vendor,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Candidate => "candidate",
            UserRole::Vendor => "vendor",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candidate" => Ok(UserRole::Candidate),
            "vendor" => Ok(UserRole::Vendor),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

/// User database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub has_purchased_visibility: bool,
    pub membership_config: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion.
/// The id is generated by the caller so the username suffix can be derived
/// from it before the row exists.
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub role: String,
}

/// Errors for user operations
#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid user ID format")]
    InvalidId,

    #[error("Connection pool error")]
    Pool(String),
}

impl User {
    /// Find user by ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find user by email (case-insensitive)
    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email_str: &str,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;
        use diesel::PgTextExpressionMethods;

        users
            .filter(email.ilike(email_str))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find user by external Google account id
    pub async fn find_by_google_id(
        conn: &mut AsyncPgConnection,
        google_id_str: &str,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(google_id.eq(google_id_str))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Create a new user
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_user: NewUser,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::insert_into(users)
            .values(&new_user)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => UserError::EmailTaken,
                _ => UserError::Database(e),
            })
    }

    /// Attach a Google account id to an existing user
    pub async fn attach_google_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        google_id_str: &str,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set((google_id.eq(Some(google_id_str)), updated_at.eq(Utc::now())))
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Replace the stored visibility configuration.
    /// Always a full recomputation result, never an incremental patch.
    pub async fn store_membership_config(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        config: serde_json::Value,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set((
                membership_config.eq(Some(config)),
                has_purchased_visibility.eq(true),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Delete a user. Refresh tokens, payments, and the subscription row
    /// cascade with the user row (enforced by the schema).
    pub async fn delete(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<(), UserError> {
        use crate::schema::users::dsl::*;

        let deleted = diesel::delete(users.filter(id.eq(user_id)))
            .execute(conn)
            .await?;

        if deleted == 0 {
            return Err(UserError::NotFound);
        }

        Ok(())
    }

    /// Get user's role as enum, defaulting to candidate on bad stored data
    pub fn role_enum(&self) -> UserRole {
        UserRole::from_str(&self.role).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid role '{}' for user {}, defaulting to candidate: {}",
                self.role,
                self.id,
                e
            );
            UserRole::Candidate
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_role_conversion() {
        assert_eq!(UserRole::Candidate.as_str(), "candidate");
        assert_eq!(UserRole::Vendor.as_str(), "vendor");

        assert_eq!(UserRole::from_str("candidate"), Ok(UserRole::Candidate));
        assert_eq!(UserRole::from_str("vendor"), Ok(UserRole::Vendor));
        assert!(UserRole::from_str("admin").is_err());
    }

    #[test]
    fn test_role_enum_fallback() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            password_hash: Some("hash".to_string()),
            google_id: None,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            username: "test-user-1a2b3c4d".to_string(),
            role: "moderator".to_string(),
            is_active: true,
            has_purchased_visibility: false,
            membership_config: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(user.role_enum(), UserRole::Candidate);
        assert_eq!(user.full_name(), "Test User");
    }
}
