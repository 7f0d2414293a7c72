// Subscription Database Model
// One row per user; reconciled from Stripe webhook events

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::subscriptions;

/// Plan tier enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlanTier {
    Free,
    Pro,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
        }
    }

    /// Resolve a plan tier from a Stripe price id.
    /// Unrecognized price ids map to the free tier with a warning.
    pub fn from_price_id(price_id: &str, pro_price_id: &str) -> Self {
        if !pro_price_id.is_empty() && price_id == pro_price_id {
            PlanTier::Pro
        } else {
            tracing::warn!("Unrecognized Stripe price id '{}', treating as free", price_id);
            PlanTier::Free
        }
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "pro" => Ok(PlanTier::Pro),
            _ => Err(format!("Invalid plan tier: {}", s)),
        }
    }
}

/// Subscription database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New subscription for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub stripe_customer_id: Option<String>,
}

/// Fields updated when reconciling a Stripe subscription event
#[derive(Debug, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionUpdate {
    pub plan: Option<String>,
    pub status: Option<String>,
    pub stripe_subscription_id: Option<Option<String>>,
    pub stripe_price_id: Option<Option<String>>,
    pub current_period_end: Option<Option<DateTime<Utc>>>,
    pub updated_at: DateTime<Utc>,
}

/// Errors for subscription operations
#[derive(thiserror::Error, Debug)]
pub enum SubscriptionError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Subscription not found")]
    NotFound,
}

impl Subscription {
    /// Create the default free-tier subscription for a user
    pub async fn create_default(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<Self, SubscriptionError> {
        use crate::schema::subscriptions::dsl::*;

        let new_subscription = NewSubscription {
            user_id: user_id_val,
            plan: PlanTier::Free.as_str().to_string(),
            status: "active".to_string(),
            stripe_customer_id: None,
        };

        diesel::insert_into(subscriptions)
            .values(&new_subscription)
            .get_result::<Subscription>(conn)
            .await
            .map_err(SubscriptionError::Database)
    }

    /// Find the subscription row for a user
    pub async fn find_by_user_id(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<Self, SubscriptionError> {
        use crate::schema::subscriptions::dsl::*;

        subscriptions
            .filter(user_id.eq(user_id_val))
            .first::<Subscription>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => SubscriptionError::NotFound,
                _ => SubscriptionError::Database(e),
            })
    }

    /// Find the subscription row matching an external billing customer id
    pub async fn find_by_stripe_customer_id(
        conn: &mut AsyncPgConnection,
        customer_id: &str,
    ) -> Result<Self, SubscriptionError> {
        use crate::schema::subscriptions::dsl::*;

        subscriptions
            .filter(stripe_customer_id.eq(customer_id))
            .first::<Subscription>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => SubscriptionError::NotFound,
                _ => SubscriptionError::Database(e),
            })
    }

    /// Store the Stripe customer id created lazily on first checkout
    pub async fn set_stripe_customer_id(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
        customer_id: &str,
    ) -> Result<Self, SubscriptionError> {
        use crate::schema::subscriptions::dsl::*;

        diesel::update(subscriptions.filter(user_id.eq(user_id_val)))
            .set((
                stripe_customer_id.eq(Some(customer_id)),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<Subscription>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => SubscriptionError::NotFound,
                _ => SubscriptionError::Database(e),
            })
    }

    /// Apply a reconciliation update, matched by Stripe customer id
    pub async fn apply_update_by_customer_id(
        conn: &mut AsyncPgConnection,
        customer_id: &str,
        update: SubscriptionUpdate,
    ) -> Result<Self, SubscriptionError> {
        use crate::schema::subscriptions::dsl::*;

        diesel::update(subscriptions.filter(stripe_customer_id.eq(customer_id)))
            .set(&update)
            .get_result::<Subscription>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => SubscriptionError::NotFound,
                _ => SubscriptionError::Database(e),
            })
    }

    /// Reset a subscription to the free tier after external cancellation
    pub async fn reset_to_free_by_customer_id(
        conn: &mut AsyncPgConnection,
        customer_id: &str,
    ) -> Result<Self, SubscriptionError> {
        let update = SubscriptionUpdate {
            plan: Some(PlanTier::Free.as_str().to_string()),
            status: Some("active".to_string()),
            stripe_subscription_id: Some(None),
            stripe_price_id: Some(None),
            current_period_end: Some(None),
            updated_at: Utc::now(),
        };

        Self::apply_update_by_customer_id(conn, customer_id, update).await
    }

    /// Get subscription plan as enum, defaulting to free on bad stored data
    pub fn plan_enum(&self) -> PlanTier {
        PlanTier::from_str(&self.plan).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid plan '{}' for subscription {}, defaulting to free: {}",
                self.plan,
                self.id,
                e
            );
            PlanTier::Free
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tier_conversion() {
        assert_eq!(PlanTier::Free.as_str(), "free");
        assert_eq!(PlanTier::Pro.as_str(), "pro");

        assert_eq!(PlanTier::from_str("free"), Ok(PlanTier::Free));
        assert_eq!(PlanTier::from_str("pro"), Ok(PlanTier::Pro));
        assert!(PlanTier::from_str("enterprise").is_err());
    }

    #[test]
    fn test_plan_resolution_from_price_id() {
        assert_eq!(
            PlanTier::from_price_id("price_pro_123", "price_pro_123"),
            PlanTier::Pro
        );
        assert_eq!(
            PlanTier::from_price_id("price_other", "price_pro_123"),
            PlanTier::Free
        );
        // Empty configured price id never matches
        assert_eq!(PlanTier::from_price_id("", ""), PlanTier::Free);
    }
}
