// Billing orchestration: checkout-session creation and webhook-driven
// state reconciliation against Stripe.
//
// Webhook handling never trusts delivery order or uniqueness. Subscription
// rows are matched on the external customer id, one-time purchases are
// keyed by the checkout-session id (unique constraint), and the visibility
// configuration is always recomputed from the full payment history.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::app_config::StripeConfig;
use crate::db::DieselPool;
use crate::models::payment::{
    CandidatePayment, JobDomain, NewCandidatePayment, PackageType, PaymentError,
};
use crate::models::subscription::{
    PlanTier, Subscription, SubscriptionError, SubscriptionUpdate,
};
use crate::models::user::{User, UserError};
use crate::services::email::EmailService;
use crate::services::stripe::{
    CheckoutLineItem, CheckoutMode, CheckoutSession, CheckoutSessionParams, StripeClient,
    StripeError, StripeEvent, StripeEventType,
};
use crate::services::visibility::{self, VisibilityError};

// One-time visibility package pricing, in cents
const BASE_PACKAGE_PRICE_CENTS: i64 = 4900;
const SUBDOMAIN_ADDON_PRICE_CENTS: i64 = 1900;
const SINGLE_DOMAIN_BUNDLE_PRICE_CENTS: i64 = 9900;
const FULL_BUNDLE_PRICE_CENTS: i64 = 14900;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("User error: {0}")]
    User(#[from] UserError),

    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    #[error("Visibility recompute failed: {0}")]
    Visibility(#[from] VisibilityError),

    #[error("Webhook payload missing field: {0}")]
    MissingField(&'static str),

    #[error("Webhook payload malformed: {0}")]
    MalformedPayload(String),
}

/// Checkout-session object fields used from `checkout.session.completed`
#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    mode: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

/// Subscription object fields used from `customer.subscription.*`
#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: String,
    status: String,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    items: SubscriptionItems,
}

#[derive(Debug, Default, Deserialize)]
struct SubscriptionItems {
    #[serde(default)]
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: SubscriptionPrice,
}

#[derive(Debug, Deserialize)]
struct SubscriptionPrice {
    id: String,
}

/// Billing orchestrator consuming the payment gateway and the store
pub struct BillingService {
    db_pool: DieselPool,
    stripe: Arc<StripeClient>,
    email: Arc<EmailService>,
    config: StripeConfig,
}

impl BillingService {
    pub fn new(
        db_pool: DieselPool,
        stripe: Arc<StripeClient>,
        email: Arc<EmailService>,
        config: StripeConfig,
    ) -> Self {
        Self {
            db_pool,
            stripe,
            email,
            config,
        }
    }

    async fn conn(
        &self,
    ) -> Result<
        bb8::PooledConnection<
            '_,
            diesel_async::pooled_connection::AsyncDieselConnectionManager<
                diesel_async::AsyncPgConnection,
            >,
        >,
        BillingError,
    > {
        self.db_pool
            .get()
            .await
            .map_err(|e| BillingError::Pool(e.to_string()))
    }

    /// Make sure the user has a Stripe customer, creating one lazily
    async fn ensure_stripe_customer(&self, user: &User) -> Result<String, BillingError> {
        let mut conn = self.conn().await?;

        let subscription = match Subscription::find_by_user_id(&mut conn, user.id).await {
            Ok(subscription) => subscription,
            Err(SubscriptionError::NotFound) => {
                Subscription::create_default(&mut conn, user.id).await?
            },
            Err(e) => return Err(e.into()),
        };

        if let Some(customer_id) = subscription.stripe_customer_id {
            return Ok(customer_id);
        }

        let customer = self
            .stripe
            .create_customer(&user.email, &user.full_name())
            .await?;
        Subscription::set_stripe_customer_id(&mut conn, user.id, &customer.id).await?;

        Ok(customer.id)
    }

    /// Create a subscription-mode checkout session for the pro plan
    pub async fn create_subscription_checkout(
        &self,
        user: &User,
    ) -> Result<CheckoutSession, BillingError> {
        let customer_id = self.ensure_stripe_customer(user).await?;

        let params = CheckoutSessionParams {
            mode: CheckoutMode::Subscription,
            customer_id: Some(customer_id),
            line_item: CheckoutLineItem::Price {
                price_id: self.config.pro_price_id.clone(),
                quantity: 1,
            },
            success_url: self.config.checkout_success_url.clone(),
            cancel_url: self.config.checkout_cancel_url.clone(),
            metadata: vec![("user_id".to_string(), user.id.to_string())],
        };

        Ok(self.stripe.create_checkout_session(&params).await?)
    }

    /// Create a payment-mode checkout session for a visibility package.
    /// The purchase details ride along as metadata and come back on the
    /// completion event.
    pub async fn create_visibility_checkout(
        &self,
        user: &User,
        package: PackageType,
        domain: Option<JobDomain>,
        subdomains: &[String],
    ) -> Result<CheckoutSession, BillingError> {
        let customer_id = self.ensure_stripe_customer(user).await?;

        let amount_cents = package_price_cents(package, subdomains.len());
        let description = match (package, domain) {
            (PackageType::FullBundle, _) => "Visibility: all domains".to_string(),
            (_, Some(d)) => format!("Visibility: {}", d.as_str()),
            (_, None) => "Visibility package".to_string(),
        };

        let mut metadata = vec![
            ("user_id".to_string(), user.id.to_string()),
            ("package_type".to_string(), package.as_str().to_string()),
            (
                "subdomains".to_string(),
                serde_json::to_string(subdomains).unwrap_or_else(|_| "[]".to_string()),
            ),
        ];
        if let Some(d) = domain {
            metadata.push(("job_domain".to_string(), d.as_str().to_string()));
        }

        let params = CheckoutSessionParams {
            mode: CheckoutMode::Payment,
            customer_id: Some(customer_id),
            line_item: CheckoutLineItem::Amount {
                name: description,
                amount_cents,
                currency: "usd".to_string(),
                quantity: 1,
            },
            success_url: self.config.checkout_success_url.clone(),
            cancel_url: self.config.checkout_cancel_url.clone(),
            metadata,
        };

        Ok(self.stripe.create_checkout_session(&params).await?)
    }

    /// Dispatch a verified webhook event to its reconciliation handler
    pub async fn handle_webhook_event(&self, event: &StripeEvent) -> Result<(), BillingError> {
        match event.parsed_type() {
            StripeEventType::CheckoutSessionCompleted => {
                self.handle_checkout_completed(&event.data.object).await
            },
            StripeEventType::CustomerSubscriptionCreated => {
                self.handle_subscription_upserted(&event.data.object, true)
                    .await
            },
            StripeEventType::CustomerSubscriptionUpdated => {
                self.handle_subscription_upserted(&event.data.object, false)
                    .await
            },
            StripeEventType::CustomerSubscriptionDeleted => {
                self.handle_subscription_deleted(&event.data.object).await
            },
            StripeEventType::Unknown => {
                tracing::debug!("Ignoring unhandled webhook event type '{}'", event.event_type);
                Ok(())
            },
        }
    }

    /// One-time checkout completed: record the payment and rebuild the
    /// buyer's visibility configuration from the full history.
    async fn handle_checkout_completed(
        &self,
        object: &serde_json::Value,
    ) -> Result<(), BillingError> {
        let session: CheckoutSessionObject = serde_json::from_value(object.clone())
            .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;

        // Subscription-mode sessions are reconciled via subscription events
        if session.mode != "payment" {
            tracing::debug!(
                "Ignoring checkout session {} with mode '{}'",
                session.id,
                session.mode
            );
            return Ok(());
        }

        let user_id = session
            .metadata
            .get("user_id")
            .ok_or(BillingError::MissingField("metadata.user_id"))
            .and_then(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|_| BillingError::MalformedPayload("metadata.user_id".to_string()))
            })?;

        let package_type = session
            .metadata
            .get("package_type")
            .ok_or(BillingError::MissingField("metadata.package_type"))?;
        PackageType::from_str(package_type)
            .map_err(|e| BillingError::MalformedPayload(e))?;

        let new_payment = NewCandidatePayment {
            user_id,
            stripe_session_id: session.id.clone(),
            package_type: package_type.clone(),
            job_domain: session.metadata.get("job_domain").cloned(),
            subdomains: session
                .metadata
                .get("subdomains")
                .cloned()
                .unwrap_or_else(|| "[]".to_string()),
            amount: session.amount_total.unwrap_or(0) as i32,
            currency: session.currency.clone().unwrap_or_else(|| "usd".to_string()),
            status: "completed".to_string(),
        };

        let mut conn = self.conn().await?;

        match CandidatePayment::insert(&mut conn, new_payment).await {
            Ok(_) => {},
            Err(PaymentError::DuplicateSession) => {
                // Redelivery of an already-processed session: success no-op
                tracing::info!(
                    "Duplicate delivery for checkout session {}, skipping",
                    session.id
                );
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        }

        visibility::recompute_for_user(&mut conn, user_id).await?;

        Ok(())
    }

    /// Subscription created/updated: mirror plan, status, and period end
    async fn handle_subscription_upserted(
        &self,
        object: &serde_json::Value,
        is_created: bool,
    ) -> Result<(), BillingError> {
        let subscription: SubscriptionObject = serde_json::from_value(object.clone())
            .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;

        let price_id = subscription
            .items
            .data
            .first()
            .map(|item| item.price.id.as_str())
            .unwrap_or("");
        let plan = PlanTier::from_price_id(price_id, &self.config.pro_price_id);

        let update = SubscriptionUpdate {
            plan: Some(plan.as_str().to_string()),
            status: Some(subscription.status.clone()),
            stripe_subscription_id: Some(Some(subscription.id.clone())),
            stripe_price_id: Some(Some(price_id.to_string())),
            current_period_end: Some(
                subscription
                    .current_period_end
                    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            ),
            updated_at: Utc::now(),
        };

        let mut conn = self.conn().await?;

        let row = match Subscription::apply_update_by_customer_id(
            &mut conn,
            &subscription.customer,
            update,
        )
        .await
        {
            Ok(row) => row,
            Err(SubscriptionError::NotFound) => {
                tracing::warn!(
                    "Subscription event for unknown customer '{}', skipping",
                    subscription.customer
                );
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        };

        if is_created {
            if let Ok(user) = User::find_by_id(&mut conn, row.user_id).await {
                let email = Arc::clone(&self.email);
                let plan_name = plan.as_str().to_string();
                tokio::spawn(async move {
                    if let Err(e) = email
                        .send_subscription_activated_email(
                            &user.email,
                            &user.full_name(),
                            &plan_name,
                        )
                        .await
                    {
                        tracing::warn!("Failed to send subscription activation email: {}", e);
                    }
                });
            }
        }

        Ok(())
    }

    /// Subscription deleted externally: fall back to the free tier
    async fn handle_subscription_deleted(
        &self,
        object: &serde_json::Value,
    ) -> Result<(), BillingError> {
        let subscription: SubscriptionObject = serde_json::from_value(object.clone())
            .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;

        let mut conn = self.conn().await?;

        match Subscription::reset_to_free_by_customer_id(&mut conn, &subscription.customer).await {
            Ok(_) => Ok(()),
            Err(SubscriptionError::NotFound) => {
                tracing::warn!(
                    "Subscription deletion for unknown customer '{}', skipping",
                    subscription.customer
                );
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }
}

/// Price for a one-time package. Addon pricing scales with the number of
/// subdomains purchased.
pub fn package_price_cents(package: PackageType, subdomain_count: usize) -> i64 {
    match package {
        PackageType::Base => BASE_PACKAGE_PRICE_CENTS,
        PackageType::SubdomainAddon => {
            SUBDOMAIN_ADDON_PRICE_CENTS * subdomain_count.max(1) as i64
        },
        PackageType::SingleDomainBundle => SINGLE_DOMAIN_BUNDLE_PRICE_CENTS,
        PackageType::FullBundle => FULL_BUNDLE_PRICE_CENTS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_pricing() {
        assert_eq!(package_price_cents(PackageType::Base, 1), 4900);
        assert_eq!(package_price_cents(PackageType::SubdomainAddon, 3), 5700);
        // Zero-count addon still bills one unit
        assert_eq!(package_price_cents(PackageType::SubdomainAddon, 0), 1900);
        assert_eq!(package_price_cents(PackageType::FullBundle, 0), 14900);
    }

    #[test]
    fn test_checkout_session_object_parsing() {
        let object = serde_json::json!({
            "id": "cs_test_abc",
            "mode": "payment",
            "metadata": {
                "user_id": "5d2f1a34-9c1b-4f68-8f50-8b8f53f1a111",
                "package_type": "base",
                "job_domain": "contract",
                "subdomains": "[\"c2c\"]"
            },
            "amount_total": 4900,
            "currency": "usd"
        });

        let session: CheckoutSessionObject = serde_json::from_value(object).unwrap();
        assert_eq!(session.id, "cs_test_abc");
        assert_eq!(session.mode, "payment");
        assert_eq!(session.metadata["package_type"], "base");
        assert_eq!(session.amount_total, Some(4900));
    }

    #[test]
    fn test_subscription_object_parsing() {
        let object = serde_json::json!({
            "id": "sub_123",
            "customer": "cus_456",
            "status": "active",
            "current_period_end": 1735689600,
            "items": {
                "data": [ {"price": {"id": "price_pro"}} ]
            }
        });

        let subscription: SubscriptionObject = serde_json::from_value(object).unwrap();
        assert_eq!(subscription.id, "sub_123");
        assert_eq!(subscription.customer, "cus_456");
        assert_eq!(subscription.items.data[0].price.id, "price_pro");
    }

    #[test]
    fn test_subscription_object_tolerates_missing_optionals() {
        let object = serde_json::json!({
            "id": "sub_123",
            "customer": "cus_456",
            "status": "canceled"
        });

        let subscription: SubscriptionObject = serde_json::from_value(object).unwrap();
        assert!(subscription.current_period_end.is_none());
        assert!(subscription.items.data.is_empty());
    }
}
