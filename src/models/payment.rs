// Candidate payment model: one immutable row per completed one-time purchase.
// The Stripe checkout-session id carries a unique constraint and acts as the
// idempotency key for webhook redelivery.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::candidate_payments;

/// Visibility package purchased in a single checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PackageType {
    Base,
    SubdomainAddon,
    SingleDomainBundle,
    FullBundle,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Base => "base",
            PackageType::SubdomainAddon => "subdomain_addon",
            PackageType::SingleDomainBundle => "single_domain_bundle",
            PackageType::FullBundle => "full_bundle",
        }
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(PackageType::Base),
            "subdomain_addon" => Ok(PackageType::SubdomainAddon),
            "single_domain_bundle" => Ok(PackageType::SingleDomainBundle),
            "full_bundle" => Ok(PackageType::FullBundle),
            _ => Err(format!("Invalid package type: {}", s)),
        }
    }
}

/// Job domain a purchase applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobDomain {
    Contract,
    FullTime,
}

impl JobDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobDomain::Contract => "contract",
            JobDomain::FullTime => "full_time",
        }
    }
}

impl FromStr for JobDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contract" => Ok(JobDomain::Contract),
            "full_time" => Ok(JobDomain::FullTime),
            _ => Err(format!("Invalid job domain: {}", s)),
        }
    }
}

/// Candidate payment database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = candidate_payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CandidatePayment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_session_id: String,
    pub package_type: String,
    pub job_domain: Option<String>,
    pub subdomains: String,
    pub amount: i32,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// New payment row for insertion
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = candidate_payments)]
pub struct NewCandidatePayment {
    pub user_id: Uuid,
    pub stripe_session_id: String,
    pub package_type: String,
    pub job_domain: Option<String>,
    pub subdomains: String,
    pub amount: i32,
    pub currency: String,
    pub status: String,
}

/// Errors for payment operations
#[derive(thiserror::Error, Debug)]
pub enum PaymentError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Duplicate checkout session")]
    DuplicateSession,
}

impl CandidatePayment {
    /// Insert a payment row keyed by the checkout-session id.
    /// Returns `DuplicateSession` when the session id already exists, which
    /// callers treat as a successful no-op (webhook redelivery).
    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_payment: NewCandidatePayment,
    ) -> Result<Self, PaymentError> {
        use crate::schema::candidate_payments::dsl::*;

        diesel::insert_into(candidate_payments)
            .values(&new_payment)
            .get_result::<CandidatePayment>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => PaymentError::DuplicateSession,
                _ => PaymentError::Database(e),
            })
    }

    /// Load every completed payment for a user, the aggregator's input
    pub async fn find_completed_by_user_id(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<Vec<Self>, PaymentError> {
        use crate::schema::candidate_payments::dsl::*;

        candidate_payments
            .filter(user_id.eq(user_id_val))
            .filter(status.eq("completed"))
            .order(created_at.asc())
            .load::<Self>(conn)
            .await
            .map_err(PaymentError::Database)
    }

    /// Get the package type as enum; bad stored data yields None
    pub fn package_type_enum(&self) -> Option<PackageType> {
        PackageType::from_str(&self.package_type).ok()
    }

    /// Get the job domain as enum; absent or bad stored data yields None
    pub fn job_domain_enum(&self) -> Option<JobDomain> {
        self.job_domain
            .as_deref()
            .and_then(|d| JobDomain::from_str(d).ok())
    }

    /// Parse the serialized subdomain list. Malformed data degrades to an
    /// empty list rather than failing the caller.
    pub fn subdomain_list(&self) -> Vec<String> {
        serde_json::from_str::<Vec<String>>(&self.subdomains).unwrap_or_else(|e| {
            tracing::warn!(
                "Malformed subdomains payload on payment {}: {}",
                self.id,
                e
            );
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn payment_row(
        package_type: &str,
        job_domain: Option<&str>,
        subdomains: &str,
    ) -> CandidatePayment {
        CandidatePayment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            stripe_session_id: format!("cs_test_{}", Uuid::new_v4().simple()),
            package_type: package_type.to_string(),
            job_domain: job_domain.map(String::from),
            subdomains: subdomains.to_string(),
            amount: 4900,
            currency: "usd".to_string(),
            status: "completed".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_package_type_conversion() {
        assert_eq!(PackageType::from_str("base"), Ok(PackageType::Base));
        assert_eq!(
            PackageType::from_str("subdomain_addon"),
            Ok(PackageType::SubdomainAddon)
        );
        assert_eq!(
            PackageType::from_str("single_domain_bundle"),
            Ok(PackageType::SingleDomainBundle)
        );
        assert_eq!(
            PackageType::from_str("full_bundle"),
            Ok(PackageType::FullBundle)
        );
        assert!(PackageType::from_str("mega_bundle").is_err());

        assert_eq!(PackageType::SingleDomainBundle.as_str(), "single_domain_bundle");
    }

    #[test]
    fn test_job_domain_conversion() {
        assert_eq!(JobDomain::from_str("contract"), Ok(JobDomain::Contract));
        assert_eq!(JobDomain::from_str("full_time"), Ok(JobDomain::FullTime));
        assert!(JobDomain::from_str("part_time").is_err());
    }

    #[test]
    fn test_subdomain_list_parses_valid_json() {
        let row = payment_row("base", Some("contract"), r#"["c2c","w2"]"#);
        assert_eq!(row.subdomain_list(), vec!["c2c", "w2"]);
    }

    #[test]
    fn test_subdomain_list_degrades_on_malformed_json() {
        let row = payment_row("base", Some("contract"), "{not json");
        assert!(row.subdomain_list().is_empty());

        let row = payment_row("base", Some("contract"), r#"{"a": 1}"#);
        assert!(row.subdomain_list().is_empty());
    }

    #[test]
    fn test_enum_accessors_on_bad_data() {
        let row = payment_row("mystery", Some("weekend"), "[]");
        assert!(row.package_type_enum().is_none());
        assert!(row.job_domain_enum().is_none());
    }
}
