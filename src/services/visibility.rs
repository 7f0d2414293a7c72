// Membership visibility aggregation
//
// Folds a candidate's completed one-time purchases into a single merged
// visibility configuration: a mapping from job domain to the set of
// subdomains the candidate is discoverable in. Visibility is monotonically
// additive; no purchase ever removes access. The stored configuration is
// always recomputed from the complete payment history, never patched
// incrementally, so duplicate or out-of-order webhook deliveries cannot
// cause drift.

use std::collections::{BTreeMap, BTreeSet};

use diesel_async::AsyncPgConnection;
use uuid::Uuid;

use crate::models::payment::{CandidatePayment, JobDomain, PackageType, PaymentError};
use crate::models::user::{User, UserError};

/// Subdomains available under the contract domain
pub const CONTRACT_SUBDOMAINS: [&str; 4] = ["c2c", "c2h", "w2", "1099"];

/// Subdomains available under the full-time domain
pub const FULL_TIME_SUBDOMAINS: [&str; 4] = ["c2h", "w2", "direct_hire", "salary"];

/// Merged visibility configuration, keyed by domain name.
/// BTree containers keep serialization deterministic regardless of the
/// order payments were folded in.
pub type VisibilityConfig = BTreeMap<String, BTreeSet<String>>;

/// Errors surfaced while recomputing and persisting visibility
#[derive(thiserror::Error, Debug)]
pub enum VisibilityError {
    #[error("Payment lookup failed: {0}")]
    Payment(#[from] PaymentError),

    #[error("User update failed: {0}")]
    User(#[from] UserError),
}

/// The complete subdomain set for a domain
pub fn full_subdomain_set(domain: JobDomain) -> BTreeSet<String> {
    let all = match domain {
        JobDomain::Contract => &CONTRACT_SUBDOMAINS,
        JobDomain::FullTime => &FULL_TIME_SUBDOMAINS,
    };
    all.iter().map(|s| s.to_string()).collect()
}

/// Whether a subdomain belongs to a domain's vocabulary
pub fn is_known_subdomain(domain: JobDomain, subdomain: &str) -> bool {
    match domain {
        JobDomain::Contract => CONTRACT_SUBDOMAINS.contains(&subdomain),
        JobDomain::FullTime => FULL_TIME_SUBDOMAINS.contains(&subdomain),
    }
}

/// Fold a set of completed payments into a merged visibility configuration.
///
/// The fold is a pure function of the row set: order-independent (every
/// operation is a set union) and idempotent (re-running over the same rows
/// yields an identical mapping). Rows that carry no usable purchase data
/// contribute nothing; they are skipped, not rejected.
pub fn aggregate_visibility(payments: &[CandidatePayment]) -> VisibilityConfig {
    let mut config = VisibilityConfig::new();

    for payment in payments {
        let package = match payment.package_type_enum() {
            Some(p) => p,
            None => {
                tracing::warn!(
                    "Skipping payment {} with unknown package type '{}'",
                    payment.id,
                    payment.package_type
                );
                continue;
            },
        };

        match package {
            PackageType::FullBundle => {
                for domain in [JobDomain::Contract, JobDomain::FullTime] {
                    config
                        .entry(domain.as_str().to_string())
                        .or_default()
                        .extend(full_subdomain_set(domain));
                }
            },
            PackageType::SingleDomainBundle => {
                if let Some(domain) = payment.job_domain_enum() {
                    config
                        .entry(domain.as_str().to_string())
                        .or_default()
                        .extend(full_subdomain_set(domain));
                }
            },
            PackageType::Base | PackageType::SubdomainAddon => {
                let domain = match payment.job_domain_enum() {
                    Some(d) => d,
                    None => continue,
                };
                let subdomains = payment.subdomain_list();
                if subdomains.is_empty() {
                    continue;
                }
                config
                    .entry(domain.as_str().to_string())
                    .or_default()
                    .extend(subdomains);
            },
        }
    }

    config
}

/// Recompute a user's visibility configuration from their full completed
/// payment history and persist the result. Sets `has_purchased_visibility`.
pub async fn recompute_for_user(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
) -> Result<VisibilityConfig, VisibilityError> {
    let payments = CandidatePayment::find_completed_by_user_id(conn, user_id).await?;
    let config = aggregate_visibility(&payments);

    let serialized = serde_json::to_value(&config)
        .expect("BTreeMap of strings always serializes");
    User::store_membership_config(conn, user_id, serialized).await?;

    tracing::info!(
        user_id = %user_id,
        payments = payments.len(),
        domains = config.len(),
        "Recomputed membership visibility"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::CandidatePayment;
    use chrono::Utc;

    fn payment(package_type: &str, job_domain: Option<&str>, subdomains: &str) -> CandidatePayment {
        CandidatePayment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            stripe_session_id: format!("cs_test_{}", Uuid::new_v4().simple()),
            package_type: package_type.to_string(),
            job_domain: job_domain.map(String::from),
            subdomains: subdomains.to_string(),
            amount: 2900,
            currency: "usd".to_string(),
            status: "completed".to_string(),
            created_at: Utc::now(),
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_history_yields_empty_config() {
        assert!(aggregate_visibility(&[]).is_empty());
    }

    #[test]
    fn test_base_and_addon_union_within_domain() {
        let payments = vec![
            payment("base", Some("contract"), r#"["c2c"]"#),
            payment("subdomain_addon", Some("contract"), r#"["w2"]"#),
        ];

        let config = aggregate_visibility(&payments);

        assert_eq!(config.len(), 1);
        assert_eq!(config["contract"], set(&["c2c", "w2"]));
    }

    #[test]
    fn test_full_bundle_populates_both_domains() {
        let config = aggregate_visibility(&[payment("full_bundle", None, "[]")]);

        assert_eq!(config["contract"], full_subdomain_set(JobDomain::Contract));
        assert_eq!(config["full_time"], full_subdomain_set(JobDomain::FullTime));
    }

    #[test]
    fn test_later_smaller_purchase_never_shrinks_full_bundle() {
        let payments = vec![
            payment("full_bundle", None, "[]"),
            payment("base", Some("contract"), r#"["c2c"]"#),
        ];

        let config = aggregate_visibility(&payments);
        assert_eq!(config["contract"], full_subdomain_set(JobDomain::Contract));
        assert_eq!(config["full_time"], full_subdomain_set(JobDomain::FullTime));
    }

    #[test]
    fn test_single_domain_bundle_fills_one_domain() {
        let config =
            aggregate_visibility(&[payment("single_domain_bundle", Some("full_time"), "[]")]);

        assert_eq!(config.len(), 1);
        assert_eq!(config["full_time"], full_subdomain_set(JobDomain::FullTime));
    }

    #[test]
    fn test_missing_domain_or_empty_subdomains_contribute_nothing() {
        let payments = vec![
            payment("base", None, r#"["c2c"]"#),
            payment("base", Some("contract"), "[]"),
            payment("single_domain_bundle", None, "[]"),
        ];

        assert!(aggregate_visibility(&payments).is_empty());
    }

    #[test]
    fn test_malformed_subdomains_do_not_block_other_rows() {
        let payments = vec![
            payment("base", Some("contract"), "{definitely not json"),
            payment("base", Some("full_time"), r#"["w2"]"#),
        ];

        let config = aggregate_visibility(&payments);
        assert_eq!(config.len(), 1);
        assert_eq!(config["full_time"], set(&["w2"]));
    }

    #[test]
    fn test_order_independence_over_permutations() {
        let a = payment("base", Some("contract"), r#"["c2c"]"#);
        let b = payment("subdomain_addon", Some("contract"), r#"["w2","1099"]"#);
        let c = payment("single_domain_bundle", Some("full_time"), "[]");
        let d = payment("full_bundle", None, "[]");

        let rows = [a, b, c, d];
        let baseline = aggregate_visibility(&rows);

        // All 24 permutations of 4 rows
        let indices = [
            [0, 1, 2, 3], [0, 1, 3, 2], [0, 2, 1, 3], [0, 2, 3, 1], [0, 3, 1, 2], [0, 3, 2, 1],
            [1, 0, 2, 3], [1, 0, 3, 2], [1, 2, 0, 3], [1, 2, 3, 0], [1, 3, 0, 2], [1, 3, 2, 0],
            [2, 0, 1, 3], [2, 0, 3, 1], [2, 1, 0, 3], [2, 1, 3, 0], [2, 3, 0, 1], [2, 3, 1, 0],
            [3, 0, 1, 2], [3, 0, 2, 1], [3, 1, 0, 2], [3, 1, 2, 0], [3, 2, 0, 1], [3, 2, 1, 0],
        ];

        for perm in indices {
            let shuffled: Vec<CandidatePayment> =
                perm.iter().map(|&i| rows[i].clone()).collect();
            assert_eq!(aggregate_visibility(&shuffled), baseline);
        }
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let payments = vec![
            payment("base", Some("contract"), r#"["w2","c2c"]"#),
            payment("single_domain_bundle", Some("full_time"), "[]"),
        ];

        let first = serde_json::to_string(&aggregate_visibility(&payments)).unwrap();
        let second = serde_json::to_string(&aggregate_visibility(&payments)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_serialized_shape_matches_external_representation() {
        let payments = vec![payment("base", Some("contract"), r#"["w2","c2c"]"#)];
        let json = serde_json::to_value(aggregate_visibility(&payments)).unwrap();

        // Mapping from domain name to ordered subdomain array
        assert_eq!(json, serde_json::json!({"contract": ["c2c", "w2"]}));
    }

    #[test]
    fn test_vocabulary_helpers() {
        assert!(is_known_subdomain(JobDomain::Contract, "1099"));
        assert!(!is_known_subdomain(JobDomain::Contract, "direct_hire"));
        assert!(is_known_subdomain(JobDomain::FullTime, "direct_hire"));
        assert_eq!(full_subdomain_set(JobDomain::Contract).len(), 4);
        assert_eq!(full_subdomain_set(JobDomain::FullTime).len(), 4);
    }
}
