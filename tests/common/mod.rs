// Shared helpers for integration tests

use chrono::Utc;
use hirepath_backend_core::models::payment::CandidatePayment;
use uuid::Uuid;

/// Build a completed payment row for aggregator tests
pub fn completed_payment(
    user_id: Uuid,
    package_type: &str,
    job_domain: Option<&str>,
    subdomains: &str,
) -> CandidatePayment {
    CandidatePayment {
        id: Uuid::new_v4(),
        user_id,
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
