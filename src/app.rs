// Application state and configuration
use std::sync::Arc;

use crate::{
    db::DieselPool,
    services::{BillingService, EmailService, GoogleOAuthService, JwtService, WebhookVerifier},
    utils::errors::ApiError,
};

// Application state shared across handlers.
// Every collaborator is an explicitly constructed, injected dependency so
// the orchestrators stay testable with substitutable fakes.
#[derive(Clone)]
pub struct AppState {
    pub diesel_pool: DieselPool,
    pub jwt_service: Arc<JwtService>,
    pub billing_service: Arc<BillingService>,
    pub oauth_service: Arc<GoogleOAuthService>,
    pub email_service: Arc<EmailService>,
    pub webhook_verifier: Arc<WebhookVerifier>,
    pub max_connections: u32,
}

impl AppState {
    /// Checkout a pooled connection, mapping pool exhaustion/transients to
    /// the upstream error class
    pub async fn db_conn(
        &self,
    ) -> Result<
        bb8::PooledConnection<
            '_,
            diesel_async::pooled_connection::AsyncDieselConnectionManager<
                diesel_async::AsyncPgConnection,
            >,
        >,
        ApiError,
    > {
        self.diesel_pool.get().await.map_err(|e| {
            tracing::error!("Failed to get database connection: {}", e);
            ApiError::Upstream
        })
    }
}
