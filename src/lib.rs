// Library exports for the marketplace backend
// This file exposes modules and functions for library consumers

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::{DieselDatabaseConfig, DieselPool};
pub use middleware::{auth_middleware, AuthenticatedUser};
pub use models::auth::{AccessTokenClaims, RefreshTokenClaims};
pub use models::payment::{CandidatePayment, JobDomain, PackageType};
pub use models::refresh_token::{RefreshToken, RefreshTokenError};
pub use models::subscription::{PlanTier, Subscription};
pub use models::user::{User, UserRole};
pub use services::{
    aggregate_visibility, BillingService, EmailService, GoogleOAuthService, JwtConfig, JwtError,
    JwtService, StripeClient, StripeEvent, VisibilityConfig, WebhookVerifier,
};
pub use utils::errors::ApiError;

// Re-export route builders
pub use handlers::{auth_routes, billing_routes};

use std::sync::Arc;

// Library initialization function for external consumers
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    use tracing::info;

    // Load environment
    dotenv::dotenv().ok();

    let config = app_config::config();

    // Initialize database pool
    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::default();
    let max_connections = db_config.max_connections;
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    // Run migrations if enabled
    if migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        migrations::run_migrations()
            .await
            .map_err(|e| format!("Migration failed: {}", e))?;
    }

    // Initialize services
    let jwt_service = Arc::new(JwtService::from_env_with_diesel(diesel_pool.clone()));
    let email_service = Arc::new(EmailService::new(config.email.clone())?);
    let stripe_client = Arc::new(StripeClient::new(&config.stripe));
    let webhook_verifier = Arc::new(WebhookVerifier::new(config.stripe.webhook_secret.clone()));
    let oauth_service = Arc::new(GoogleOAuthService::new(config.google.clone()));
    let billing_service = Arc::new(BillingService::new(
        diesel_pool.clone(),
        Arc::clone(&stripe_client),
        Arc::clone(&email_service),
        config.stripe.clone(),
    ));

    Ok(AppState {
        diesel_pool,
        jwt_service,
        billing_service,
        oauth_service,
        email_service,
        webhook_verifier,
        max_connections,
    })
}

/// Build the API router with all routes mounted under /api/v1
pub fn build_router(state: AppState) -> axum::Router {
    use axum::routing::get;
    use tower_http::trace::TraceLayer;

    let api = axum::Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/billing", billing_routes(state.clone()))
        .route("/health", get(health_check));

    axum::Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method};
    use tower_http::cors::{AllowOrigin, CorsLayer};

    let config = app_config::config();
    let origins: Vec<HeaderValue> = config
        .security
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
}

// Health check handler
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    // Check PostgreSQL
    let postgres_health = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(_) => serde_json::json!({
            "status": "healthy",
            "max_connections": state.max_connections,
            "error": null
        }),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            })
        },
    };

    let response = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "hirepath-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
