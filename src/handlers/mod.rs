// Route handlers and route builders

pub mod auth;
pub mod billing;

use crate::app::AppState;
use crate::middleware::auth::auth_middleware;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

// Authentication routes
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::get_current_user))
        .route("/account", delete(auth::delete_account))
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh_token))
        .route("/google", get(auth::google_auth_start))
        .route("/google/callback", get(auth::google_auth_callback))
        .merge(protected)
}

// Billing routes (webhook stays signature-authenticated, not JWT-protected)
pub fn billing_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route(
            "/subscription/checkout",
            post(billing::create_subscription_checkout),
        )
        .route(
            "/visibility/checkout",
            post(billing::create_visibility_checkout),
        )
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/webhook", post(billing::stripe_webhook))
        .merge(protected)
}
