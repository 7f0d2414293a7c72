// Services module - business logic layer for the application

pub mod billing;
pub mod email;
pub mod jwt;
pub mod oauth;
pub mod stripe;
pub mod visibility;

// Re-export commonly used services
pub use billing::{BillingError, BillingService};
pub use email::{EmailError, EmailService};
pub use jwt::{JwtConfig, JwtError, JwtService};
pub use oauth::{GoogleOAuthService, GoogleUserInfo, OAuthError, OAuthResolution};
pub use stripe::{
    CheckoutLineItem, CheckoutMode, CheckoutSession, CheckoutSessionParams, StripeClient,
    StripeError, StripeEvent, StripeEventType, WebhookError, WebhookVerifier,
};
pub use visibility::{aggregate_visibility, VisibilityConfig, VisibilityError};
