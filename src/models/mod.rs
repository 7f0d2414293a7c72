// Data models for the marketplace backend

pub mod auth;
pub mod payment;
pub mod refresh_token;
pub mod subscription;
pub mod user;

// Re-export common types
pub use auth::*;
pub use payment::{
    CandidatePayment, JobDomain, NewCandidatePayment, PackageType, PaymentError,
};
pub use refresh_token::{NewRefreshToken, RefreshToken, RefreshTokenError};
pub use subscription::{
    NewSubscription, PlanTier, Subscription, SubscriptionError, SubscriptionUpdate,
};
pub use user::{NewUser, User, UserError, UserRole};
