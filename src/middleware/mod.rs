// Middleware modules

pub mod auth;

// Re-export auth types
pub use auth::{auth_middleware, AuthenticatedUser};
