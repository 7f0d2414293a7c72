// Utility modules

pub mod errors;
pub mod password;
pub mod username;
pub mod validation;

pub use errors::{log_auth_failure, ApiError, ApiErrorResponse};
pub use password::{hash_password, verify_password, PasswordError};
pub use username::generate_username;
pub use validation::{trim_and_validate_field, trim_optional_field};
