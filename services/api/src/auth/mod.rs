//! services/api/src/auth/mod.rs
//!
//! Password hashing, session tokens, and the register/login use cases.

pub mod password;
pub mod service;
pub mod token;

pub use password::{PasswordError, PasswordHasher};
pub use service::{AuthService, AuthSession};
pub use token::{AuthError, Claims, TokenService};
