//! services/api/src/auth/service.rs
//!
//! Registration and login: credential checks, password hashing and token issue.

use crate::auth::password::PasswordHasher;
use crate::auth::token::TokenService;
use crate::error::{ApiError, ApiResult};
use neurostudy_core::{DatabaseService, PortError, User};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A user together with a freshly issued session token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<dyn DatabaseService>,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(db: Arc<dyn DatabaseService>, hasher: PasswordHasher, tokens: TokenService) -> Self {
        Self { db, hasher, tokens }
    }

    pub async fn register(&self, email: &str, password: &str, full_name: &str) -> ApiResult<AuthSession> {
        let email = normalize_email(email);
        if email.is_empty() || password.trim().is_empty() {
            return Err(ApiError::Validation("email and password are required".to_string()));
        }
        if !email.contains('@') {
            return Err(ApiError::Validation("email is invalid".to_string()));
        }

        let hasher = self.hasher.clone();
        let plaintext = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))?
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                ApiError::Internal(e.to_string())
            })?;

        let user = self
            .db
            .create_user(&email, &password_hash, full_name.trim())
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => ApiError::Conflict("email already registered".to_string()),
                other => {
                    error!("Failed to create user: {:?}", other);
                    ApiError::from(other)
                }
            })?;

        let token = self.issue(&user)?;
        info!("Registered user {}", user.id);
        Ok(AuthSession { user, token })
    }

    /// Unknown email and wrong password fail identically, including in cost.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthSession> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::Validation("email and password are required".to_string()));
        }

        let credentials = match self.db.get_user_by_email(&email).await {
            Ok(credentials) => Some(credentials),
            Err(PortError::NotFound(_)) => None,
            Err(e) => {
                error!("Failed to look up user: {:?}", e);
                return Err(e.into());
            }
        };

        let hasher = self.hasher.clone();
        let candidate = password.to_string();
        let stored_hash = credentials.as_ref().map(|c| c.hashed_password.clone());
        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.verify(&candidate, &hash),
            None => Ok(hasher.verify_decoy(&candidate)),
        })
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {}", e)))?
        .map_err(|e| {
            error!("Failed to verify password: {:?}", e);
            ApiError::Internal(e.to_string())
        })?;

        let Some(credentials) = credentials.filter(|_| verified) else {
            warn!("Rejected login attempt");
            return Err(ApiError::InvalidCredentials);
        };

        let token = self.issue(&credentials.user)?;
        info!("User {} logged in", credentials.user.id);
        Ok(AuthSession {
            user: credentials.user,
            token,
        })
    }

    fn issue(&self, user: &User) -> ApiResult<String> {
        self.tokens.issue(user.id, &user.email).map_err(|e| {
            error!("Failed to issue token: {:?}", e);
            ApiError::Internal(e.to_string())
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
