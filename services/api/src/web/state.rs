//! services/api/src/web/state.rs
//!
//! Defines the application's shared state, created once at startup.

use crate::auth::{AuthService, PasswordHasher, TokenService};
use crate::config::Config;
use crate::error::ApiError;
use chrono::Duration;
use neurostudy_core::ports::{BlobStore, DatabaseService, ProcessingDispatcher};
use neurostudy_core::StudyService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, passed to all handlers. The store pool inside
/// `db` is the only resource requests share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub auth: AuthService,
    pub study: StudyService,
}

impl AppState {
    /// Wires the services on top of the given adapters.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        blobs: Arc<dyn BlobStore>,
        dispatcher: Arc<dyn ProcessingDispatcher>,
    ) -> Result<Self, ApiError> {
        let hasher = PasswordHasher::new(&config.password_hash)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let tokens = TokenService::new(
            &config.jwt_secret,
            Duration::hours(config.token_ttl_hours),
            config.token_leeway_secs,
        );

        Ok(Self {
            auth: AuthService::new(db.clone(), hasher, tokens.clone()),
            study: StudyService::new(db, blobs, dispatcher),
            tokens,
            config,
        })
    }
}
