//! crates/neurostudy_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the relational store, the blob store and the AI worker.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;
use crate::domain::{
    Flashcard, ProcessingRequest, QuizQuestion, SessionOverview, SessionStatus, StudySession,
    Summary, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicts with an existing item: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The relational store. Every session-level query takes the owning user id so
/// that rows belonging to someone else are indistinguishable from missing rows.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    /// Inserts a user. A taken email yields `PortError::Conflict`.
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    // --- Study sessions ---
    async fn create_study_session(&self, user_id: Uuid, image_url: &str) -> PortResult<StudySession>;

    async fn get_study_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<StudySession>;

    /// Newest first, at most `limit` rows.
    async fn list_recent_sessions(&self, user_id: Uuid, limit: i64) -> PortResult<Vec<SessionOverview>>;

    /// Sets the status and refreshes `updated_at`. Zero affected rows yields
    /// `PortError::NotFound`.
    async fn update_session_status(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        status: &SessionStatus,
    ) -> PortResult<()>;

    // --- Worker-generated sub-resources ---
    async fn get_summary(&self, session_id: Uuid) -> PortResult<Option<Summary>>;

    async fn get_flashcards(&self, session_id: Uuid) -> PortResult<Vec<Flashcard>>;

    /// Questions from every quiz of the session. Callers sort by `question_order`
    /// themselves rather than trusting row order.
    async fn get_quiz_questions(&self, session_id: Uuid) -> PortResult<Vec<QuizQuestion>>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores an image and returns a URL the client and worker can fetch it from.
    async fn store(&self, data: Bytes, content_type: &str) -> PortResult<String>;
}

/// Hands a session over to the AI worker. Implementations must return
/// immediately; delivery happens in the background.
pub trait ProcessingDispatcher: Send + Sync {
    fn dispatch(&self, request: ProcessingRequest);
}
