//! crates/neurostudy_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or wire format.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A registered account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub hashed_password: String,
}

/// Processing state of a study session.
///
/// The worker owns the transitions past `Processing`; any value it writes that
/// this service does not know about is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
    Other(String),
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Uploaded => "uploaded",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Other(raw) => raw,
        }
    }
}

impl From<&str> for SessionStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "uploaded" => SessionStatus::Uploaded,
            "processing" => SessionStatus::Processing,
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            other => SessionStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded note image and the text the worker extracted from it.
#[derive(Debug, Clone)]
pub struct StudySession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub image_url: String,
    pub extracted_text: Option<String>,
    pub topic: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The row shape used by the "recent sessions" listing.
#[derive(Debug, Clone)]
pub struct SessionOverview {
    pub id: Uuid,
    pub title: Option<String>,
    pub topic: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&StudySession> for SessionOverview {
    fn from(session: &StudySession) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            topic: session.topic.clone(),
            status: session.status.clone(),
            created_at: session.created_at,
        }
    }
}

/// Worker-generated summaries. `Default` is the "not generated yet" value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub short_summary: String,
    pub detailed_summary: String,
    pub simplified_explanation: String,
    pub key_concepts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flashcard {
    pub id: Uuid,
    pub session_id: Uuid,
    pub front: String,
    pub back: String,
    pub is_bookmarked: bool,
}

/// A multiple-choice question. `options` maps an answer label ("A", "B", ...)
/// to its text; `question_order` fixes presentation order within the quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    pub explanation: String,
    pub question_order: i32,
}

/// Everything known about a study session at the time of the read.
#[derive(Debug, Clone)]
pub struct StudySessionView {
    pub session: StudySession,
    pub summary: Summary,
    pub flashcards: Vec<Flashcard>,
    pub quiz_questions: Vec<QuizQuestion>,
}

/// The hand-off sent to the AI worker once a session enters `processing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingRequest {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
}

/// Parses a serialized options mapping. Anything that is not a JSON object of
/// strings yields an empty mapping.
pub fn parse_quiz_options(raw: Option<&str>) -> BTreeMap<String, String> {
    let Some(raw) = raw else {
        return BTreeMap::new();
    };
    match serde_json::from_str(raw) {
        Ok(options) => options,
        Err(e) => {
            tracing::debug!("Discarding malformed quiz options: {}", e);
            BTreeMap::new()
        }
    }
}

/// Parses a serialized key-concept list, falling back to an empty list.
pub fn parse_key_concepts(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str(raw) {
        Ok(concepts) => concepts,
        Err(e) => {
            tracing::debug!("Discarding malformed key concepts: {}", e);
            Vec::new()
        }
    }
}
