//! crates/neurostudy_core/src/study.rs
//!
//! The study-session use cases: registering an upload, triggering processing,
//! listing recent sessions and assembling the full session view.
//!
//! Every operation takes the authenticated user id as an explicit parameter and
//! scopes its store access by it.

use crate::domain::{
    Flashcard, ProcessingRequest, QuizQuestion, SessionOverview, SessionStatus, StudySession,
    StudySessionView, Summary,
};
use crate::ports::{BlobStore, DatabaseService, PortError, ProcessingDispatcher};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Page size of the recent-sessions listing.
pub const RECENT_SESSIONS_LIMIT: i64 = 20;

#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error("{0}")]
    Validation(String),
    /// Missing and foreign sessions both end up here.
    #[error("Session not found")]
    NotFound,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Result of a successful processing trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingStarted {
    pub session_id: Uuid,
    pub status: SessionStatus,
}

#[derive(Clone)]
pub struct StudyService {
    db: Arc<dyn DatabaseService>,
    blobs: Arc<dyn BlobStore>,
    dispatcher: Arc<dyn ProcessingDispatcher>,
}

impl StudyService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        blobs: Arc<dyn BlobStore>,
        dispatcher: Arc<dyn ProcessingDispatcher>,
    ) -> Self {
        Self { db, blobs, dispatcher }
    }

    /// Stores an uploaded note image and opens a session for it in `uploaded` state.
    pub async fn create_from_upload(
        &self,
        user_id: Uuid,
        data: Bytes,
        content_type: &str,
    ) -> Result<StudySession, StudyError> {
        if data.is_empty() {
            return Err(StudyError::Validation("no image provided".to_string()));
        }

        let image_url = self.blobs.store(data, content_type).await?;
        let session = self.db.create_study_session(user_id, &image_url).await?;
        info!("Created study session {} for user {}", session.id, user_id);
        Ok(session)
    }

    /// Moves a session to `processing` and notifies the worker.
    ///
    /// `session_id` arrives as client text; an id that is not a UUID cannot name
    /// any session and is reported the same way as someone else's session.
    pub async fn begin_processing(
        &self,
        session_id: &str,
        image_url: &str,
        user_id: Uuid,
    ) -> Result<ProcessingStarted, StudyError> {
        let session_id = session_id.trim();
        let image_url = image_url.trim();
        if session_id.is_empty() || image_url.is_empty() {
            return Err(StudyError::Validation(
                "session_id and image_url are required".to_string(),
            ));
        }
        let session_id = Uuid::parse_str(session_id).map_err(|_| StudyError::NotFound)?;

        let status = SessionStatus::Processing;
        self.db
            .update_session_status(session_id, user_id, &status)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => StudyError::NotFound,
                other => StudyError::Port(other),
            })?;

        self.dispatcher.dispatch(ProcessingRequest {
            session_id,
            user_id,
            image_url: image_url.to_string(),
        });
        info!("Session {} handed to the worker", session_id);

        Ok(ProcessingStarted { session_id, status })
    }

    /// The caller's most recent sessions, newest first.
    pub async fn list_recent(&self, user_id: Uuid) -> Result<Vec<SessionOverview>, StudyError> {
        let mut sessions = self
            .db
            .list_recent_sessions(user_id, RECENT_SESSIONS_LIMIT)
            .await?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(RECENT_SESSIONS_LIMIT as usize);
        Ok(sessions)
    }

    /// Assembles the session row with whatever sub-resources the worker has
    /// written so far.
    ///
    /// Only the session row is mandatory. Summary, flashcards and quiz questions
    /// are read independently and each falls back to empty on its own.
    pub async fn get_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<StudySessionView, StudyError> {
        let session = self
            .db
            .get_study_session(session_id, user_id)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => StudyError::NotFound,
                other => {
                    error!("Failed to load study session {}: {}", session_id, other);
                    StudyError::Port(other)
                }
            })?;

        let (summary, flashcards, quiz_questions) = futures::join!(
            self.load_summary(session_id),
            self.load_flashcards(session_id),
            self.load_quiz_questions(session_id),
        );

        Ok(StudySessionView {
            session,
            summary,
            flashcards,
            quiz_questions,
        })
    }

    async fn load_summary(&self, session_id: Uuid) -> Summary {
        match self.db.get_summary(session_id).await {
            Ok(Some(summary)) => summary,
            Ok(None) => Summary::default(),
            Err(e) => {
                debug!("Summary unavailable for session {}: {}", session_id, e);
                Summary::default()
            }
        }
    }

    async fn load_flashcards(&self, session_id: Uuid) -> Vec<Flashcard> {
        self.db.get_flashcards(session_id).await.unwrap_or_else(|e| {
            debug!("Flashcards unavailable for session {}: {}", session_id, e);
            Vec::new()
        })
    }

    async fn load_quiz_questions(&self, session_id: Uuid) -> Vec<QuizQuestion> {
        match self.db.get_quiz_questions(session_id).await {
            Ok(mut questions) => {
                // Stable, so equal orders keep the store's sequence.
                questions.sort_by_key(|q| q.question_order);
                questions
            }
            Err(e) => {
                debug!("Quiz unavailable for session {}: {}", session_id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailingTable, InMemoryBlobStore, InMemoryDatabase, RecordingDispatcher};
    use std::collections::BTreeMap;

    struct Fixture {
        db: Arc<InMemoryDatabase>,
        dispatcher: Arc<RecordingDispatcher>,
        service: StudyService,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(InMemoryDatabase::new());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let service = StudyService::new(
            db.clone(),
            Arc::new(InMemoryBlobStore::default()),
            dispatcher.clone(),
        );
        Fixture { db, dispatcher, service }
    }

    fn question(order: i32, text: &str) -> QuizQuestion {
        QuizQuestion {
            id: Uuid::new_v4(),
            quiz_id: Uuid::nil(),
            question: text.to_string(),
            options: BTreeMap::from([("A".to_string(), "yes".to_string())]),
            correct_answer: "A".to_string(),
            explanation: String::new(),
            question_order: order,
        }
    }

    #[tokio::test]
    async fn upload_creates_uploaded_session() {
        let f = fixture();
        let user = Uuid::new_v4();

        let session = f
            .service
            .create_from_upload(user, Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        assert_eq!(session.user_id, user);
        assert_eq!(session.status, SessionStatus::Uploaded);
        assert!(session.image_url.starts_with("memory://"));
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let f = fixture();
        let result = f
            .service
            .create_from_upload(Uuid::new_v4(), Bytes::new(), "image/png")
            .await;
        assert!(matches!(result, Err(StudyError::Validation(_))));
    }

    #[tokio::test]
    async fn session_without_sub_resources_is_returned_empty() {
        let f = fixture();
        let user = Uuid::new_v4();
        let session = f.db.insert_session(user, "https://img/1.png");

        let view = f.service.get_session(session.id, user).await.unwrap();

        assert_eq!(view.session.id, session.id);
        assert_eq!(view.summary, Summary::default());
        assert!(view.flashcards.is_empty());
        assert!(view.quiz_questions.is_empty());
    }

    #[tokio::test]
    async fn foreign_session_is_not_found() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let session = f.db.insert_session(owner, "https://img/1.png");

        let result = f.service.get_session(session.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(StudyError::NotFound)));

        let missing = f.service.get_session(Uuid::new_v4(), owner).await;
        assert!(matches!(missing, Err(StudyError::NotFound)));
    }

    #[tokio::test]
    async fn quiz_questions_follow_question_order() {
        let f = fixture();
        let user = Uuid::new_v4();
        let session = f.db.insert_session(user, "https://img/1.png");
        f.db.insert_quiz_question(session.id, question(3, "third"));
        f.db.insert_quiz_question(session.id, question(1, "first"));
        f.db.insert_quiz_question(session.id, question(2, "second"));

        let view = f.service.get_session(session.id, user).await.unwrap();

        let texts: Vec<_> = view.quiz_questions.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn failing_sub_resource_degrades_independently() {
        let f = fixture();
        let user = Uuid::new_v4();
        let session = f.db.insert_session(user, "https://img/1.png");
        f.db.insert_summary(
            session.id,
            Summary {
                short_summary: "Cells".to_string(),
                ..Summary::default()
            },
        );
        f.db.insert_flashcard(session.id, "front", "back");
        f.db.fail_table(FailingTable::Flashcards);

        let view = f.service.get_session(session.id, user).await.unwrap();

        assert_eq!(view.summary.short_summary, "Cells");
        assert!(view.flashcards.is_empty());
    }

    #[tokio::test]
    async fn failing_summary_leaves_flashcards_and_quiz() {
        let f = fixture();
        let user = Uuid::new_v4();
        let session = f.db.insert_session(user, "https://img/1.png");
        f.db.insert_summary(
            session.id,
            Summary {
                short_summary: "Cells".to_string(),
                ..Summary::default()
            },
        );
        f.db.insert_flashcard(session.id, "front", "back");
        f.db.insert_quiz_question(session.id, question(1, "first"));
        f.db.fail_table(FailingTable::Summaries);

        let view = f.service.get_session(session.id, user).await.unwrap();

        assert_eq!(view.summary, Summary::default());
        assert_eq!(view.flashcards.len(), 1);
        assert_eq!(view.quiz_questions.len(), 1);
    }

    #[tokio::test]
    async fn failing_quiz_leaves_summary_and_flashcards() {
        let f = fixture();
        let user = Uuid::new_v4();
        let session = f.db.insert_session(user, "https://img/1.png");
        f.db.insert_summary(
            session.id,
            Summary {
                short_summary: "Cells".to_string(),
                ..Summary::default()
            },
        );
        f.db.insert_flashcard(session.id, "front", "back");
        f.db.insert_quiz_question(session.id, question(1, "first"));
        f.db.fail_table(FailingTable::QuizQuestions);

        let view = f.service.get_session(session.id, user).await.unwrap();

        assert_eq!(view.summary.short_summary, "Cells");
        assert_eq!(view.flashcards.len(), 1);
        assert!(view.quiz_questions.is_empty());
    }

    #[tokio::test]
    async fn question_without_options_is_kept() {
        let f = fixture();
        let user = Uuid::new_v4();
        let session = f.db.insert_session(user, "https://img/1.png");
        let mut bare = question(1, "no options");
        bare.options = BTreeMap::new();
        f.db.insert_quiz_question(session.id, bare);

        let view = f.service.get_session(session.id, user).await.unwrap();

        assert_eq!(view.quiz_questions.len(), 1);
        assert_eq!(view.quiz_questions[0].question, "no options");
        assert!(view.quiz_questions[0].options.is_empty());
    }

    #[tokio::test]
    async fn failing_session_row_is_fatal() {
        let f = fixture();
        let user = Uuid::new_v4();
        let session = f.db.insert_session(user, "https://img/1.png");
        f.db.fail_table(FailingTable::Sessions);

        let result = f.service.get_session(session.id, user).await;
        assert!(matches!(result, Err(StudyError::Port(PortError::Unexpected(_)))));
    }

    #[tokio::test]
    async fn begin_processing_updates_status_and_dispatches() {
        let f = fixture();
        let user = Uuid::new_v4();
        let session = f.db.insert_session(user, "https://img/1.png");

        let started = f
            .service
            .begin_processing(&session.id.to_string(), "https://img/1.png", user)
            .await
            .unwrap();

        assert_eq!(started.status, SessionStatus::Processing);
        assert_eq!(f.db.session_status(session.id), Some(SessionStatus::Processing));
        let sent = f.dispatcher.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].session_id, session.id);
        assert_eq!(sent[0].user_id, user);
    }

    #[tokio::test]
    async fn begin_processing_on_foreign_session_changes_nothing() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let session = f.db.insert_session(owner, "https://img/1.png");

        let result = f
            .service
            .begin_processing(&session.id.to_string(), "https://img/1.png", Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(StudyError::NotFound)));
        assert_eq!(f.db.session_status(session.id), Some(SessionStatus::Uploaded));
        assert!(f.dispatcher.requests().is_empty());
    }

    #[tokio::test]
    async fn begin_processing_requires_both_fields() {
        let f = fixture();
        let user = Uuid::new_v4();

        let no_id = f.service.begin_processing("", "https://img", user).await;
        assert!(matches!(no_id, Err(StudyError::Validation(_))));

        let no_url = f
            .service
            .begin_processing(&Uuid::new_v4().to_string(), "  ", user)
            .await;
        assert!(matches!(no_url, Err(StudyError::Validation(_))));

        let garbage = f.service.begin_processing("abc", "https://img", user).await;
        assert!(matches!(garbage, Err(StudyError::NotFound)));
    }

    #[tokio::test]
    async fn list_recent_is_scoped_newest_first_and_capped() {
        let f = fixture();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        for _ in 0..25 {
            f.db.insert_session(user, "https://img/a.png");
        }
        f.db.insert_session(other, "https://img/b.png");

        let sessions = f.service.list_recent(user).await.unwrap();

        assert_eq!(sessions.len(), RECENT_SESSIONS_LIMIT as usize);
        assert!(sessions.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        let other_sessions = f.service.list_recent(other).await.unwrap();
        assert_eq!(other_sessions.len(), 1);
    }
}
