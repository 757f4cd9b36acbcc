//! crates/neurostudy_core/src/memory.rs
//!
//! In-memory implementations of the ports, used by unit tests here and by the
//! api crate's integration tests (`test-util` feature). The database honours the
//! same scoping and uniqueness rules as the PostgreSQL adapter, and individual
//! tables can be switched into a failing mode to exercise degraded reads.

use crate::domain::{
    Flashcard, ProcessingRequest, QuizQuestion, SessionOverview, SessionStatus, StudySession,
    Summary, User, UserCredentials,
};
use crate::ports::{BlobStore, DatabaseService, PortError, PortResult, ProcessingDispatcher};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Tables that can be made to fail with `PortError::Unexpected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailingTable {
    Sessions,
    Summaries,
    Flashcards,
    QuizQuestions,
}

#[derive(Default)]
struct State {
    users: Vec<UserCredentials>,
    sessions: HashMap<Uuid, StudySession>,
    summaries: HashMap<Uuid, Summary>,
    flashcards: Vec<Flashcard>,
    // (session id, question) in insertion order
    quiz_questions: Vec<(Uuid, QuizQuestion)>,
    failing: HashSet<FailingTable>,
    tick: i64,
}

impl State {
    /// Strictly increasing timestamps so ordering by creation time is deterministic.
    fn next_timestamp(&mut self, epoch: DateTime<Utc>) -> DateTime<Utc> {
        self.tick += 1;
        epoch + Duration::milliseconds(self.tick)
    }

    fn check(&self, table: FailingTable) -> PortResult<()> {
        if self.failing.contains(&table) {
            return Err(PortError::Unexpected(format!("{:?} table unavailable", table)));
        }
        Ok(())
    }
}

pub struct InMemoryDatabase {
    epoch: DateTime<Utc>,
    state: Mutex<State>,
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self {
            epoch: Utc::now(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_table(&self, table: FailingTable) {
        self.state().failing.insert(table);
    }

    /// Inserts a session directly, as the upload path would.
    pub fn insert_session(&self, user_id: Uuid, image_url: &str) -> StudySession {
        let mut state = self.state();
        let now = state.next_timestamp(self.epoch);
        let session = StudySession {
            id: Uuid::new_v4(),
            user_id,
            title: None,
            image_url: image_url.to_string(),
            extracted_text: None,
            topic: None,
            status: SessionStatus::Uploaded,
            created_at: now,
            updated_at: now,
        };
        state.sessions.insert(session.id, session.clone());
        session
    }

    // The writers below stand in for the AI worker.

    pub fn insert_summary(&self, session_id: Uuid, summary: Summary) {
        self.state().summaries.insert(session_id, summary);
    }

    pub fn insert_flashcard(&self, session_id: Uuid, front: &str, back: &str) {
        self.state().flashcards.push(Flashcard {
            id: Uuid::new_v4(),
            session_id,
            front: front.to_string(),
            back: back.to_string(),
            is_bookmarked: false,
        });
    }

    pub fn insert_quiz_question(&self, session_id: Uuid, question: QuizQuestion) {
        self.state().quiz_questions.push((session_id, question));
    }

    pub fn session_status(&self, session_id: Uuid) -> Option<SessionStatus> {
        self.state().sessions.get(&session_id).map(|s| s.status.clone())
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> PortResult<User> {
        let mut state = self.state();
        if state.users.iter().any(|c| c.user.email == email) {
            return Err(PortError::Conflict(format!("email {} is taken", email)));
        }
        let now = state.next_timestamp(self.epoch);
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.users.push(UserCredentials {
            user: user.clone(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.state()
            .users
            .iter()
            .find(|c| c.user.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_study_session(&self, user_id: Uuid, image_url: &str) -> PortResult<StudySession> {
        self.state().check(FailingTable::Sessions)?;
        Ok(self.insert_session(user_id, image_url))
    }

    async fn get_study_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<StudySession> {
        let state = self.state();
        state.check(FailingTable::Sessions)?;
        state
            .sessions
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn list_recent_sessions(&self, user_id: Uuid, limit: i64) -> PortResult<Vec<SessionOverview>> {
        let state = self.state();
        state.check(FailingTable::Sessions)?;
        let mut sessions: Vec<_> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions
            .into_iter()
            .take(limit.max(0) as usize)
            .map(SessionOverview::from)
            .collect())
    }

    async fn update_session_status(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        status: &SessionStatus,
    ) -> PortResult<()> {
        let mut state = self.state();
        state.check(FailingTable::Sessions)?;
        let now = state.next_timestamp(self.epoch);
        match state
            .sessions
            .get_mut(&session_id)
            .filter(|s| s.user_id == user_id)
        {
            Some(session) => {
                session.status = status.clone();
                session.updated_at = now;
                Ok(())
            }
            None => Err(PortError::NotFound(format!("Session {} not found", session_id))),
        }
    }

    async fn get_summary(&self, session_id: Uuid) -> PortResult<Option<Summary>> {
        let state = self.state();
        state.check(FailingTable::Summaries)?;
        Ok(state.summaries.get(&session_id).cloned())
    }

    async fn get_flashcards(&self, session_id: Uuid) -> PortResult<Vec<Flashcard>> {
        let state = self.state();
        state.check(FailingTable::Flashcards)?;
        Ok(state
            .flashcards
            .iter()
            .filter(|f| f.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn get_quiz_questions(&self, session_id: Uuid) -> PortResult<Vec<QuizQuestion>> {
        let state = self.state();
        state.check(FailingTable::QuizQuestions)?;
        Ok(state
            .quiz_questions
            .iter()
            .filter(|(owner, _)| *owner == session_id)
            .map(|(_, q)| q.clone())
            .collect())
    }
}

/// Hands out `memory://` URLs and keeps nothing.
#[derive(Default)]
pub struct InMemoryBlobStore {
    stored: Mutex<usize>,
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn store(&self, data: Bytes, _content_type: &str) -> PortResult<String> {
        let mut stored = self.stored.lock().unwrap_or_else(|p| p.into_inner());
        *stored += 1;
        Ok(format!("memory://blobs/{}-{}", *stored, data.len()))
    }
}

/// Remembers every hand-off instead of sending it anywhere.
#[derive(Default)]
pub struct RecordingDispatcher {
    requests: Mutex<Vec<ProcessingRequest>>,
}

impl RecordingDispatcher {
    pub fn requests(&self) -> Vec<ProcessingRequest> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl ProcessingDispatcher for RecordingDispatcher {
    fn dispatch(&self, request: ProcessingRequest) {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request);
    }
}
