//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neurostudy_core::domain::{
    parse_key_concepts, parse_quiz_options, Flashcard, QuizQuestion, SessionOverview,
    SessionStatus, StudySession, Summary, User, UserCredentials,
};
use neurostudy_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "id, email, full_name, created_at, updated_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    full_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            full_name: self.full_name.unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    #[sqlx(flatten)]
    user: UserRecord,
    password_hash: String,
}

const SESSION_COLUMNS: &str =
    "id, user_id, title, image_url, extracted_text, topic, status, created_at, updated_at";

#[derive(FromRow)]
struct StudySessionRecord {
    id: Uuid,
    user_id: Uuid,
    title: Option<String>,
    image_url: String,
    extracted_text: Option<String>,
    topic: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl StudySessionRecord {
    fn to_domain(self) -> StudySession {
        StudySession {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            image_url: self.image_url,
            extracted_text: self.extracted_text,
            topic: self.topic,
            status: SessionStatus::from(self.status.as_str()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SessionOverviewRecord {
    id: Uuid,
    title: Option<String>,
    topic: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}
impl SessionOverviewRecord {
    fn to_domain(self) -> SessionOverview {
        SessionOverview {
            id: self.id,
            title: self.title,
            topic: self.topic,
            status: SessionStatus::from(self.status.as_str()),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    short_summary: Option<String>,
    detailed_summary: Option<String>,
    simplified_explanation: Option<String>,
    key_concepts: Option<String>,
}
impl SummaryRecord {
    fn to_domain(self) -> Summary {
        Summary {
            short_summary: self.short_summary.unwrap_or_default(),
            detailed_summary: self.detailed_summary.unwrap_or_default(),
            simplified_explanation: self.simplified_explanation.unwrap_or_default(),
            key_concepts: parse_key_concepts(self.key_concepts.as_deref()),
        }
    }
}

#[derive(FromRow)]
struct FlashcardRecord {
    id: Uuid,
    session_id: Uuid,
    front: String,
    back: String,
    is_bookmarked: bool,
}
impl FlashcardRecord {
    fn to_domain(self) -> Flashcard {
        Flashcard {
            id: self.id,
            session_id: self.session_id,
            front: self.front,
            back: self.back,
            is_bookmarked: self.is_bookmarked,
        }
    }
}

#[derive(FromRow)]
struct QuizQuestionRecord {
    id: Uuid,
    quiz_id: Uuid,
    question: String,
    options: Option<String>,
    correct_answer: Option<String>,
    explanation: Option<String>,
    question_order: i32,
}
impl QuizQuestionRecord {
    fn to_domain(self) -> QuizQuestion {
        QuizQuestion {
            id: self.id,
            quiz_id: self.quiz_id,
            question: self.question,
            options: parse_quiz_options(self.options.as_deref()),
            correct_answer: self.correct_answer.unwrap_or_default(),
            explanation: self.explanation.unwrap_or_default(),
            question_order: self.question_order,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (email, password_hash, full_name) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(email)
        .bind(hashed_password)
        .bind(full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                PortError::Conflict(format!("User {} already exists", email))
            }
            other => unexpected(other),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(&format!(
            "SELECT {}, password_hash FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;

        Ok(UserCredentials {
            user: record.user.to_domain(),
            hashed_password: record.password_hash,
        })
    }

    async fn create_study_session(&self, user_id: Uuid, image_url: &str) -> PortResult<StudySession> {
        let record = sqlx::query_as::<_, StudySessionRecord>(&format!(
            "INSERT INTO study_sessions (user_id, image_url, status) VALUES ($1, $2, $3) RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(image_url)
        .bind(SessionStatus::Uploaded.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_study_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<StudySession> {
        let record = sqlx::query_as::<_, StudySessionRecord>(&format!(
            "SELECT {} FROM study_sessions WHERE id = $1 AND user_id = $2",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        Ok(record.to_domain())
    }

    async fn list_recent_sessions(&self, user_id: Uuid, limit: i64) -> PortResult<Vec<SessionOverview>> {
        let records = sqlx::query_as::<_, SessionOverviewRecord>(
            "SELECT id, title, topic, status, created_at FROM study_sessions \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_session_status(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        status: &SessionStatus,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE study_sessions SET status = $1, updated_at = NOW() WHERE id = $2 AND user_id = $3",
        )
        .bind(status.as_str())
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn get_summary(&self, session_id: Uuid) -> PortResult<Option<Summary>> {
        let record = sqlx::query_as::<_, SummaryRecord>(
            "SELECT short_summary, detailed_summary, simplified_explanation, \
                    key_concepts::text AS key_concepts \
             FROM summaries WHERE session_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn get_flashcards(&self, session_id: Uuid) -> PortResult<Vec<Flashcard>> {
        let records = sqlx::query_as::<_, FlashcardRecord>(
            "SELECT id, session_id, front, back, is_bookmarked FROM flashcards WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_quiz_questions(&self, session_id: Uuid) -> PortResult<Vec<QuizQuestion>> {
        let records = sqlx::query_as::<_, QuizQuestionRecord>(
            "SELECT q.id, q.quiz_id, q.question, q.options::text AS options, \
                    q.correct_answer, q.explanation, q.question_order \
             FROM quiz_questions q \
             JOIN quizzes qz ON q.quiz_id = qz.id \
             WHERE qz.session_id = $1 \
             ORDER BY q.question_order ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
