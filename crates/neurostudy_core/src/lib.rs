pub mod domain;
pub mod ports;
pub mod study;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use domain::{
    Flashcard, ProcessingRequest, QuizQuestion, SessionOverview, SessionStatus, StudySession,
    StudySessionView, Summary, User, UserCredentials,
};
pub use ports::{BlobStore, DatabaseService, PortError, PortResult, ProcessingDispatcher};
pub use study::{ProcessingStarted, StudyError, StudyService, RECENT_SESSIONS_LIMIT};
