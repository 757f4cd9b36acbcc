//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the study endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ApiResult};
use crate::web::auth::{json_body, AuthResponse, LoginRequest, RegisterRequest, UserResponse};
use crate::web::middleware::AuthUser;
use crate::web::response::{created, ApiResponse};
use crate::web::state::AppState;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use neurostudy_core::{Flashcard, QuizQuestion, SessionOverview, StudySessionView};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

/// Name of the multipart field carrying the note image.
const IMAGE_FIELD: &str = "image";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::register_handler,
        crate::web::auth::login_handler,
        upload_handler,
        process_handler,
        recent_sessions_handler,
        get_session_handler,
        health_handler,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            UserResponse,
            UploadResponse,
            ProcessRequest,
            ProcessResponse,
            SessionListItem,
            StudySessionResponse,
            FlashcardResponse,
            QuizQuestionResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "NeuroStudy API", description = "Study sessions generated from photographed notes.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub session_id: Uuid,
    pub image_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ProcessRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProcessResponse {
    pub session_id: Uuid,
    pub status: String,
    pub message: String,
}

/// One row of the recent-sessions listing. Missing text fields are empty strings.
#[derive(Serialize, ToSchema)]
pub struct SessionListItem {
    pub id: Uuid,
    pub title: String,
    pub topic: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<SessionOverview> for SessionListItem {
    fn from(overview: SessionOverview) -> Self {
        Self {
            id: overview.id,
            title: overview.title.unwrap_or_default(),
            topic: overview.topic.unwrap_or_default(),
            status: overview.status.to_string(),
            created_at: overview.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardResponse {
    pub front: String,
    pub back: String,
}

impl From<Flashcard> for FlashcardResponse {
    fn from(card: Flashcard) -> Self {
        Self {
            front: card.front,
            back: card.back,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct QuizQuestionResponse {
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    pub explanation: String,
}

impl From<QuizQuestion> for QuizQuestionResponse {
    fn from(question: QuizQuestion) -> Self {
        Self {
            question: question.question,
            options: question.options,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
        }
    }
}

/// The flat study-session document the mobile client renders.
#[derive(Serialize, ToSchema)]
pub struct StudySessionResponse {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    pub extracted_text: String,
    pub topic: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub short_summary: String,
    pub detailed_summary: String,
    pub simplified_explanation: String,
    pub key_concepts: Vec<String>,
    pub flashcards: Vec<FlashcardResponse>,
    pub quiz_questions: Vec<QuizQuestionResponse>,
}

impl From<StudySessionView> for StudySessionResponse {
    fn from(view: StudySessionView) -> Self {
        let StudySessionView {
            session,
            summary,
            flashcards,
            quiz_questions,
        } = view;
        Self {
            id: session.id,
            title: session.title.unwrap_or_default(),
            image_url: session.image_url,
            extracted_text: session.extracted_text.unwrap_or_default(),
            topic: session.topic.unwrap_or_default(),
            status: session.status.to_string(),
            created_at: session.created_at,
            short_summary: summary.short_summary,
            detailed_summary: summary.detailed_summary,
            simplified_explanation: summary.simplified_explanation,
            key_concepts: summary.key_concepts,
            flashcards: flashcards.into_iter().map(Into::into).collect(),
            quiz_questions: quiz_questions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

fn multipart_error(e: MultipartError) -> ApiError {
    debug!("Failed to read multipart data: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::Validation("file too large".to_string())
    } else {
        ApiError::Validation("invalid multipart body".to_string())
    }
}

/// Upload a photographed note and open a study session for it.
///
/// Accepts a multipart/form-data request with the image in the `image` field.
#[utoipa::path(
    post,
    path = "/api/v1/upload",
    request_body(content_type = "multipart/form-data", description = "The note image, in the `image` field."),
    responses(
        (status = 201, description = "Session created", body = UploadResponse),
        (status = 400, description = "Missing, empty or non-image upload"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!("Rejected upload: {}", rejection);
        ApiError::Validation("expected a multipart/form-data body".to_string())
    })?;

    let mut image: Option<(Bytes, String)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::Validation("uploaded file must be an image".to_string()));
        }
        let data = field.bytes().await.map_err(multipart_error)?;
        image = Some((data, content_type));
        break;
    }

    let (data, content_type) =
        image.ok_or_else(|| ApiError::Validation("no image provided".to_string()))?;

    let session = state
        .study
        .create_from_upload(auth.user_id, data, &content_type)
        .await?;
    info!("Upload stored for session {}", session.id);

    Ok(created(UploadResponse {
        session_id: session.id,
        image_url: session.image_url,
    }))
}

/// Start AI processing of an uploaded session.
#[utoipa::path(
    post,
    path = "/api/v1/process",
    request_body = ProcessRequest,
    responses(
        (status = 200, description = "Processing started", body = ProcessResponse),
        (status = 400, description = "Missing session_id or image_url"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn process_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let req = json_body(payload)?;
    let started = state
        .study
        .begin_processing(&req.session_id, &req.image_url, auth.user_id)
        .await?;

    Ok(ApiResponse::ok(ProcessResponse {
        session_id: started.session_id,
        status: started.status.to_string(),
        message: "Image processing started".to_string(),
    })
    .into_response())
}

/// The caller's most recent study sessions, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/study/recent",
    responses(
        (status = 200, description = "Up to 20 sessions", body = Vec<SessionListItem>),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn recent_sessions_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<Response> {
    let sessions = state.study.list_recent(auth.user_id).await?;
    let items: Vec<SessionListItem> = sessions.into_iter().map(Into::into).collect();
    Ok(ApiResponse::ok(items).into_response())
}

/// A study session with its summary, flashcards and quiz.
#[utoipa::path(
    get,
    path = "/api/v1/study/{id}",
    params(
        ("id" = String, Path, description = "The study session id.")
    ),
    responses(
        (status = 200, description = "The aggregated session", body = StudySessionResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let session_id = Uuid::parse_str(id.trim()).map_err(|_| ApiError::NotFound)?;
    let view = state.study.get_session(session_id, auth.user_id).await?;
    Ok(ApiResponse::ok(StudySessionResponse::from(view)).into_response())
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "backend".to_string(),
    })
}
