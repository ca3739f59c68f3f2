use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::Html,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extractors::{AppJson, AppPath};
use crate::models::document::Document;
use crate::session::controller::{AskReply, BuildSummary, SessionEvent, SessionOutcome};
use crate::session::render::{render_html, RenderedTurn};
use crate::state::AppState;

/// Multipart field carrying uploaded CVs; repeat it for several files.
pub const UPLOAD_FIELD: &str = "files";

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

#[derive(Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub indexed: bool,
    /// Chunks in the current index; zero before the first build.
    pub chunks: usize,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<RenderedTurn>,
}

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.sessions.insert(state.new_session()).await;
    let live = state.sessions.len().await;
    info!("Created session {session_id} ({live} live)");
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.sessions.get(id).await?;
    let session = session.lock().await;
    Ok(Json(SessionView {
        session_id: id,
        indexed: session.is_indexed(),
        chunks: session.indexed_chunks(),
        created_at: session.created_at(),
        turns: session.turns(),
    }))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_end_session(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        info!("Ended session {id}");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {id} not found")))
    }
}

/// POST /api/v1/sessions/:id/documents
pub async fn handle_build_index(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BuildSummary>, AppError> {
    let session = state.sessions.get(id).await?;
    let mut multipart = multipart?;

    let mut documents = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read '{file_name}': {e}")))?;
        documents.push(Document::new(file_name, bytes));
    }

    let mut session = session.lock().await;
    match session.handle(SessionEvent::BuildIndex(documents)).await? {
        SessionOutcome::Indexed(summary) => Ok(Json(summary)),
        SessionOutcome::Answered(_) => Err(AppError::Internal(anyhow::anyhow!(
            "index build produced an answer"
        ))),
    }
}

/// POST /api/v1/sessions/:id/questions
pub async fn handle_ask(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<AskRequest>,
) -> Result<Json<AskReply>, AppError> {
    let session = state.sessions.get(id).await?;
    let mut session = session.lock().await;
    match session.handle(SessionEvent::AskQuestion(req.question)).await? {
        SessionOutcome::Answered(reply) => Ok(Json(reply)),
        SessionOutcome::Indexed(_) => Err(AppError::Internal(anyhow::anyhow!(
            "question produced an index build"
        ))),
    }
}

/// GET /api/v1/sessions/:id/transcript
pub async fn handle_transcript(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Html<String>, AppError> {
    let session = state.sessions.get(id).await?;
    let session = session.lock().await;
    Ok(Html(render_html(&session.turns())))
}
