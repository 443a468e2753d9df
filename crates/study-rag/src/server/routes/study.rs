//! Quiz and exam paper endpoints

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::auth::AuthUser;
use crate::server::state::AppState;
use crate::types::api::{McqRequest, McqResponse, PaperRequest, PaperResponse, PapersResponse};
use crate::types::FolderKey;

use super::JsonBody;

/// POST /generate_mcqs - Multiple-choice questions from a folder
pub async fn generate_mcqs(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<McqRequest>,
) -> Result<Json<McqResponse>> {
    let key = FolderKey::new(user.user_id, request.folder_name)?;
    let questions = state.pipeline().generate_mcqs(&key, request.num_questions).await?;

    Ok(Json(McqResponse {
        total_questions: questions.len(),
        questions,
        folder: key.folder,
    }))
}

/// POST /generate_paper - Generate and store an exam paper
pub async fn generate_paper(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<PaperRequest>,
) -> Result<Json<PaperResponse>> {
    let key = FolderKey::new(user.user_id, request.folder_name)?;
    let artifact = state.pipeline().generate_paper(&key, request.marks).await?;

    Ok(Json(PaperResponse {
        status: "generated",
        artifact,
    }))
}

/// GET /get_papers - Papers generated by the caller, newest first
pub async fn get_papers(State(state): State<AppState>, user: AuthUser) -> Result<Json<PapersResponse>> {
    let papers = state.pipeline().list_papers(&user.user_id).await?;
    Ok(Json(PapersResponse {
        papers,
        user_id: user.user_id,
    }))
}
