//! Grounded question answering endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::auth::AuthUser;
use crate::server::state::AppState;
use crate::types::api::{ChatRequest, ChatResponse};
use crate::types::FolderKey;

use super::JsonBody;

/// POST /chat - Answer a question from one folder's documents
pub async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let start = Instant::now();
    let key = FolderKey::new(user.user_id, request.folder_name)?;

    tracing::info!("Chat on {}: \"{}\"", key, request.query);
    let answer = state.pipeline().answer(&key, &request.query).await?;
    tracing::info!(
        "Answered in {}ms citing {} sources",
        start.elapsed().as_millis(),
        answer.sources.len()
    );

    Ok(Json(ChatResponse {
        answer: answer.answer,
        folder: key.folder,
        user_id: key.user_id,
        sources: answer.sources,
    }))
}
