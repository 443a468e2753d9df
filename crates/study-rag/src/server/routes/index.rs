//! Folder indexing endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::auth::AuthUser;
use crate::server::state::AppState;
use crate::types::api::{FolderRequest, IndexResponse};
use crate::types::FolderKey;

use super::JsonBody;

/// POST /index_folder - (Re)build the vector index for a folder
pub async fn index_folder(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<FolderRequest>,
) -> Result<Json<IndexResponse>> {
    let key = FolderKey::new(user.user_id, request.folder_name)?;
    let report = state.pipeline().index_folder(&key).await?;

    Ok(Json(IndexResponse {
        status: "indexed",
        folder: report.key.folder,
        user_id: report.key.user_id,
        files_processed: report.files_processed,
        chunks_created: report.chunks_created,
        skipped: report.skipped,
    }))
}
