//! Folder management and document upload endpoints

use axum::{
    extract::{Multipart, Path, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::auth::AuthUser;
use crate::server::state::AppState;
use crate::types::api::{EnsureFolderResponse, FolderRequest, FoldersResponse, UploadResponse};
use crate::types::FolderKey;

use super::JsonBody;

/// GET /folders - Folders owned by the caller
pub async fn list_folders(State(state): State<AppState>, user: AuthUser) -> Result<Json<FoldersResponse>> {
    let folders = state.pipeline().list_folders(&user.user_id).await?;
    Ok(Json(FoldersResponse {
        folders,
        user_id: user.user_id,
    }))
}

/// POST /folders - Create a folder if it does not exist yet
pub async fn ensure_folder(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<FolderRequest>,
) -> Result<Json<EnsureFolderResponse>> {
    let key = FolderKey::new(user.user_id, request.folder_name)?;
    let outcome = state.pipeline().ensure_folder(&key).await?;
    Ok(Json(EnsureFolderResponse {
        folder: key.folder,
        outcome,
    }))
}

/// POST /upload/:folder_name - Upload PDFs (multipart field `file`, repeatable)
pub async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    Path(folder_name): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let key = FolderKey::new(user.user_id, folder_name)?;
    let mut uploaded = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid_input(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::invalid_input("Uploaded file has no file name"))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::invalid_input(format!("Failed to read {}: {}", filename, e)))?;

        let path = state.pipeline().upload_document(&key, &filename, data).await?;
        uploaded.push(path);
    }

    if uploaded.is_empty() {
        return Err(Error::invalid_input("No files provided (expected multipart field \"file\")"));
    }

    tracing::info!("Uploaded {} file(s) to {}", uploaded.len(), key);
    Ok(Json(UploadResponse {
        folder: key.folder,
        uploaded,
    }))
}
