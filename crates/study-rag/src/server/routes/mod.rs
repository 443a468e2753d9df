//! API routes for the study server

pub mod chat;
pub mod folders;
pub mod index;
pub mod study;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Request},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::server::state::AppState;

/// Routes that require an authenticated user
pub fn protected_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/index_folder", post(index::index_folder))
        .route("/chat", post(chat::chat))
        .route("/folders", get(folders::list_folders).post(folders::ensure_folder))
        .route(
            "/upload/:folder_name",
            post(folders::upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/generate_mcqs", post(study::generate_mcqs))
        .route("/generate_paper", post(study::generate_paper))
        .route("/get_papers", get(study::get_papers))
}

/// Public API metadata
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/info", get(info))
}

/// JSON body whose rejections are reported as invalid input
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(Error::invalid_input(rejection_message(rejection))),
        }
    }
}

fn rejection_message(rejection: JsonRejection) -> String {
    format!("Invalid request body: {}", rejection.body_text())
}

/// API info endpoint
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "study-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Question answering, quizzes and exam papers over folders of PDFs",
        "authentication": "Authorization: Bearer <jwt> on every endpoint except /health, /ready and /api/info",
        "endpoints": {
            "POST /index_folder": "Build the vector index for a folder",
            "POST /chat": "Answer a question from a folder's documents",
            "GET /folders": "List folders",
            "POST /folders": "Create a folder if it does not exist",
            "POST /upload/:folder_name": "Upload PDFs into a folder (multipart, field \"file\")",
            "POST /generate_mcqs": "Generate 5-15 multiple-choice questions",
            "POST /generate_paper": "Generate a 20 or 60 mark exam paper",
            "GET /get_papers": "List generated papers",
            "GET /health": "Liveness",
            "GET /ready": "Readiness of the embedding and LLM backends"
        }
    }))
}
