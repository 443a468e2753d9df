//! End-to-end HTTP tests with in-process fakes for extraction, embeddings and the LLM

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use study_rag::{
    config::RagConfig,
    ingestion::{DocumentLoader, PageText, ParsedDocument},
    providers::{EmbeddingProvider, LlmProvider},
    server::{auth::Claims, build_router, state::AppState},
    storage::LocalBlobStore,
    Error, RagPipeline, Result,
};

const SECRET: &str = "integration-test-secret-with-enough-length";
const DIMS: usize = 32;

struct TextLoader;

#[async_trait]
impl DocumentLoader for TextLoader {
    async fn load(&self, filename: &str, data: Bytes) -> Result<ParsedDocument> {
        let text = String::from_utf8(data.to_vec()).map_err(|e| Error::file_parse(filename, e.to_string()))?;
        Ok(ParsedDocument {
            filename: filename.to_string(),
            content_hash: format!("{:x}", text.len()),
            pages: text
                .split('\u{000C}')
                .enumerate()
                .map(|(i, page)| PageText {
                    page_number: i as u32 + 1,
                    content: page.to_string(),
                })
                .collect(),
        })
    }

    fn name(&self) -> &str {
        "text"
    }
}

/// Letter-frequency vectors: deterministic and good enough to rank overlap
struct LetterEmbedder;

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; DIMS];
        for c in text.to_lowercase().chars().filter(char::is_ascii_lowercase) {
            v[(c as usize - 'a' as usize) % DIMS] += 1.0;
        }
        v[DIMS - 1] += 0.5;
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "letters"
    }
}

/// Answers according to which prompt it receives
struct FakeLlm;

fn mcq_array(n: usize) -> String {
    let items: Vec<String> = (0..n)
        .map(|i| {
            json!({
                "question": format!("Question {} about photosynthesis?", i + 1),
                "options": ["light", "water", "soil", "air"],
                "correct_answer": i % 4,
                "explanation": "Stated in the notes."
            })
            .to_string()
        })
        .collect();
    format!("[{}]", items.join(","))
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.contains("multiple-choice questions") {
            Ok(format!("<think>drafting</think>\n```json\n{}\n```", mcq_array(15)))
        } else if prompt.contains("question paper") {
            Ok("Section A: Multiple Choice Questions\n1. What do plants need? [1 mark]".to_string())
        } else {
            Ok("<think>checking the notes</think>Plants use sunlight to make sugar.".to_string())
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-1"
    }
}

struct TestApp {
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = RagConfig::default();
        config.auth.jwt_secret = SECRET.to_string();
        config.storage.local_root = dir.path().join("blobs");
        config.storage.index_root = dir.path().join("indexes");
        config.chunking.chunk_size = 120;
        config.chunking.chunk_overlap = 20;

        let blobs = Arc::new(LocalBlobStore::new(&config.storage.local_root).unwrap());
        let pipeline = RagPipeline::new(config, blobs, Arc::new(TextLoader), Arc::new(LetterEmbedder), Arc::new(FakeLlm))
            .unwrap();

        Self {
            router: build_router(AppState::from_pipeline(pipeline)),
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1_000_000).await.unwrap();
        let value = serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
        (status, value)
    }

    async fn post(&self, user: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::AUTHORIZATION, bearer(user))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, user: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri)
            .header(header::AUTHORIZATION, bearer(user))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn upload(&self, user: &str, folder: &str, files: &[(&str, &str)]) -> (StatusCode, Value) {
        let boundary = "study-rag-test-boundary";
        let mut body = String::new();
        for (name, content) in files {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));

        let request = Request::post(format!("/upload/{}", folder))
            .header(header::AUTHORIZATION, bearer(user))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn seed_biology(&self, user: &str) {
        let (status, body) = self
            .upload(
                user,
                "Biology",
                &[
                    ("plants.pdf", "Photosynthesis turns sunlight, water and carbon dioxide into sugar.\u{000C}Chlorophyll absorbs light in the chloroplasts."),
                    ("cells.pdf", "Mitochondria release energy from glucose through respiration."),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let (status, body) = self.post(user, "/index_folder", json!({"folder_name": "Biology"})).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }
}

fn bearer(user: &str) -> String {
    let claims = Claims {
        sub: user.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as u64,
        aud: None,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
    format!("Bearer {}", token)
}

#[tokio::test]
async fn test_public_endpoints() {
    let app = TestApp::new();
    let (status, body) = app.send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));

    let (status, body) = app.send(Request::get("/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["llm"], true);

    let (status, body) = app.send(Request::get("/api/info").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "study-rag");
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let app = TestApp::new();

    let request = Request::get("/folders").body(Body::empty()).unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "unauthenticated");

    let request = Request::post("/chat")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"folder_name": "Biology", "query": "hi"}).to_string()))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_index_and_chat() {
    let app = TestApp::new();
    app.seed_biology("alice").await;

    let (status, body) = app
        .post("alice", "/chat", json!({"folder_name": "Biology", "query": "How does photosynthesis use sunlight?"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["answer"], "Plants use sunlight to make sugar.");
    assert_eq!(body["user_id"], "alice");
    let sources = body["sources"].as_array().unwrap();
    assert!(!sources.is_empty());
    assert!(sources.iter().any(|s| s["filename"] == "plants.pdf"));
}

#[tokio::test]
async fn test_index_report_counts() {
    let app = TestApp::new();
    app.upload("alice", "Biology", &[("plants.pdf", "Leaves hold chlorophyll."), ("empty.pdf", "   ")])
        .await;

    let (status, body) = app.post("alice", "/index_folder", json!({"folder_name": "Biology"})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "indexed");
    assert_eq!(body["files_processed"], 1);
    assert_eq!(body["chunks_created"], 1);
    assert_eq!(body["skipped"][0]["filename"], "empty.pdf");
}

#[tokio::test]
async fn test_missing_folders_and_indexes() {
    let app = TestApp::new();

    let (status, _) = app.post("alice", "/index_folder", json!({"folder_name": "Nothing"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.post("alice", "/chat", json!({"folder_name": "Nothing", "query": "anything"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_indexed");

    app.upload("alice", "Blank", &[("blank.pdf", " ")]).await;
    let (status, body) = app.post("alice", "/index_folder", json!({"folder_name": "Blank"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "no_extractable_text");
}

#[tokio::test]
async fn test_folders_are_per_user() {
    let app = TestApp::new();
    app.seed_biology("alice").await;

    let (status, body) = app.post("alice", "/chat", json!({"folder_name": "Biology", "query": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, _) = app.post("bob", "/chat", json!({"folder_name": "Biology", "query": "sugar?"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("alice", "/folders").await;
    assert_eq!(body["folders"], json!(["Biology"]));
    let (_, body) = app.get("bob", "/folders").await;
    assert_eq!(body["folders"], json!([]));
}

#[tokio::test]
async fn test_ensure_folder_is_idempotent() {
    let app = TestApp::new();

    let (status, body) = app.post("alice", "/folders", json!({"folder_name": "Chemistry"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "created");

    let (_, body) = app.post("alice", "/folders", json!({"folder_name": "Chemistry"})).await;
    assert_eq!(body["outcome"], "already_exists");

    let (status, _) = app.post("alice", "/folders", json!({"folder_name": "papers"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.post("alice", "/folders", json!({"folder_name": "a/b"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.post("alice", "/folders", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("alice", "/folders").await;
    assert_eq!(body["folders"], json!(["Chemistry"]));
}

#[tokio::test]
async fn test_upload_rejects_other_file_types() {
    let app = TestApp::new();
    let (status, _) = app.upload("alice", "Biology", &[("notes.txt", "hello")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.upload("alice", "Biology", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_mcqs() {
    let app = TestApp::new();
    app.seed_biology("alice").await;

    let (status, body) = app
        .post("alice", "/generate_mcqs", json!({"folder_name": "Biology", "num_questions": 5}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["total_questions"], 5);
    let first = &body["questions"][0];
    assert_eq!(first["options"].as_array().unwrap().len(), 4);
    assert!(first["correct_answer"].as_u64().unwrap() < 4);

    let (status, body) = app.post("alice", "/generate_mcqs", json!({"folder_name": "Biology"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_questions"], 10);

    for n in [4, 16] {
        let (status, _) = app
            .post("alice", "/generate_mcqs", json!({"folder_name": "Biology", "num_questions": n}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_generate_and_list_papers() {
    let app = TestApp::new();
    app.seed_biology("alice").await;

    let (status, body) = app.post("alice", "/generate_paper", json!({"folder_name": "Biology", "marks": 20})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "generated");
    assert_eq!(body["marks"], 20);
    assert!(body["path"].as_str().unwrap().starts_with("alice/papers/Biology_20marks_"));
    assert!(body["url"].as_str().unwrap().starts_with("file://"));

    let (status, _) = app.post("alice", "/generate_paper", json!({"folder_name": "Biology", "marks": 60})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post("alice", "/generate_paper", json!({"folder_name": "Biology", "marks": 40})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("alice", "/get_papers").await;
    assert_eq!(status, StatusCode::OK);
    let papers = body["papers"].as_array().unwrap();
    assert_eq!(papers.len(), 2);
    assert_eq!(papers[0]["marks"], 60);
    assert_eq!(papers[1]["marks"], 20);

    let (_, body) = app.get("alice", "/folders").await;
    assert_eq!(body["folders"], json!(["Biology"]));

    let (_, body) = app.get("bob", "/get_papers").await;
    assert_eq!(body["papers"], json!([]));
}

#[tokio::test]
async fn test_same_marks_papers_are_kept_apart() {
    let app = TestApp::new();
    app.seed_biology("alice").await;

    let (status, first) = app.post("alice", "/generate_paper", json!({"folder_name": "Biology", "marks": 20})).await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    let (status, second) = app.post("alice", "/generate_paper", json!({"folder_name": "Biology", "marks": 20})).await;
    assert_eq!(status, StatusCode::OK, "{}", second);
    assert_ne!(first["path"], second["path"]);

    let (_, body) = app.get("alice", "/get_papers").await;
    let papers = body["papers"].as_array().unwrap();
    assert_eq!(papers.len(), 2);
    let mut paths: Vec<&str> = papers.iter().map(|p| p["path"].as_str().unwrap()).collect();
    paths.sort();
    let mut expected = vec![first["path"].as_str().unwrap(), second["path"].as_str().unwrap()];
    expected.sort();
    assert_eq!(paths, expected);
}
