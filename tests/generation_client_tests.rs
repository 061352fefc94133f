use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio::fs;
use tokio::net::TcpListener;
use url::Url;
use yonkoma::GenerationError;
use yonkoma::config::GenerationConfig;
use yonkoma::db::Store;
use yonkoma::db::settings::{DEFAULT_IMAGE_MODEL, GEMINI_API_KEY, TEXT_MODEL};
use yonkoma::generation::{ComicRequest, GenerationClient, Generator};

const API_KEY: &str = "test-key";

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    headers: HeaderMap,
    body: Value,
}

/// Replies with the scripted responses in order, repeating the last one.
#[derive(Clone, Default)]
struct MockState {
    reqs: Arc<Mutex<Vec<Captured>>>,
    replies: Arc<Mutex<VecDeque<(StatusCode, String)>>>,
}

impl MockState {
    fn scripted(replies: Vec<(StatusCode, String)>) -> Self {
        Self {
            reqs: Arc::default(),
            replies: Arc::new(Mutex::new(replies.into())),
        }
    }

    fn captured(&self) -> Vec<Captured> {
        self.reqs.lock().unwrap().clone()
    }
}

async fn generate_handler(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.reqs.lock().unwrap().push(Captured {
        path: uri.path().to_string(),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let mut replies = state.replies.lock().unwrap();
    let (status, body) = if replies.len() > 1 {
        replies.pop_front().unwrap()
    } else {
        replies.front().cloned().unwrap()
    };
    (status, body).into_response()
}

async fn spawn_test_server(state: MockState) -> Url {
    let app = Router::new()
        .route("/v1beta/models/{*rest}", post(generate_handler))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{addr}")).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

fn temp_db(tag: &str) -> (PathBuf, String) {
    let mut hasher = DefaultHasher::new();
    SystemTime::now().hash(&mut hasher);
    let db_path = std::env::temp_dir().join(format!("test_{tag}_{}.sqlite", hasher.finish()));
    let database_url = format!("sqlite:{}", db_path.to_str().unwrap());
    (db_path, database_url)
}

async fn remove_db(db_path: &Path) {
    let wal_path = PathBuf::from(format!("{}-wal", db_path.to_string_lossy()));
    let shm_path = PathBuf::from(format!("{}-shm", db_path.to_string_lossy()));
    let _ = fs::remove_file(&wal_path).await;
    let _ = fs::remove_file(&shm_path).await;
    fs::remove_file(db_path).await.unwrap();
}

async fn client_for(base_url: Url, store: &Store) -> GenerationClient {
    let config = GenerationConfig {
        base_url,
        timeout_secs: 10,
        retry_max_times: 2,
        ..Default::default()
    };
    GenerationClient::new(store.clone(), config).expect("build client")
}

fn text_reply(text: &str) -> (StatusCode, String) {
    let body = json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    });
    (StatusCode::OK, body.to_string())
}

fn image_reply(data: &str) -> (StatusCode, String) {
    let body = json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "inlineData": { "mimeType": "image/png", "data": data } }]
            }
        }]
    });
    (StatusCode::OK, body.to_string())
}

fn error_reply(status: StatusCode, message: &str, reason: &str) -> (StatusCode, String) {
    let body = json!({
        "error": { "code": status.as_u16(), "message": message, "status": reason }
    });
    (status, body.to_string())
}

fn comic_request() -> ComicRequest {
    ComicRequest {
        topic: "rain".to_string(),
        title: "Wet".to_string(),
        panels: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        characters: Vec::new(),
    }
}

#[tokio::test]
async fn test_text_call_uses_stored_key_and_model() {
    let (db_path, database_url) = temp_db("client_text");
    let store = Store::new(&database_url);
    store.set_setting(GEMINI_API_KEY, API_KEY).await.unwrap();
    store.set_setting(TEXT_MODEL, "my-text-model").await.unwrap();

    let profile_json = r#"```json
{"name": "Tama", "appearance": "white fur", "firstPerson": "wagahai", "personality": "proud"}
```"#;
    let mock = MockState::scripted(vec![text_reply(profile_json)]);
    let base = spawn_test_server(mock.clone()).await;
    let client = client_for(base, &store).await;

    let profile = client
        .generate_character_profile("a proud white cat")
        .await
        .unwrap();
    assert_eq!(profile.name, "Tama");
    assert_eq!(profile.appearance, "white fur");
    assert_eq!(profile.first_person, "wagahai");

    let reqs = mock.captured();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].path, "/v1beta/models/my-text-model:generateContent");
    assert_eq!(
        reqs[0].headers.get("x-goog-api-key").unwrap().to_str().unwrap(),
        API_KEY
    );
    let prompt = reqs[0].body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap();
    assert!(prompt.contains("a proud white cat"));

    remove_db(&db_path).await;
}

#[tokio::test]
async fn test_blank_api_key_never_reaches_upstream() {
    let (db_path, database_url) = temp_db("client_missing_key");
    let store = Store::new(&database_url);

    let mock = MockState::scripted(vec![text_reply("{}")]);
    let base = spawn_test_server(mock.clone()).await;
    let client = client_for(base, &store).await;

    let err = client.generate_character_profile("x").await.unwrap_err();
    assert!(matches!(err, GenerationError::MissingApiKey), "got {err:?}");

    store.set_setting(GEMINI_API_KEY, "   ").await.unwrap();
    let err = client.generate_full_comic(&comic_request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::MissingApiKey), "got {err:?}");

    assert!(mock.captured().is_empty());

    remove_db(&db_path).await;
}

#[tokio::test]
async fn test_upstream_errors_are_mapped_without_retry() {
    let (db_path, database_url) = temp_db("client_errors");
    let store = Store::new(&database_url);
    store.set_setting(GEMINI_API_KEY, API_KEY).await.unwrap();

    // Gemini envelope
    let mock = MockState::scripted(vec![error_reply(
        StatusCode::BAD_REQUEST,
        "API key not valid.",
        "INVALID_ARGUMENT",
    )]);
    let base = spawn_test_server(mock.clone()).await;
    let client = client_for(base, &store).await;

    let err = client.generate_full_comic(&comic_request()).await.unwrap_err();
    match &err {
        GenerationError::UpstreamMapped { status, body } => {
            assert_eq!(*status, StatusCode::BAD_REQUEST);
            assert_eq!(body.inner.message, "API key not valid.");
            assert_eq!(body.inner.status, "INVALID_ARGUMENT");
        }
        other => panic!("Expected UpstreamMapped, got {other:?}"),
    }
    assert_eq!(mock.captured().len(), 1, "4xx must not be retried");

    // Anything else
    let mock = MockState::scripted(vec![(StatusCode::NOT_FOUND, "no such model".to_string())]);
    let base = spawn_test_server(mock.clone()).await;
    let client = client_for(base, &store).await;

    let err = client.generate_full_comic(&comic_request()).await.unwrap_err();
    match &err {
        GenerationError::UpstreamStatus { status, body } => {
            assert_eq!(*status, StatusCode::NOT_FOUND);
            assert_eq!(body, "no such model");
        }
        other => panic!("Expected UpstreamStatus, got {other:?}"),
    }
    assert_eq!(mock.captured().len(), 1);

    remove_db(&db_path).await;
}

#[tokio::test]
async fn test_unavailable_upstream_is_retried() {
    let (db_path, database_url) = temp_db("client_retry");
    let store = Store::new(&database_url);
    store.set_setting(GEMINI_API_KEY, API_KEY).await.unwrap();

    let mock = MockState::scripted(vec![
        error_reply(StatusCode::SERVICE_UNAVAILABLE, "overloaded", "UNAVAILABLE"),
        image_reply("QUFBQQ=="),
    ]);
    let base = spawn_test_server(mock.clone()).await;
    let client = client_for(base, &store).await;

    let image = client.generate_full_comic(&comic_request()).await.unwrap();
    assert_eq!(image, "data:image/png;base64,QUFBQQ==");

    let reqs = mock.captured();
    assert_eq!(reqs.len(), 2);
    let expected_path = format!("/v1beta/models/{DEFAULT_IMAGE_MODEL}:generateContent");
    assert!(reqs.iter().all(|r| r.path == expected_path));
    assert_eq!(
        reqs[1].body["generationConfig"]["imageConfig"]["aspectRatio"],
        json!("9:16")
    );

    // Retries stop after `retry_max_times`
    let mock = MockState::scripted(vec![error_reply(
        StatusCode::SERVICE_UNAVAILABLE,
        "overloaded",
        "UNAVAILABLE",
    )]);
    let base = spawn_test_server(mock.clone()).await;
    let client = client_for(base, &store).await;

    let err = client.generate_full_comic(&comic_request()).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(mock.captured().len(), 3);

    remove_db(&db_path).await;
}

#[tokio::test]
async fn test_image_calls_without_image_fail_and_edits_send_the_page() {
    let (db_path, database_url) = temp_db("client_no_image");
    let store = Store::new(&database_url);
    store.set_setting(GEMINI_API_KEY, API_KEY).await.unwrap();

    let mock = MockState::scripted(vec![
        text_reply("I cannot draw that."),
        image_reply("RURJVEVE"),
    ]);
    let base = spawn_test_server(mock.clone()).await;
    let client = client_for(base, &store).await;

    let err = client.generate_full_comic(&comic_request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::NoImage), "got {err:?}");

    let edited = client
        .edit_comic_image(
            "data:image/png;base64,T0xE",
            "make it sunny",
            &["https://example.com/remote.png".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(edited, "data:image/png;base64,RURJVEVE");

    // Existing page goes inline; remote references are skipped
    let parts = mock.captured()[1].body["contents"][0]["parts"].clone();
    let parts = parts.as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert!(parts[0]["text"].as_str().unwrap().contains("make it sunny"));
    assert_eq!(parts[1]["inlineData"]["data"], json!("T0xE"));

    remove_db(&db_path).await;
}
