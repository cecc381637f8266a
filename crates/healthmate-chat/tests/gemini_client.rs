//! Integration tests for the Gemini client against an in-process fake
//! endpoint served by axum.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use healthmate_chat::{
    ConversationManager, GeminiClient, GenerativeBackend, PromptTranslator, SubmitOutcome,
    UpstreamError,
};
use healthmate_core::config::{ChatConfig, LlmConfig};
use healthmate_core::locale::Locale;
use healthmate_storage::{Database, SqliteMessageStore};

// =============================================================================
// Fake endpoint
// =============================================================================

#[derive(Clone, Copy)]
enum Behavior {
    Reply,
    ServerError,
    NoCandidates,
    Garbage,
    Slow,
    ThrottleOnce,
}

#[derive(Clone)]
struct FakeGemini {
    behavior: Behavior,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(String, String, Value)>>>,
}

async fn generate_content(
    State(fake): State<FakeGemini>,
    Path(action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let hit = fake.hits.fetch_add(1, Ordering::SeqCst);
    fake.requests.lock().unwrap().push((
        action,
        query.get("key").cloned().unwrap_or_default(),
        body,
    ));

    let reply = Json(json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": "Drink water and rest."}]}}]
    }));

    match fake.behavior {
        Behavior::Reply => reply.into_response(),
        Behavior::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "backend exploded").into_response()
        }
        Behavior::NoCandidates => Json(json!({"candidates": []})).into_response(),
        Behavior::Garbage => (StatusCode::OK, "<html>not json</html>").into_response(),
        Behavior::Slow => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            reply.into_response()
        }
        Behavior::ThrottleOnce if hit == 0 => {
            (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response()
        }
        Behavior::ThrottleOnce => reply.into_response(),
    }
}

async fn spawn_fake(behavior: Behavior) -> (String, FakeGemini) {
    let fake = FakeGemini {
        behavior,
        hits: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1/models/{action}", post(generate_content))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1", addr), fake)
}

fn llm_config(base_url: &str) -> LlmConfig {
    LlmConfig {
        base_url: base_url.to_string(),
        api_key: Some("test-key".to_string()),
        timeout_secs: 1,
        ..LlmConfig::default()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_successful_reply_is_extracted() {
    let (base_url, fake) = spawn_fake(Behavior::Reply).await;
    let client = GeminiClient::new(&llm_config(&base_url)).unwrap();

    let text = client.generate("hello there").await.unwrap();
    assert_eq!(text, "Drink water and rest.");

    let requests = fake.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (action, key, body) = &requests[0];
    assert_eq!(action, "gemini-pro:generateContent");
    assert_eq!(key, "test-key");
    assert_eq!(
        body,
        &json!({"contents": [{"role": "user", "parts": [{"text": "hello there"}]}]})
    );
}

#[tokio::test]
async fn test_translator_sends_wrapped_prompt() {
    let (base_url, fake) = spawn_fake(Behavior::Reply).await;
    let client = GeminiClient::new(&llm_config(&base_url)).unwrap();
    let translator = PromptTranslator::new(Arc::new(client));

    translator.translate("sore throat", Locale::Hindi).await.unwrap();

    let requests = fake.requests.lock().unwrap();
    let text = requests[0].2["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(text, PromptTranslator::wrap("sore throat", Locale::Hindi));
}

#[tokio::test]
async fn test_server_error_is_status() {
    let (base_url, _fake) = spawn_fake(Behavior::ServerError).await;
    let client = GeminiClient::new(&llm_config(&base_url)).unwrap();

    let err = client.generate("hi").await.unwrap_err();
    assert_eq!(
        err,
        UpstreamError::Status {
            status: 500,
            body: "backend exploded".to_string()
        }
    );
}

#[tokio::test]
async fn test_missing_text_is_empty_response() {
    let (base_url, _fake) = spawn_fake(Behavior::NoCandidates).await;
    let client = GeminiClient::new(&llm_config(&base_url)).unwrap();
    assert_eq!(
        client.generate("hi").await.unwrap_err(),
        UpstreamError::EmptyResponse
    );
}

#[tokio::test]
async fn test_unparseable_body_is_malformed() {
    let (base_url, _fake) = spawn_fake(Behavior::Garbage).await;
    let client = GeminiClient::new(&llm_config(&base_url)).unwrap();
    assert!(matches!(
        client.generate("hi").await.unwrap_err(),
        UpstreamError::Malformed(_)
    ));
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let (base_url, _fake) = spawn_fake(Behavior::Slow).await;
    let client = GeminiClient::new(&llm_config(&base_url)).unwrap();
    assert_eq!(
        client.generate("hi").await.unwrap_err(),
        UpstreamError::Timeout
    );
}

#[tokio::test]
async fn test_missing_key_makes_no_request() {
    let (base_url, fake) = spawn_fake(Behavior::Reply).await;
    let config = LlmConfig {
        api_key: None,
        api_key_env: "HEALTHMATE_TEST_NO_SUCH_KEY".to_string(),
        ..llm_config(&base_url)
    };
    let client = GeminiClient::new(&config).unwrap();

    assert_eq!(
        client.generate("hi").await.unwrap_err(),
        UpstreamError::MissingCredential
    );
    assert_eq!(fake.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_throttle_retried_when_enabled() {
    let (base_url, fake) = spawn_fake(Behavior::ThrottleOnce).await;
    let client = GeminiClient::new(&llm_config(&base_url)).unwrap();
    let translator = PromptTranslator::new(Arc::new(client)).with_max_retries(1);

    let reply = translator.translate("hi", Locale::English).await.unwrap();
    assert_eq!(reply, "Drink water and rest.");
    assert_eq!(fake.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_server_error_surfaces_as_localized_chat_text() {
    let (base_url, _fake) = spawn_fake(Behavior::ServerError).await;
    let client = GeminiClient::new(&llm_config(&base_url)).unwrap();
    let store = Arc::new(SqliteMessageStore::new(Arc::new(Database::in_memory().unwrap())));
    let m = ConversationManager::new(
        ChatConfig::default(),
        PromptTranslator::new(Arc::new(client)),
        store,
        Locale::Spanish,
    );
    m.mount(None);

    let outcome = m.submit("hola").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    assert_eq!(
        m.messages().last().unwrap().content,
        Locale::Spanish.error_text()
    );
    assert_eq!(m.usage(), 0);
}
