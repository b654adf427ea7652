//! Runs the provider against a local stand-in for the chat-completions API.

use std::sync::Arc;

use applet::{FinishReason, Generator, ModelId, Prompt, ProviderError, TokenCount};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use llm::{OpenRouterConfig, OpenRouterProvider};
use serde_json::{json, Value};
use tokio::sync::Mutex;

#[derive(Default)]
struct Seen {
    headers: Option<HeaderMap>,
    body: Option<Value>,
}

async fn spawn_stub(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let app = Router::new()
        .route(
            "/api/v1/chat/completions",
            post(
                move |State(seen): State<Arc<Mutex<Seen>>>,
                      headers: HeaderMap,
                      Json(body): Json<Value>| {
                    let reply = reply.clone();
                    async move {
                        let mut guard = seen.lock().await;
                        guard.headers = Some(headers);
                        guard.body = Some(body);
                        (status, Json(reply))
                    }
                },
            ),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/v1"), seen)
}

fn prompt() -> Prompt {
    Prompt {
        system: "You are an expert web developer.".into(),
        user: "Build a clock.".into(),
        model: ModelId::new("openai/gpt-4o-mini").unwrap(),
        max_output_tokens: TokenCount::new(8_000),
        temperature: 0.7,
    }
}

fn provider(base_url: String) -> OpenRouterProvider {
    OpenRouterProvider::new(
        OpenRouterConfig::new(Some("sk-test".into())).with_base_url(base_url),
    )
    .unwrap()
}

#[tokio::test]
async fn sends_attribution_and_decodes_completion() {
    let (base, seen) = spawn_stub(
        StatusCode::OK,
        json!({
            "choices": [{
                "message": { "role": "assistant", "content": "<!DOCTYPE html><html></html>" },
                "finish_reason": "stop"
            }]
        }),
    )
    .await;

    let raw = provider(base).complete(&prompt()).await.unwrap();
    assert_eq!(raw.finish, FinishReason::Complete);
    assert_eq!(raw.text, "<!DOCTYPE html><html></html>");

    let seen = seen.lock().await;
    let headers = seen.headers.as_ref().unwrap();
    assert_eq!(headers["authorization"], "Bearer sk-test");
    assert_eq!(headers["x-title"], "AppForge");
    assert!(headers.contains_key("http-referer"));

    let body = seen.body.as_ref().unwrap();
    assert_eq!(body["model"], "openai/gpt-4o-mini");
    assert_eq!(body["max_tokens"], 8_000);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Build a clock.");
}

#[tokio::test]
async fn quota_status_is_mapped() {
    let (base, _) = spawn_stub(
        StatusCode::PAYMENT_REQUIRED,
        json!({ "error": { "message": "Insufficient credits" } }),
    )
    .await;
    let err = provider(base).complete(&prompt()).await.unwrap_err();
    assert_eq!(err, ProviderError::QuotaExhausted);
}

#[tokio::test]
async fn other_status_carries_provider_message() {
    let (base, _) = spawn_stub(
        StatusCode::BAD_REQUEST,
        json!({ "error": { "message": "unknown model" } }),
    )
    .await;
    let err = provider(base).complete(&prompt()).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Upstream {
            status: Some(400),
            message: "unknown model".into()
        }
    );
}
