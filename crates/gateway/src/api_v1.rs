//! HTTP API v1: chat over the retrieval pipeline.
//!
//! Endpoints:
//!
//! - `POST /v1/chat`                   — Ask a question, get `{ answer }`
//! - `POST /v1/chat/stream`            — Same request, SSE stream of chunk/done/error
//! - `GET  /v1/datastores`             — List configured datastores
//! - `POST /v1/datastores/{id}/search` — Run retrieval only

use async_trait::async_trait;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use ragchat_chat::{ChatRequest, ChatStreamEvent};
use ragchat_core::error::{Error, KnowledgeError, SinkError};
use ragchat_core::knowledge::{RetrievedChunk, SearchQuery};
use ragchat_core::message::{Speaker, Turn};
use ragchat_core::sink::TokenSink;
use ragchat_core::strategy::PromptStrategy;

use crate::SharedState;

/// Buffered SSE events per stream before the chat task waits on the client.
const STREAM_BUFFER: usize = 32;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/datastores", get(list_datastores_handler))
        .route("/datastores/{id}/search", post(search_datastore_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub query: String,
    #[serde(default)]
    pub datastore_id: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// "customer_support" or "raw"
    #[serde(default)]
    pub prompt_type: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryItem {
    pub from: Speaker,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatastoreDto {
    pub id: String,
    pub backend: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatastoreListResponse {
    pub datastores: Vec<DatastoreDto>,
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RetrievedChunk>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// HTTP status for a pipeline error.
fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        Error::Retrieval(KnowledgeError::NotFound(_)) => StatusCode::NOT_FOUND,
        Error::Retrieval(_) | Error::Generation(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn from_error(err: Error) -> ApiError {
    api_error(status_for(&err), err.to_string())
}

/// Turn the wire body into a pipeline request.
fn into_request(state: &SharedState, body: ChatBody) -> Result<ChatRequest, ApiError> {
    let mut request = ChatRequest::new(body.query).with_history(
        body.history
            .into_iter()
            .map(|item| Turn {
                speaker: item.from,
                content: item.message,
            })
            .collect(),
    );

    if let Some(id) = body.datastore_id.as_deref() {
        let store = state
            .datastores
            .resolve(id)
            .map_err(|e| from_error(e.into()))?;
        request = request.with_store(store);
    }
    if let Some(name) = body.prompt_type.as_deref() {
        let strategy: PromptStrategy = name.parse().map_err(from_error)?;
        request = request.with_strategy(strategy);
    }
    if let Some(top_k) = body.top_k {
        request = request.with_top_k(top_k);
    }
    if let Some(prompt) = body.prompt {
        request = request.with_prompt(prompt);
    }
    if let Some(temperature) = body.temperature {
        request = request.with_temperature(temperature);
    }
    if let Some(model) = body.model {
        request = request.with_model(model);
    }

    state.orchestrator.validate(&request).map_err(from_error)?;
    Ok(request)
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatAnswer>, ApiError> {
    info!(
        datastore = body.datastore_id.as_deref().unwrap_or("-"),
        history = body.history.len(),
        "v1/chat request"
    );

    let request = into_request(&state, body)?;
    let span = info_span!("chat", request_id = %Uuid::new_v4());
    let response = state
        .orchestrator
        .chat(request)
        .instrument(span)
        .await
        .map_err(|e| {
            warn!(error = %e, "v1/chat failed");
            from_error(e)
        })?;

    Ok(Json(ChatAnswer {
        answer: response.answer,
    }))
}

// ── SSE Streaming ─────────────────────────────────────────────────────────

/// Forwards tokens as `chunk` events.
struct EventSink {
    tx: mpsc::Sender<ChatStreamEvent>,
}

#[async_trait]
impl TokenSink for EventSink {
    async fn on_token(&self, token: &str) -> Result<(), SinkError> {
        self.tx
            .send(ChatStreamEvent::Chunk {
                content: token.to_string(),
            })
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// `POST /v1/chat/stream`: SSE stream of `chunk` events, then `done` or `error`.
///
/// Request errors are reported as HTTP statuses before the stream opens.
/// When the client goes away the stream is dropped, which cancels the chat.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(body): Json<ChatBody>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    info!(
        datastore = body.datastore_id.as_deref().unwrap_or("-"),
        history = body.history.len(),
        "v1/chat/stream SSE request"
    );

    let request = into_request(&state, body)?;
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let request = request
        .with_sink(Arc::new(EventSink { tx: tx.clone() }))
        .with_cancellation(cancel);

    let orchestrator = state.orchestrator.clone();
    let span = info_span!("chat_stream", request_id = %Uuid::new_v4());
    tokio::spawn(
        async move {
            let event = match orchestrator.chat(request).await {
                Ok(response) => ChatStreamEvent::Done {
                    answer: response.answer,
                },
                Err(Error::Cancelled) | Err(Error::Sink(SinkError::Closed)) => {
                    info!("v1/chat/stream client disconnected");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "v1/chat/stream failed");
                    ChatStreamEvent::Error {
                        message: e.to_string(),
                    }
                }
            };
            let _ = tx.send(event).await;
        }
        .instrument(span),
    );

    let stream = ReceiverStream::new(rx).map(move |event| {
        let _ = &guard;
        let event_type = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event_type).data(data))
    });

    Ok(Sse::new(stream))
}

// ── Datastores ────────────────────────────────────────────────────────────

async fn list_datastores_handler(State(state): State<SharedState>) -> Json<DatastoreListResponse> {
    let datastores = state
        .datastores
        .list()
        .into_iter()
        .map(|(id, backend)| DatastoreDto {
            id: id.to_string(),
            backend: backend.to_string(),
        })
        .collect();

    Json(DatastoreListResponse { datastores })
}

/// `POST /v1/datastores/{id}/search`: retrieval only, for checking what a
/// question would pull into the prompt.
async fn search_datastore_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, ApiError> {
    let store = state
        .datastores
        .resolve(&id)
        .map_err(|e| from_error(e.into()))?;

    if body.query.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "query must not be empty"));
    }
    let top_k = body
        .top_k
        .unwrap_or(state.orchestrator.defaults().customer_support_top_k);
    if top_k == 0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "top_k must be a positive integer",
        ));
    }

    let results = store
        .search(SearchQuery::new(body.query, top_k).with_tags(body.tags))
        .await
        .map_err(|e| {
            warn!(datastore = %id, error = %e, "Datastore search failed");
            from_error(e.into())
        })?;

    info!(datastore = %id, results = results.len(), "v1/datastores search");
    Ok(Json(SearchResponse { results }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, test_state, test_state_with};
    use axum::body::{Body, Bytes};
    use axum::http::Request;
    use http_body_util::BodyExt;
    use ragchat_core::error::ProviderError;
    use ragchat_knowledge::{Document, InMemoryKnowledgeStore};
    use tower::ServiceExt;

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    fn faq_store() -> Arc<InMemoryKnowledgeStore> {
        Arc::new(InMemoryKnowledgeStore::with_documents(vec![
            Document::new("Refunds are issued within 14 days.", "https://shop.test/refunds"),
            Document::new("Shipping takes 3 days.", "https://shop.test/shipping"),
        ]))
    }

    #[tokio::test]
    async fn chat_returns_trimmed_answer() {
        let provider = Arc::new(ScriptedProvider::tokens(&["  Hello", " there \n"]));
        let app = v1_router(test_state(provider.clone()));

        let response = app
            .oneshot(post_json("/chat", serde_json::json!({"query": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: ChatAnswer = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json.answer, "Hello there");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn chat_uses_datastore_history_and_raw_prompt() {
        let provider = Arc::new(ScriptedProvider::tokens(&["14 days"]));
        let app = v1_router(test_state_with(provider.clone(), "faq", faq_store()));

        let response = app
            .oneshot(post_json(
                "/chat",
                serde_json::json!({
                    "query": "refunds",
                    "datastore_id": "faq",
                    "prompt_type": "raw",
                    "prompt": "{context}\n\nQ: {query}",
                    "history": [
                        {"from": "human", "message": "hi"},
                        {"from": "agent", "message": "hello"}
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 3);
        assert_eq!(
            request.messages[2].content,
            "CHUNK: Refunds are issued within 14 days.\nSOURCE: https://shop.test/refunds\n\nQ: refunds"
        );
    }

    #[tokio::test]
    async fn chat_unknown_datastore_is_404() {
        let provider = Arc::new(ScriptedProvider::tokens(&["x"]));
        let app = v1_router(test_state(provider.clone()));

        let response = app
            .oneshot(post_json(
                "/chat",
                serde_json::json!({"query": "hi", "datastore_id": "missing"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(json.error.contains("missing"));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn chat_malformed_requests_are_400() {
        let provider = Arc::new(ScriptedProvider::tokens(&["x"]));
        let state = test_state(provider.clone());

        for body in [
            serde_json::json!({"query": "   "}),
            serde_json::json!({"query": "hi", "prompt_type": "shakespeare"}),
            serde_json::json!({"query": "hi", "prompt_type": "raw"}),
            serde_json::json!({"query": "hi", "top_k": 0}),
            serde_json::json!({"query": "hi", "temperature": -1.0}),
        ] {
            let response = v1_router(state.clone())
                .oneshot(post_json("/chat", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn chat_provider_failure_is_502() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::Timeout(
            "upstream".into(),
        )));
        let app = v1_router(test_state(provider));

        let response = app
            .oneshot(post_json("/chat", serde_json::json!({"query": "hi"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(json.error.contains("Generation failed"));
    }

    #[tokio::test]
    async fn chat_stream_emits_chunks_then_done() {
        let provider = Arc::new(ScriptedProvider::tokens(&["He", "llo"]));
        let app = v1_router(test_state(provider.clone()));

        let response = app
            .oneshot(post_json("/chat/stream", serde_json::json!({"query": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );

        let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
        let first = body.find(r#"{"type":"chunk","content":"He"}"#).unwrap();
        let second = body.find(r#"{"type":"chunk","content":"llo"}"#).unwrap();
        let done = body.find(r#"{"type":"done","answer":"Hello"}"#).unwrap();
        assert!(first < second && second < done);
        assert!(body.contains("event: chunk"));
        assert!(body.contains("event: done"));
        assert!(provider.last_request().unwrap().stream);
    }

    #[tokio::test]
    async fn chat_stream_client_disconnect_stops_generation() {
        let tokens: Vec<String> = (0..500).map(|i| format!("t{i} ")).collect();
        let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let provider = Arc::new(ScriptedProvider::tokens(&tokens));
        let app = v1_router(test_state(provider.clone()));

        let response = app
            .oneshot(post_json("/chat/stream", serde_json::json!({"query": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let first = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(first.contains("event: chunk"));

        drop(body);

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !provider.aborted() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(provider.emitted() < tokens.len());
    }

    #[tokio::test]
    async fn chat_stream_reports_generation_error_event() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::Network(
            "reset".into(),
        )));
        let app = v1_router(test_state(provider));

        let response = app
            .oneshot(post_json("/chat/stream", serde_json::json!({"query": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
        assert!(body.contains("event: error"));
        assert!(!body.contains("event: done"));
    }

    #[tokio::test]
    async fn chat_stream_rejects_bad_request_before_streaming() {
        let provider = Arc::new(ScriptedProvider::tokens(&["x"]));
        let app = v1_router(test_state(provider.clone()));

        let response = app
            .oneshot(post_json(
                "/chat/stream",
                serde_json::json!({"query": "hi", "datastore_id": "nope"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn list_datastores() {
        let provider = Arc::new(ScriptedProvider::tokens(&["x"]));
        let app = v1_router(test_state_with(provider, "faq", faq_store()));

        let req = Request::builder()
            .uri("/datastores")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: DatastoreListResponse =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json.datastores.len(), 1);
        assert_eq!(json.datastores[0].id, "faq");
        assert_eq!(json.datastores[0].backend, "in_memory");
    }

    #[tokio::test]
    async fn search_datastore_returns_ranked_chunks() {
        let provider = Arc::new(ScriptedProvider::tokens(&["x"]));
        let app = v1_router(test_state_with(provider.clone(), "faq", faq_store()));

        let response = app
            .oneshot(post_json(
                "/datastores/faq/search",
                serde_json::json!({"query": "shipping", "top_k": 3}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: SearchResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json.results.len(), 1);
        assert_eq!(json.results[0].source, "https://shop.test/shipping");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn search_unknown_datastore_is_404() {
        let provider = Arc::new(ScriptedProvider::tokens(&["x"]));
        let app = v1_router(test_state(provider));

        let response = app
            .oneshot(post_json(
                "/datastores/nope/search",
                serde_json::json!({"query": "shipping"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
