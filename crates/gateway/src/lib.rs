//! HTTP API gateway for ragchat.
//!
//! Exposes the chat pipeline to web clients and embeddable chat widgets:
//! a health check plus the v1 API (chat, SSE streaming chat, datastore
//! listing and retrieval-only search).
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{Router, extract::State, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use ragchat_chat::{ChatDefaults, ChatOrchestrator};
use ragchat_config::AppConfig;
use ragchat_knowledge::DatastoreRegistry;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub datastores: DatastoreRegistry,
    pub config: AppConfig,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(
        orchestrator: Arc<ChatOrchestrator>,
        datastores: DatastoreRegistry,
        config: AppConfig,
    ) -> Self {
        Self {
            orchestrator,
            datastores,
            config,
            start_time: chrono::Utc::now(),
        }
    }
}

/// Build the full router: `/health` plus `/v1`.
///
/// Layers applied:
/// - CORS limited to `gateway.allowed_origins` (none by default)
/// - Request body size limit (`gateway.max_body_bytes`)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let gateway = &state.config.gateway;

    let origins: Vec<HeaderValue> = gateway
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .max_age(std::time::Duration::from_secs(3600));

    let body_limit = gateway.max_body_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// The provider and datastores are built once and shared by every request.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let router = ragchat_providers::build_from_config(&config);
    let provider = router
        .default()
        .ok_or_else(|| format!("provider '{}' is not configured", config.default_provider))?;
    if !config.has_api_key() {
        warn!("No API key configured; set RAGCHAT_API_KEY or OPENAI_API_KEY");
    }

    let datastores = DatastoreRegistry::from_config(&config).await?;
    let defaults = ChatDefaults::from_config(&config)?;
    let orchestrator = Arc::new(ChatOrchestrator::new(provider, defaults));

    let state = Arc::new(GatewayState::new(orchestrator, datastores, config));
    let app = build_router(state.clone());

    info!(
        addr = %addr,
        provider = state.orchestrator.provider_name(),
        datastores = state.datastores.len(),
        "Gateway starting with v1 API"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime = chrono::Utc::now() - state.start_time;
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: uptime.num_seconds(),
    })
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use async_trait::async_trait;
    use ragchat_core::error::ProviderError;
    use ragchat_core::knowledge::KnowledgeStore;
    use ragchat_core::message::Message;
    use ragchat_core::provider::{
        Provider, ProviderRequest, ProviderResponse, StreamChunk, StreamReceiver,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Replays fixed tokens, or fails every call.
    ///
    /// Streams one token at a time, so a consumer that stops reading leaves
    /// the rest unsent.
    pub struct ScriptedProvider {
        outcome: Result<Vec<String>, ProviderError>,
        requests: Mutex<Vec<ProviderRequest>>,
        emitted: Arc<AtomicUsize>,
        aborted: Arc<AtomicBool>,
    }

    impl ScriptedProvider {
        pub fn tokens(tokens: &[&str]) -> Self {
            Self {
                outcome: Ok(tokens.iter().map(|t| t.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
                emitted: Arc::default(),
                aborted: Arc::default(),
            }
        }

        pub fn failing(error: ProviderError) -> Self {
            Self {
                outcome: Err(error),
                requests: Mutex::new(Vec::new()),
                emitted: Arc::default(),
                aborted: Arc::default(),
            }
        }

        /// Tokens accepted by the stream consumer so far.
        pub fn emitted(&self) -> usize {
            self.emitted.load(Ordering::SeqCst)
        }

        /// Whether a stream stopped early because its receiver was dropped.
        pub fn aborted(&self) -> bool {
            self.aborted.load(Ordering::SeqCst)
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn last_request(&self) -> Option<ProviderRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            let tokens = self.outcome.clone()?;
            Ok(ProviderResponse {
                message: Message::assistant(tokens.concat()),
                usage: None,
                model: request.model,
            })
        }

        async fn stream(&self, request: ProviderRequest) -> Result<StreamReceiver, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let tokens = self.outcome.clone()?;
            let (tx, rx) = mpsc::channel(1);
            let emitted = self.emitted.clone();
            let aborted = self.aborted.clone();
            tokio::spawn(async move {
                for token in tokens {
                    if tx.send(Ok(StreamChunk::token(token))).await.is_err() {
                        aborted.store(true, Ordering::SeqCst);
                        return;
                    }
                    emitted.fetch_add(1, Ordering::SeqCst);
                }
                let _ = tx.send(Ok(StreamChunk::finished(None))).await;
            });
            Ok(rx)
        }
    }

    pub fn test_state(provider: Arc<dyn Provider>) -> SharedState {
        build_state(provider, DatastoreRegistry::new())
    }

    pub fn test_state_with(
        provider: Arc<dyn Provider>,
        id: &str,
        store: Arc<dyn KnowledgeStore>,
    ) -> SharedState {
        let mut datastores = DatastoreRegistry::new();
        datastores.register(id, store);
        build_state(provider, datastores)
    }

    fn build_state(provider: Arc<dyn Provider>, datastores: DatastoreRegistry) -> SharedState {
        let orchestrator = Arc::new(ChatOrchestrator::new(provider, ChatDefaults::default()));
        Arc::new(GatewayState::new(
            orchestrator,
            datastores,
            AppConfig::default(),
        ))
    }
}
