//! `ragchat chat` — Single-shot or interactive chat.

use async_trait::async_trait;
use clap::Args;
use ragchat_chat::{ChatDefaults, ChatOrchestrator, ChatRequest};
use ragchat_config::AppConfig;
use ragchat_core::error::{Error, SinkError};
use ragchat_core::knowledge::KnowledgeStore;
use ragchat_core::message::Turn;
use ragchat_core::sink::TokenSink;
use ragchat_core::strategy::PromptStrategy;
use ragchat_knowledge::DatastoreRegistry;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Args)]
pub struct ChatOptions {
    /// The question; omit to start an interactive session
    pub query: Option<String>,

    /// Datastore id to retrieve context from
    #[arg(short, long)]
    pub datastore: Option<String>,

    /// Prompt strategy: customer_support or raw
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Persona (customer_support) or template (raw); `@path` reads a file
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    #[arg(short, long)]
    pub temperature: Option<f32>,

    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the answer only once it is complete
    #[arg(long)]
    pub no_stream: bool,
}

/// Prints tokens as they arrive.
struct StdoutSink;

#[async_trait]
impl TokenSink for StdoutSink {
    async fn on_token(&self, token: &str) -> Result<(), SinkError> {
        let mut out = std::io::stdout().lock();
        out.write_all(token.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| SinkError::Failed(e.to_string()))
    }
}

/// Per-session request template: everything except the query and history.
struct Session {
    orchestrator: ChatOrchestrator,
    store: Option<Arc<dyn KnowledgeStore>>,
    strategy: Option<PromptStrategy>,
    prompt: Option<String>,
    top_k: Option<usize>,
    temperature: Option<f32>,
    model: Option<String>,
    stream: bool,
}

impl Session {
    fn request(&self, query: &str, history: &[Turn]) -> ChatRequest {
        let mut request = ChatRequest::new(query).with_history(history.to_vec());
        if let Some(store) = &self.store {
            request = request.with_store(store.clone());
        }
        if let Some(strategy) = self.strategy {
            request = request.with_strategy(strategy);
        }
        if let Some(prompt) = &self.prompt {
            request = request.with_prompt(prompt.clone());
        }
        if let Some(top_k) = self.top_k {
            request = request.with_top_k(top_k);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        if self.stream {
            request = request.with_sink(Arc::new(StdoutSink));
        }
        request
    }

    /// Run one question; Ctrl+C cancels it.
    async fn ask(&self, query: &str, history: &[Turn]) -> Result<String, Error> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let result = self
            .orchestrator
            .chat(self.request(query, history).with_cancellation(cancel))
            .await;
        watcher.abort();

        let answer = result?.answer;
        if self.stream {
            println!();
        } else {
            println!("{answer}");
        }
        Ok(answer)
    }
}

pub async fn run(options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if config.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    RAGCHAT_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY  = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let session = build_session(&config, options.clone()).await?;

    match options.query {
        Some(query) => {
            session.ask(&query, &[]).await?;
        }
        None => interactive(&config, &session, options.datastore.as_deref()).await?,
    }

    Ok(())
}

async fn build_session(
    config: &AppConfig,
    options: ChatOptions,
) -> Result<Session, Box<dyn std::error::Error>> {
    let router = ragchat_providers::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;
    let orchestrator = ChatOrchestrator::new(provider, ChatDefaults::from_config(config)?);

    let store = match options.datastore.as_deref() {
        Some(id) => Some(DatastoreRegistry::from_config(config).await?.resolve(id)?),
        None => None,
    };

    let strategy = options
        .strategy
        .as_deref()
        .map(str::parse::<PromptStrategy>)
        .transpose()?;

    let prompt = match options.prompt {
        Some(prompt) => Some(load_prompt(&prompt).await?),
        None => None,
    };

    debug!(
        provider = orchestrator.provider_name(),
        datastore = options.datastore.as_deref().unwrap_or("-"),
        streaming = !options.no_stream,
        "Chat session ready"
    );

    Ok(Session {
        orchestrator,
        store,
        strategy,
        prompt,
        top_k: options.top_k,
        temperature: options.temperature,
        model: options.model,
        stream: !options.no_stream,
    })
}

/// `@path` reads the prompt from a file; anything else is the prompt itself.
async fn load_prompt(value: &str) -> Result<String, Box<dyn std::error::Error>> {
    match value.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read prompt file {path}: {e}").into()),
        None => Ok(value.to_string()),
    }
}

async fn interactive(
    config: &AppConfig,
    session: &Session,
    datastore: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  ragchat interactive mode");
    println!();
    println!("  Provider:   {}", config.default_provider);
    println!(
        "  Model:      {}",
        session.model.as_deref().unwrap_or(&config.default_model)
    );
    println!("  Datastore:  {}", datastore.unwrap_or("(none)"));
    println!();
    println!("  Type your question and press Enter.");
    println!("  Ctrl+C cancels an answer; 'exit' or Ctrl+C at the prompt quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<Turn> = Vec::new();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        print!("  Assistant > ");
        std::io::stdout().flush()?;

        match session.ask(query, &history).await {
            Ok(answer) => {
                history.push(Turn::human(query));
                history.push(Turn::agent(answer));
            }
            Err(Error::Cancelled) => {
                println!();
                eprintln!("  [Cancelled]");
            }
            Err(e) => {
                println!();
                eprintln!("  [Error] {e}");
            }
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
