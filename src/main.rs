//! # Ragmate — knowledge-base orchestration CLI
//!
//! Manages a remote vector-store knowledge base for a conversational
//! assistant: upload documents, delete them, search, and serve the
//! host-facing HTTP gateway.
//!
//! Usage:
//!   ragmate serve                        # Start the gateway
//!   ragmate upload manual.txt            # Upload + attach a document
//!   ragmate delete file_abc123           # Detach + delete a document
//!   ragmate search "warranty terms"      # Query the knowledge base
//!   ragmate list                         # Show the metadata ledger

use anyhow::Result;
use clap::{Parser, Subcommand};
use ragmate_core::RagmateConfig;
use ragmate_gateway::AppState;
use ragmate_knowledge::{DocumentManager, FileLedger, NewUpload};
use ragmate_vector::{HttpTransport, Retriever, RetryPolicy, StoreRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragmate", version, about = "📚 Ragmate — remote knowledge base for assistants")]
struct Cli {
    /// Config file path (default: ~/.ragmate/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the host-facing HTTP gateway
    Serve,
    /// Upload a document and attach it to the knowledge base
    Upload {
        /// Path to the file to upload
        path: PathBuf,
    },
    /// Delete a document by its origin file id
    Delete {
        /// Origin file id (e.g. file_abc123)
        file_id: String,
    },
    /// Search the knowledge base
    Search {
        /// Query text, sent verbatim
        query: String,
        /// Maximum number of results
        #[arg(long)]
        max_results: Option<u32>,
        /// Return every hit regardless of score
        #[arg(long)]
        no_threshold: bool,
    },
    /// List documents recorded in the metadata ledger
    List,
}

struct Stack {
    config: RagmateConfig,
    config_path: Option<PathBuf>,
    manager: Arc<DocumentManager>,
    retriever: Arc<Retriever>,
}

impl Stack {
    async fn build(config: RagmateConfig, config_path: Option<PathBuf>) -> Result<Self> {
        let api_key = config.resolved_api_key();
        if api_key.is_empty() {
            anyhow::bail!("No API key: set api_key in config or the OPENAI_API_KEY env var");
        }

        let transport: Arc<dyn ragmate_vector::Transport> =
            Arc::new(HttpTransport::new(api_key, config.timeout_secs)?);
        let retry = RetryPolicy::from_config(&config.retry);

        let registry = Arc::new(StoreRegistry::new(
            transport.clone(),
            config.api_base.clone(),
            retry,
        ));
        if let Some(id) = &config.cached_store_id {
            registry.prime(config.store_name.as_str(), id.as_str()).await;
        }

        let ledger = Arc::new(FileLedger::open(&FileLedger::default_dir())?);
        let manager = Arc::new(DocumentManager::new(
            transport.clone(),
            config.api_base.clone(),
            registry.clone(),
            config.store_name.clone(),
            ledger,
            retry,
        ));
        let retriever = Arc::new(Retriever::new(transport, config.api_base.clone(), retry));

        Ok(Self {
            config,
            config_path,
            manager,
            retriever,
        })
    }

    /// Resolve the store id and persist it back to config on change, so the
    /// next boot skips the registry list call.
    async fn resolved_store_id(&mut self) -> Result<String> {
        let id = self.manager.store_id().await?;
        if self.config.cached_store_id.as_deref() != Some(&id) {
            self.config.cached_store_id = Some(id.clone());
            match &self.config_path {
                Some(path) => self.config.save_to(path)?,
                None => self.config.save()?,
            }
            tracing::debug!("Cached store id {id}");
        }
        Ok(id)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "ragmate=debug,tower_http=debug"
    } else {
        "ragmate=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .as_deref()
        .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()));
    let config = match &config_path {
        Some(path) => RagmateConfig::load_from(path)?,
        None => RagmateConfig::load()?,
    };

    let mut stack = Stack::build(config, config_path).await?;

    match cli.command {
        Command::Serve => {
            // Resolve (and cache) the store id up front so the first upload
            // doesn't pay for the list call.
            let store_id = stack.resolved_store_id().await?;
            tracing::info!(
                "Knowledge base '{}' -> {store_id}",
                stack.config.store_name
            );
            let state = Arc::new(AppState {
                manager: stack.manager.clone(),
                retriever: stack.retriever.clone(),
                search_defaults: stack.config.search.clone(),
                auth_token: stack.config.gateway.auth_token.clone(),
            });
            ragmate_gateway::serve(&stack.config.gateway, state).await?;
        }
        Command::Upload { path } => {
            let bytes = std::fs::read(&path)?;
            let declared_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "file".to_string());
            let declared_mime = match path.extension().and_then(|e| e.to_str()) {
                Some("txt") => "text/plain",
                _ => "application/octet-stream",
            }
            .to_string();

            let document = stack
                .manager
                .upload(NewUpload {
                    bytes,
                    declared_name,
                    declared_mime,
                })
                .await?;
            stack.resolved_store_id().await?;
            println!(
                "Uploaded {} ({} bytes) as {}",
                document.name, document.size_bytes, document.origin_file_id
            );
        }
        Command::Delete { file_id } => {
            let store_id = stack.resolved_store_id().await?;
            let outcome = stack.manager.delete(&store_id, &file_id).await?;
            if !outcome.origin_deleted {
                tracing::warn!("Origin file {file_id} may still exist on the service");
            }
            println!("Deleted {file_id}");
        }
        Command::Search {
            query,
            max_results,
            no_threshold,
        } => {
            let store_id = stack.resolved_store_id().await?;
            let defaults = &stack.config.search;
            let mut q = ragmate_core::types::Query::new(query)
                .with_max_results(max_results.unwrap_or(defaults.max_results))
                .with_threshold(defaults.score_threshold);
            q.apply_threshold = defaults.apply_threshold && !no_threshold;

            let results = stack.retriever.retrieve(&store_id, &q).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, result) in results.iter().enumerate() {
                println!("{}. [{:.2}] {}", i + 1, result.score, result.content);
            }
        }
        Command::List => {
            let documents = stack.manager.documents()?;
            if documents.is_empty() {
                println!("No documents in the knowledge base.");
            }
            for doc in documents {
                println!(
                    "{}  {}  {} bytes  {}",
                    doc.origin_file_id,
                    doc.name,
                    doc.size_bytes,
                    doc.uploaded_at.format("%Y-%m-%d")
                );
            }
        }
    }

    Ok(())
}
