//! # Mail Unsub Core Library
//!
//! This crate provides the core logic for discovering unsubscribe endpoints
//! in mail messages (`List-Unsubscribe` headers and message bodies) and
//! executing the unsubscribe through mailto, RFC 8058 one-click, and
//! browser channels, with durable per-message and per-sender state.
//!
//! It is designed to be used either directly as a library or via the
//! `mail-unsub` command-line tool (which uses this library).

mod channels;
mod core;
mod extract;
mod mailstore;
mod store;

pub use crate::channels::{BrowserAgent, MailSender, SmtpMailer, WebDriverAgent};
pub use crate::core::config::{Config, ConfigBuilder, ConfigFile};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    CandidateSet, Channel, ExecutionOutcome, Locator, LocatorKind, LocatorOrigin, MailMessage,
    MessageOutcome, RecordStatus, RunStatus, SenderDebounceRecord, UnsubscribeRecord,
};
pub use crate::core::orchestrator::Orchestrator;
pub use crate::core::resolver::resolve;
pub use crate::extract::{extract_all, extract_first, parse_list_unsubscribe, validate_url, Prober};
pub use crate::mailstore::{JsonMailStore, MailStore};
pub use crate::store::StateStore;

use crate::core::models::normalize_sender;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The assembled engine: shared HTTP client, state store, channels, and the
/// orchestrator that ties them together.
pub struct Engine {
    store: Arc<StateStore>,
    orchestrator: Orchestrator,
}

impl Engine {
    /// Access to the underlying state store, for status queries.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Resolves and executes one message end to end.
    pub async fn process(&self, config: &Config, message: &MailMessage) -> Result<ExecutionOutcome> {
        let set = crate::core::resolver::resolve(message);
        self.orchestrator.execute(&set, message, config).await
    }
}

/// Initializes shared resources (HTTP client, state database, channels) and
/// assembles an `Engine`. The mail store is optional; without one, outcome
/// labels are simply not applied.
pub async fn initialize_engine(
    config: &Config,
    mail_store: Option<Arc<dyn MailStore>>,
) -> Result<Engine> {
    let http_client = Arc::new(
        reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?,
    );
    let prober = Prober::new(Arc::clone(&http_client), config);
    let store = Arc::new(StateStore::open(&config.state_db_path)?);

    let mailer: Option<Arc<dyn MailSender>> = if config.enable_mailto {
        Some(Arc::new(SmtpMailer::new(config)?))
    } else {
        None
    };
    let browser: Arc<dyn BrowserAgent> = Arc::new(WebDriverAgent::new(&config.webdriver_url));

    let orchestrator = Orchestrator::new(
        http_client,
        prober,
        Arc::clone(&store),
        mailer,
        browser,
        mail_store,
    );
    Ok(Engine {
        store,
        orchestrator,
    })
}

/// Processes a single message and packages the outcome.
///
/// Errors from the engine (database unavailable, WebDriver endpoint down)
/// are folded into a failed `MessageOutcome` rather than propagated, so one
/// broken message never aborts a batch.
pub async fn process_single_message(
    config: &Config,
    engine: &Engine,
    message: MailMessage,
) -> MessageOutcome {
    let task_id = format!("Message: {} / {}", message.id, message.sender);
    tracing::info!(target: "process_single_message", "[{}] Starting processing.", task_id);

    let outcome = match engine.process(config, &message).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(target: "process_single_message",
                "[{}] !!! Error during unsubscribe processing: {}", task_id, e
            );
            ExecutionOutcome::failed(format!("Processing error: {}", e))
        }
    };

    match outcome.status {
        RunStatus::Success => {
            tracing::info!(target: "process_single_message",
                "[{}] Unsubscribed via {}.",
                task_id,
                outcome.channel.map(|c| c.to_string()).unwrap_or_default()
            );
        }
        RunStatus::Skipped => {
            tracing::info!(target: "process_single_message", "[{}] Skipped (sender debounced).", task_id);
        }
        RunStatus::Failed => {
            tracing::info!(target: "process_single_message",
                "[{}] Failed: {}",
                task_id,
                outcome.error.as_deref().unwrap_or("unknown")
            );
        }
    }

    MessageOutcome::from_execution(&message, outcome)
}

/// Processes a batch of messages.
///
/// Messages are grouped by normalized sender; each sender's messages run
/// sequentially in ascending receive order (so the debounce state from an
/// earlier message is visible to later ones), while distinct senders run
/// concurrently up to `config.max_concurrency`.
pub async fn process_messages(
    config: Arc<Config>,
    engine: Arc<Engine>,
    messages: Vec<MailMessage>,
) -> Vec<MessageOutcome> {
    let total_records = messages.len();
    if total_records == 0 {
        return Vec::new();
    }

    let mut by_sender: BTreeMap<String, Vec<MailMessage>> = BTreeMap::new();
    for message in messages {
        by_sender
            .entry(normalize_sender(&message.sender))
            .or_default()
            .push(message);
    }
    for group in by_sender.values_mut() {
        group.sort_by_key(|m| m.received_at);
    }

    let mut tasks = FuturesUnordered::new();
    let mut results = Vec::with_capacity(total_records);

    for (sender, group) in by_sender {
        while tasks.len() >= config.max_concurrency {
            if let Some(join_handle_result) = tasks.next().await {
                match join_handle_result {
                    Ok(mut sender_results) => {
                        results.append(&mut sender_results);
                    }
                    Err(e) => {
                        tracing::error!("A processing task failed to join: {}", e);
                    }
                }
            } else {
                tracing::warn!("Task queue unexpectedly empty while limiting concurrency.");
                break;
            }
        }

        let engine_clone = Arc::clone(&engine);
        let config_clone = Arc::clone(&config);

        tasks.push(tokio::spawn(async move {
            tracing::debug!(target: "process_messages", sender = %sender, count = group.len(), "processing sender group");
            let mut sender_results = Vec::with_capacity(group.len());
            for message in group {
                sender_results
                    .push(process_single_message(&config_clone, &engine_clone, message).await);
            }
            sender_results
        }));
    }

    while let Some(join_handle_result) = tasks.next().await {
        match join_handle_result {
            Ok(mut sender_results) => {
                results.append(&mut sender_results);
            }
            Err(e) => {
                tracing::error!("A processing task failed to join during final drain: {}", e);
            }
        }
    }

    results
}
