//! # Mail Unsub CLI
//!
//! Command-line interface for the Mail Unsub library (`mail_unsub_core`).
//! This binary parses arguments, sets up configuration, initializes the core
//! engine, processes messages (either a single message or a batch from a
//! file), and handles output.

use mail_unsub_core::{
    initialize_engine, process_messages, process_single_message, Config, ConfigBuilder,
    JsonMailStore, MailMessage, MailStore, MessageOutcome, RecordStatus, RunStatus,
};

// Dependencies specific to the CLI binary
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

/// Record statuses accepted by `--status`.
#[derive(Copy, Clone, Debug, ValueEnum)]
enum StatusFilter {
    Pending,
    Success,
    Failed,
}

impl From<StatusFilter> for RecordStatus {
    fn from(value: StatusFilter) -> Self {
        match value {
            StatusFilter::Pending => RecordStatus::Pending,
            StatusFilter::Success => RecordStatus::Success,
            StatusFilter::Failed => RecordStatus::Failed,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Finds and executes unsubscribe endpoints for mail messages.",
    long_about = "Mail Unsub parses List-Unsubscribe headers and message bodies to find \
                  unsubscribe endpoints, then executes them via mailto, RFC 8058 one-click \
                  POST, and a WebDriver-driven browser, tracking state per message and sender."
)]
struct AppArgs {
    /// Path to the input JSON file containing messages (an array of message objects).
    #[arg(short, long, default_value = "messages.json", env = "MAIL_UNSUB_INPUT")]
    input: String,

    /// Path to the output JSON file where results will be saved.
    #[arg(short, long, default_value = "results.json", env = "MAIL_UNSUB_OUTPUT")]
    output: String,

    /// Process only the message with this id from the input file (single message mode).
    #[arg(long, env = "MAIL_UNSUB_MESSAGE_ID")]
    message_id: Option<String>,

    /// Output results to standard output instead of a file (only in single message mode).
    #[arg(long, default_value = "false", env = "MAIL_UNSUB_STDOUT")]
    stdout: bool,

    /// List stored records with the given status and exit.
    #[arg(long, value_enum, env = "MAIL_UNSUB_STATUS")]
    status: Option<StatusFilter>,

    /// Path to a configuration file (TOML format) to load settings from. CLI args override file settings.
    #[arg(long, env = "MAIL_UNSUB_CONFIG")]
    config_file: Option<String>,

    /// Maximum number of senders processed concurrently.
    #[arg(short, long, env = "MAIL_UNSUB_CONCURRENCY")]
    concurrency: Option<usize>,

    /// HTTP request timeout in seconds (one-click POST).
    #[arg(long, env = "MAIL_UNSUB_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Candidate probe (HEAD) timeout in seconds.
    #[arg(long, env = "MAIL_UNSUB_PROBE_TIMEOUT")]
    probe_timeout: Option<u64>,

    /// Wall-clock budget in seconds for one browser attempt.
    #[arg(long, env = "MAIL_UNSUB_BROWSER_TIMEOUT")]
    browser_timeout: Option<u64>,

    /// Run the fallback browser with a visible window (debugging).
    #[arg(long, action = clap::ArgAction::SetTrue, env = "MAIL_UNSUB_NO_HEADLESS")]
    no_headless: Option<bool>,

    /// URL of the running WebDriver instance.
    #[arg(long, env = "MAIL_UNSUB_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// SMTP relay for the mailto channel. Without it the channel is disabled.
    #[arg(long, env = "MAIL_UNSUB_SMTP_RELAY")]
    smtp_relay: Option<String>,

    /// Sender address placed on outgoing unsubscribe mails.
    #[arg(long, env = "MAIL_UNSUB_SMTP_SENDER")]
    smtp_sender: Option<String>,

    /// User agent string for HTTP requests.
    #[arg(long, env = "MAIL_UNSUB_USER_AGENT")]
    user_agent: Option<String>,

    /// Path of the SQLite state database.
    #[arg(long, env = "MAIL_UNSUB_STATE_DB")]
    state_db: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!("Mail Unsub CLI v{} starting...", env!("CARGO_PKG_VERSION"));

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let mut config_builder = ConfigBuilder::new();

    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(c) = args.concurrency {
        config_builder = config_builder.max_concurrency(c);
    }
    if let Some(t) = args.request_timeout {
        config_builder = config_builder.request_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.probe_timeout {
        config_builder = config_builder.probe_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.browser_timeout {
        config_builder = config_builder.browser_timeout(Duration::from_secs(t));
    }
    if args.no_headless == Some(true) {
        config_builder = config_builder.headless(false);
    }
    if let Some(ref url) = args.webdriver_url {
        config_builder = config_builder.webdriver_url(url);
    }
    if let Some(ref relay) = args.smtp_relay {
        config_builder = config_builder.smtp_relay(Some(relay)).enable_mailto(true);
    }
    if let Some(ref sender) = args.smtp_sender {
        config_builder = config_builder.smtp_sender_email(sender);
    }
    if let Some(ref ua) = args.user_agent {
        config_builder = config_builder.user_agent(ua);
    }
    if let Some(ref path) = args.state_db {
        config_builder = config_builder.state_db(path);
    }

    let config = match config_builder.build() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(anyhow::anyhow!("Failed to build configuration: {}", e));
        }
    };
    tracing::debug!("Effective configuration loaded: {:?}", *config);

    if let Some(filter) = args.status {
        return list_records(&config, filter.into()).await;
    }

    let input_path = Path::new(&args.input);
    if !input_path.exists() || !input_path.is_file() {
        return Err(anyhow::anyhow!(
            "Input file not found or is not a file: {}",
            args.input
        ));
    }

    tracing::info!("Loading messages from '{}'...", args.input);
    let mail_store = Arc::new(
        JsonMailStore::load(input_path)
            .map_err(|e| anyhow::anyhow!("Failed to load messages from '{}': {}", args.input, e))?,
    );

    let engine = match initialize_engine(&config, Some(mail_store.clone() as Arc<dyn MailStore>))
        .await
    {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Initialization error: {}", e);
            return Err(anyhow::anyhow!("Failed to initialize engine: {}", e));
        }
    };

    let is_single_mode = args.message_id.is_some();
    let start_time = Instant::now();

    let execution_result = if is_single_mode {
        process_single_mode(&config, &engine, &mail_store, &args).await
    } else {
        process_file_mode(config.clone(), engine, &mail_store, &args, start_time).await
    };

    if let Err(e) = execution_result {
        tracing::error!("Execution failed: {}", e);
        return Err(e);
    }

    if !is_single_mode {
        tracing::info!(
            "Processing finished successfully. Total duration: {:.2?}",
            start_time.elapsed()
        );
    }

    Ok(())
}

/// Queries the state database and prints matching records.
async fn list_records(config: &Config, status: RecordStatus) -> Result<()> {
    let store = mail_unsub_core::StateStore::open(&config.state_db_path)
        .map_err(|e| anyhow::anyhow!("Failed to open state database: {}", e))?;
    let records = store
        .list_by_status(status)
        .map_err(|e| anyhow::anyhow!("Failed to query records: {}", e))?;

    println!("{} record(s) with status '{}':", records.len(), status);
    for record in records {
        println!(
            "- {} | {} | {} | {}",
            record.message_id,
            record.locator.as_deref().unwrap_or("(no locator)"),
            record.updated_at.to_rfc3339(),
            record.error.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn process_single_mode(
    config: &Config,
    engine: &mail_unsub_core::Engine,
    mail_store: &JsonMailStore,
    args: &AppArgs,
) -> Result<()> {
    tracing::info!("Running in Single Message mode.");
    let start_time = Instant::now();
    let message_id = args.message_id.as_ref().cloned().unwrap();

    let message = mail_store
        .messages()
        .iter()
        .find(|m| m.id == message_id)
        .cloned()
        .ok_or_else(|| {
            anyhow::anyhow!("Message id '{}' not found in '{}'", message_id, args.input)
        })?;

    tracing::info!(
        "Unsubscribing from Sender='{}', Message='{}'",
        message.sender,
        message.id
    );

    let result = process_single_message(config, engine, message).await;

    if args.stdout {
        print_cli_result(&result);
    } else {
        tracing::info!("Saving result to '{}'...", args.output);
        save_results(&[result], &args.output)?;
        tracing::info!("Result saved successfully to '{}'.", args.output);
    }
    tracing::info!(
        "Single message mode finished. Duration: {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}

async fn process_file_mode(
    config: Arc<Config>,
    engine: Arc<mail_unsub_core::Engine>,
    mail_store: &JsonMailStore,
    args: &AppArgs,
    start_time: Instant,
) -> Result<()> {
    tracing::info!(
        "Running in File Processing mode. Input: '{}', Output: '{}'",
        args.input,
        args.output
    );
    let output_path = Path::new(&args.output);

    if let Some(parent_dir) = output_path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            tracing::debug!("Creating output directory: {}", parent_dir.display());
            std::fs::create_dir_all(parent_dir).with_context(|| {
                format!(
                    "Failed to create output directory '{}'",
                    parent_dir.display()
                )
            })?;
        }
    }
    File::create(&args.output).with_context(|| {
        format!(
            "Cannot write to output file '{}'. Check permissions.",
            args.output
        )
    })?;
    tracing::debug!("Output path '{}' seems writable.", args.output);

    let messages: Vec<MailMessage> = mail_store.messages().to_vec();
    let total_records_loaded = messages.len();
    if total_records_loaded == 0 {
        tracing::warn!(
            "Input file '{}' is empty or contains no messages. Saving empty results file.",
            args.input
        );
        save_results(&[], &args.output)?;
        return Ok(());
    }
    tracing::info!("Loaded {} messages from input file.", total_records_loaded);

    tracing::info!(
        "Starting unsubscribe processing for {} messages (Concurrency: {})...",
        total_records_loaded,
        config.max_concurrency
    );
    let pb = ProgressBar::new(total_records_loaded as u64);
    pb.set_style(ProgressStyle::default_bar()
         .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | ETA: {eta} | {msg}")
         .context("Failed to set progress bar template")?
         .progress_chars("=> "));
    pb.set_message("Processing messages...");

    let processed_results_unordered = process_messages(config.clone(), engine, messages).await;

    pb.set_position(processed_results_unordered.len() as u64);
    pb.finish_with_message(format!(
        "Processed {} messages",
        processed_results_unordered.len()
    ));

    let mut processed_results = processed_results_unordered;
    tracing::info!("Sorting {} results...", processed_results.len());
    processed_results.sort_by(|a, b| {
        (a.sender.as_str(), a.message_id.as_str()).cmp(&(b.sender.as_str(), b.message_id.as_str()))
    });

    tracing::info!("Saving results to '{}'...", args.output);
    save_results(&processed_results, &args.output)?;
    tracing::info!("Results saved successfully.");

    log_summary(
        &processed_results,
        total_records_loaded,
        start_time.elapsed(),
    );

    Ok(())
}

/// Saves the processed results to the specified JSON file.
/// Uses `serde_json` with pretty printing for human readability.
fn save_results(results: &[MessageOutcome], file_path: &str) -> Result<()> {
    tracing::debug!("Creating output file: {}", file_path);
    let file = File::create(file_path)
        .with_context(|| format!("Failed to create/truncate output file '{}'", file_path))?;
    let writer = BufWriter::new(file);

    tracing::debug!(
        "Writing {} results as JSON to file: {}",
        results.len(),
        file_path
    );
    serde_json::to_writer_pretty(writer, results)
        .with_context(|| format!("Failed to serialize results to JSON for '{}'", file_path))?;

    Ok(())
}

/// Logs a summary of the processing results to the console using `tracing::info`.
fn log_summary(processed_results: &[MessageOutcome], original_total: usize, duration: Duration) {
    let total_processed = processed_results.len();
    let successes = processed_results
        .iter()
        .filter(|r| r.status == RunStatus::Success)
        .count();
    let skipped = processed_results
        .iter()
        .filter(|r| r.status == RunStatus::Skipped)
        .count();
    let failures = processed_results
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count();

    tracing::info!("-------------------- Processing Summary --------------------");
    tracing::info!("Total Messages in Input File: {}", original_total);
    tracing::info!("Messages Processed          : {}", total_processed);
    tracing::info!("  - Unsubscribed            : {}", successes);
    tracing::info!("  - Skipped (Debounced)     : {}", skipped);
    tracing::info!("  - Failed                  : {}", failures);
    tracing::info!("Total Time Taken            : {:.2?}", duration);
    if duration.as_secs_f64() > 0.01 && total_processed > 0 {
        let rate = (total_processed as f64) / duration.as_secs_f64();
        tracing::info!("Processing Rate             : {:.2} messages/sec", rate);
    }
    tracing::info!("----------------------------------------------------------");
}

/// Prints the result for a single message to standard output.
fn print_cli_result(result: &MessageOutcome) {
    const BLUE: &str = "\x1b[34m";
    const GREEN: &str = "\x1b[32m";
    const YELLOW: &str = "\x1b[33m";
    const RED: &str = "\x1b[31m";
    const RESET: &str = "\x1b[0m";

    println!("\n{BLUE}===== Mail Unsub Result ====={RESET}");
    println!("Message: {}", result.message_id);
    println!("Sender:  {}", result.sender);
    if let Some(ref subject) = result.subject {
        println!("Subject: {}", subject);
    }

    match result.status {
        RunStatus::Success => {
            println!("\n{GREEN}Status: UNSUBSCRIBED{RESET}");
            if let Some(channel) = result.channel {
                println!("Channel: {}", channel);
            }
            if let Some(ref locator) = result.locator {
                println!("Locator: {}", locator);
            }
        }
        RunStatus::Skipped => {
            println!("\n{YELLOW}Status: SKIPPED{RESET}");
            println!("Reason: Sender already unsubscribed since this message arrived.");
        }
        RunStatus::Failed => {
            println!("\n{RED}Status: FAILED{RESET}");
            println!("Error:  {}", result.error.as_deref().unwrap_or("Unknown"));
        }
    }

    println!("{BLUE}============================={RESET}\n");
}
