//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Returns the parsed `ConfigFile` content.
/// Internal to the builder logic.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    tracing::debug!("Attempting to parse TOML from: {}", file_path);
    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

/// Applies settings from a parsed `ConfigFile` onto a mutable `Config`
/// instance. Internal helper for the builder. This merges settings.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    // Network
    if let Some(timeout) = file_config.network.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(timeout) = file_config.network.probe_timeout {
        config.probe_timeout = Duration::from_secs(timeout);
    }
    if let Some(fail_open) = file_config.network.probe_fail_open {
        config.probe_fail_open = fail_open;
    }
    if let Some(ref user_agent) = file_config.network.user_agent {
        config.user_agent = user_agent.clone();
    }
    if let Some(concurrency) = file_config.network.max_concurrency {
        config.max_concurrency = concurrency;
    }

    // Browser
    if let Some(headless) = file_config.browser.headless {
        config.headless = headless;
    }
    if let Some(timeout) = file_config.browser.timeout {
        config.browser_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref url) = file_config.browser.webdriver_url {
        if !url.trim().is_empty() {
            config.webdriver_url = url.trim().to_string();
        }
    }

    // Channels
    if let Some(enable) = file_config.channels.enable_mailto {
        config.enable_mailto = enable;
    }

    // SMTP
    if let Some(ref relay) = file_config.smtp.relay {
        if !relay.trim().is_empty() {
            config.smtp_relay = Some(relay.trim().to_string());
        } else {
            config.smtp_relay = None;
        }
    }
    if let Some(port) = file_config.smtp.port {
        config.smtp_port = port;
    }
    if let Some(ref sender) = file_config.smtp.sender_email {
        config.smtp_sender_email = sender.clone();
    }

    // Storage
    if let Some(ref path) = file_config.storage.state_db {
        config.state_db_path = PathBuf::from(path);
    }

    // Labels
    if let Some(ref label) = file_config.labels.action {
        config.label_action = label.clone();
    }
    if let Some(ref label) = file_config.labels.unsubscribed {
        config.label_unsubscribed = label.clone();
    }
    if let Some(ref label) = file_config.labels.failed {
        config.label_failed = label.clone();
    }
}
