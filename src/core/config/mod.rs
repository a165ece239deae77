//! Configuration types and defaults.
//!
//! `Config` is the fully-resolved runtime configuration; `ConfigFile` is the
//! optional-everything mirror deserialized from TOML. Construction goes
//! through [`ConfigBuilder`], which merges defaults, file settings, and
//! programmatic overrides, then validates the result.

mod builder;
mod loading;
mod validation;

pub use builder::ConfigBuilder;

use crate::core::error::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; mail-unsub/0.1; +https://github.com/mail-unsub)";

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Timeout applied to HTTP requests (one-click POST).
    pub request_timeout: Duration,
    /// Timeout for the best-effort HEAD probe of candidate URLs.
    pub probe_timeout: Duration,
    /// Treat probe network failures as reachable. Probe failures are often
    /// false negatives (HEAD rejected, geo-blocking of automated clients),
    /// so the default gives the candidate a chance at the full channel.
    pub probe_fail_open: bool,
    pub user_agent: String,

    /// Run the fallback browser in headless mode.
    pub headless: bool,
    /// Wall-clock budget for one browser unsubscribe attempt.
    pub browser_timeout: Duration,
    /// WebDriver endpoint the browser agent connects to.
    pub webdriver_url: String,

    /// Enable the mailto channel (sending an unsubscribe mail).
    pub enable_mailto: bool,
    /// SMTP relay used by the mailto channel. The channel is disabled when
    /// no relay is configured.
    pub smtp_relay: Option<String>,
    pub smtp_port: u16,
    /// Sender address placed on outgoing unsubscribe mails.
    pub smtp_sender_email: String,

    /// Location of the SQLite state database.
    pub state_db_path: PathBuf,

    /// Maximum number of senders processed concurrently.
    pub max_concurrency: usize,

    /// Action label marking messages to unsubscribe from.
    pub label_action: String,
    /// Label applied after a successful unsubscribe.
    pub label_unsubscribed: String,
    /// Label applied after all channels failed.
    pub label_failed: String,

    /// Path of the configuration file actually loaded, if any.
    pub loaded_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(5),
            probe_fail_open: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headless: true,
            browser_timeout: Duration::from_secs(60),
            webdriver_url: "http://localhost:4444".to_string(),
            enable_mailto: true,
            smtp_relay: None,
            smtp_port: 587,
            smtp_sender_email: String::new(),
            state_db_path: PathBuf::from("mail-unsub.db"),
            max_concurrency: 4,
            label_action: "Unsubscribe".to_string(),
            label_unsubscribed: "Unsubscribed".to_string(),
            label_failed: "Unsubscribe-Failed".to_string(),
            loaded_config_path: None,
        }
    }
}

/// TOML file representation. Every field is optional; absent values leave
/// the corresponding `Config` default (or earlier layer) untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub network: NetworkSection,
    pub browser: BrowserSection,
    pub channels: ChannelsSection,
    pub smtp: SmtpSection,
    pub storage: StorageSection,
    pub labels: LabelsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub request_timeout: Option<u64>,
    pub probe_timeout: Option<u64>,
    pub probe_fail_open: Option<bool>,
    pub user_agent: Option<String>,
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub headless: Option<bool>,
    pub timeout: Option<u64>,
    pub webdriver_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChannelsSection {
    pub enable_mailto: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SmtpSection {
    pub relay: Option<String>,
    pub port: Option<u16>,
    pub sender_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub state_db: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LabelsSection {
    pub action: Option<String>,
    pub unsubscribed: Option<String>,
    pub failed: Option<String>,
}
