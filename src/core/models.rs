//! Core data structures: messages, locators, candidate sets, and the durable
//! records tracked per message and per sender.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of endpoint a locator points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Url,
    Mailto,
}

/// Where a locator was discovered. Used to break ties when ordering
/// candidates: header beats markup beats plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocatorOrigin {
    Header,
    BodyMarkup,
    BodyText,
}

/// A single candidate unsubscribe endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub kind: LocatorKind,
    /// Normalized URL or bare email address: trimmed, with any embedded
    /// spaces introduced by header line-wrapping removed.
    pub value: String,
    pub origin: LocatorOrigin,
    /// True only when the same message carries a `List-Unsubscribe-Post`
    /// header asserting RFC 8058 one-click support for this locator.
    pub one_click: bool,
}

impl Locator {
    pub fn url(value: impl Into<String>, origin: LocatorOrigin) -> Self {
        Self {
            kind: LocatorKind::Url,
            value: value.into(),
            origin,
            one_click: false,
        }
    }

    pub fn mailto(value: impl Into<String>, origin: LocatorOrigin) -> Self {
        Self {
            kind: LocatorKind::Mailto,
            value: value.into(),
            origin,
            one_click: false,
        }
    }
}

/// The ordered, deduplicated set of locators resolved for one message.
///
/// URL locators keep resolution order (header first, then body URLs in scan
/// order); mailto locators are tracked separately and never compete with
/// URLs for ordering. The raw header value is retained for audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub message_id: String,
    pub urls: Vec<Locator>,
    pub mailtos: Vec<Locator>,
    pub raw_header: Option<String>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.mailtos.is_empty()
    }

    /// The highest-priority URL locator, if any.
    pub fn primary_url(&self) -> Option<&Locator> {
        self.urls.first()
    }

    /// The header-origin URL carrying one-click support, if any.
    pub fn one_click_url(&self) -> Option<&Locator> {
        self.urls
            .iter()
            .find(|l| l.one_click && l.origin == LocatorOrigin::Header)
    }

    pub fn primary_mailto(&self) -> Option<&Locator> {
        self.mailtos.first()
    }
}

/// Durable per-message unsubscribe status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Success,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Success => "success",
            RecordStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecordStatus::Pending),
            "success" => Some(RecordStatus::Success),
            "failed" => Some(RecordStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable per-message record of the locator used and the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRecord {
    pub message_id: String,
    /// The URL or mailto value ultimately used; updated to whichever value
    /// succeeded once a channel works.
    pub locator: Option<String>,
    /// Raw `List-Unsubscribe` header value, kept for audit.
    pub raw_header: Option<String>,
    pub status: RecordStatus,
    /// Human-readable reason, set only on failure.
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Durable per-sender debounce state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderDebounceRecord {
    pub sender_address: String,
    pub last_unsubscribed_at: DateTime<Utc>,
}

/// The channel that produced a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Mailto,
    OneClickPost,
    Browser,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Mailto => f.write_str("mailto"),
            Channel::OneClickPost => f.write_str("one-click-post"),
            Channel::Browser => f.write_str("browser"),
        }
    }
}

/// Terminal status of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    /// The sender was already unsubscribed at or after this message's
    /// received time; no channel was attempted and no status was written.
    Skipped,
}

/// Result of `Orchestrator::execute` for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: RunStatus,
    pub channel: Option<Channel>,
    /// The locator that worked, on success.
    pub locator: Option<String>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn skipped() -> Self {
        Self {
            status: RunStatus::Skipped,
            channel: None,
            locator: None,
            error: None,
        }
    }

    pub fn success(channel: Channel, locator: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Success,
            channel: Some(channel),
            locator: Some(locator.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            channel: None,
            locator: None,
            error: Some(error.into()),
        }
    }
}

/// A message as handed to the engine by the mail-store collaborator.
///
/// Bodies are already content-transfer-decoded by the store where possible;
/// the extractors still tolerate quoted-printable and base64 leftovers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: String,
    /// Raw `From` header value, e.g. `Deals <deals@example.com>`.
    pub sender: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Raw `List-Unsubscribe` header value, if present.
    #[serde(default)]
    pub list_unsubscribe: Option<String>,
    /// Raw `List-Unsubscribe-Post` header value, if present.
    #[serde(default)]
    pub list_unsubscribe_post: Option<String>,
    #[serde(default)]
    pub text_body: Option<String>,
    #[serde(default)]
    pub html_body: Option<String>,
}

impl MailMessage {
    /// Extracts the bare address from the `From` header value, handling
    /// both `Name <addr@host>` and bare `addr@host` forms.
    pub fn sender_address(&self) -> String {
        extract_address(&self.sender)
    }
}

/// Pulls the address out of a `Name <addr>` style header value and
/// normalizes it to lowercase. Debounce records key on this form.
pub fn normalize_sender(from_header: &str) -> String {
    extract_address(from_header).to_lowercase()
}

fn extract_address(from_header: &str) -> String {
    if let (Some(start), Some(end)) = (from_header.find('<'), from_header.rfind('>')) {
        if start < end {
            return from_header[start + 1..end].trim().to_string();
        }
    }
    from_header.trim().to_string()
}

/// Per-message processing result as reported to the caller and serialized
/// into the results file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageOutcome {
    pub message_id: String,
    pub sender: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub locator: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MessageOutcome {
    pub fn from_execution(message: &MailMessage, outcome: ExecutionOutcome) -> Self {
        Self {
            message_id: message.id.clone(),
            sender: message.sender.clone(),
            subject: message.subject.clone(),
            status: outcome.status,
            channel: outcome.channel,
            locator: outcome.locator,
            error: outcome.error,
        }
    }
}
