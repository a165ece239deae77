//! Mailbox access: where messages come from and where outcome labels go.
//!
//! The engine only needs two capabilities from a mailbox backend, captured
//! in [`MailStore`]. The bundled implementation reads a JSON export and
//! keeps labels in memory, which is what the CLI batch mode uses; an IMAP
//! or API-backed store plugs in behind the same trait.

use crate::core::error::{AppError, Result};
use crate::core::models::MailMessage;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

#[async_trait]
pub trait MailStore: Send + Sync {
    /// Fetches a single message by id.
    async fn fetch_message(&self, message_id: &str) -> Result<Option<MailMessage>>;

    /// Applies a label to a message. Label application is best-effort from
    /// the engine's point of view; failures are logged, not fatal.
    async fn apply_label(&self, message_id: &str, label: &str) -> Result<()>;
}

/// Mail store over a JSON export: an array of messages, as produced by
/// mailbox dump tooling. Labels are tracked in memory and logged.
pub struct JsonMailStore {
    messages: Vec<MailMessage>,
    labels: Mutex<HashMap<String, Vec<String>>>,
}

impl JsonMailStore {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let messages: Vec<MailMessage> = serde_json::from_str(&content)?;
        tracing::info!(
            target: "mailstore",
            path = %path.display(),
            count = messages.len(),
            "loaded message export"
        );
        Ok(Self {
            messages,
            labels: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_messages(messages: Vec<MailMessage>) -> Self {
        Self {
            messages,
            labels: Mutex::new(HashMap::new()),
        }
    }

    pub fn messages(&self) -> &[MailMessage] {
        &self.messages
    }

    /// Labels applied so far for a message, in application order.
    pub fn labels_for(&self, message_id: &str) -> Vec<String> {
        self.labels
            .lock()
            .get(message_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MailStore for JsonMailStore {
    async fn fetch_message(&self, message_id: &str) -> Result<Option<MailMessage>> {
        Ok(self.messages.iter().find(|m| m.id == message_id).cloned())
    }

    async fn apply_label(&self, message_id: &str, label: &str) -> Result<()> {
        if !self.messages.iter().any(|m| m.id == message_id) {
            return Err(AppError::MailStore(format!(
                "unknown message id: {}",
                message_id
            )));
        }
        tracing::info!(target: "mailstore", message_id, label, "applying label");
        self.labels
            .lock()
            .entry(message_id.to_string())
            .or_default()
            .push(label.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> MailMessage {
        MailMessage {
            id: "m1".to_string(),
            sender: "news@example.com".to_string(),
            received_at: Utc::now(),
            subject: Some("hi".to_string()),
            list_unsubscribe: None,
            list_unsubscribe_post: None,
            text_body: None,
            html_body: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_and_label() {
        let store = JsonMailStore::from_messages(vec![sample()]);

        let fetched = store.fetch_message("m1").await.unwrap();
        assert!(fetched.is_some());
        assert!(store.fetch_message("nope").await.unwrap().is_none());

        store.apply_label("m1", "Unsubscribed").await.unwrap();
        assert_eq!(store.labels_for("m1"), vec!["Unsubscribed"]);

        assert!(store.apply_label("nope", "X").await.is_err());
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        let json = r#"[{
            "id": "m1",
            "sender": "news@example.com",
            "received_at": "2026-08-01T12:00:00Z",
            "subject": "Weekly digest",
            "list_unsubscribe": "<https://example.com/unsub>"
        }]"#;
        std::fs::write(&path, json).unwrap();

        let store = JsonMailStore::load(&path).unwrap();
        assert_eq!(store.messages().len(), 1);
        assert_eq!(
            store.messages()[0].list_unsubscribe.as_deref(),
            Some("<https://example.com/unsub>")
        );
    }
}
