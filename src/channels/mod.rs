//! Unsubscribe execution channels.
//!
//! Each channel knows how to act on one kind of locator. The traits exist
//! so the orchestrator can be exercised in tests without SMTP relays or
//! WebDriver sessions.

pub mod browser;
pub mod mailto;
pub mod one_click;

use crate::core::error::Result;
use crate::core::models::MailMessage;
use async_trait::async_trait;
use std::time::Duration;

/// Sends an unsubscribe request by mail.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Sends an unsubscribe mail to `to` on behalf of `message`. Returns
    /// `Ok(true)` when the relay accepted the mail.
    async fn send_unsubscribe(&self, to: &str, message: &MailMessage) -> Result<bool>;
}

/// Drives a real browser through an unsubscribe page.
#[async_trait]
pub trait BrowserAgent: Send + Sync {
    /// Navigates to `url` and tries to complete the unsubscribe flow.
    /// Returns `(success, detail)`; `detail` carries a human-readable note
    /// on failure. `Err` is reserved for conditions that make further
    /// attempts pointless, such as an unreachable WebDriver endpoint.
    async fn attempt_unsubscribe(
        &self,
        url: &str,
        timeout: Duration,
        headless: bool,
    ) -> Result<(bool, Option<String>)>;
}

pub use browser::WebDriverAgent;
pub use mailto::SmtpMailer;
