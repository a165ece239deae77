//! Channel orchestration: takes a resolved [`CandidateSet`] and runs the
//! unsubscribe channels in priority order, recording exactly one terminal
//! state per message.
//!
//! Channel order: mailto (advisory unless it is the only channel), then the
//! RFC 8058 one-click POST, then the browser over every remaining URL.

use crate::channels::{BrowserAgent, MailSender};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::models::{
    normalize_sender, CandidateSet, Channel, ExecutionOutcome, MailMessage, RecordStatus,
};
use crate::extract::validate::Prober;
use crate::mailstore::MailStore;
use crate::store::StateStore;
use reqwest::Client;
use std::sync::Arc;

pub struct Orchestrator {
    http_client: Arc<Client>,
    prober: Prober,
    store: Arc<StateStore>,
    mailer: Option<Arc<dyn MailSender>>,
    browser: Arc<dyn BrowserAgent>,
    mail_store: Option<Arc<dyn MailStore>>,
}

impl Orchestrator {
    pub fn new(
        http_client: Arc<Client>,
        prober: Prober,
        store: Arc<StateStore>,
        mailer: Option<Arc<dyn MailSender>>,
        browser: Arc<dyn BrowserAgent>,
        mail_store: Option<Arc<dyn MailStore>>,
    ) -> Self {
        Self {
            http_client,
            prober,
            store,
            mailer,
            browser,
            mail_store,
        }
    }

    /// Runs the full channel sequence for one message.
    ///
    /// Debounced messages are skipped without touching the record table.
    /// Every other message gets a pending record up front and exactly one
    /// terminal status write at the end.
    pub async fn execute(
        &self,
        set: &CandidateSet,
        message: &MailMessage,
        config: &Config,
    ) -> Result<ExecutionOutcome> {
        let sender = normalize_sender(&message.sender);

        if !self.store.should_attempt(&sender, message.received_at)? {
            tracing::info!(
                target: "orchestrator",
                message_id = %message.id,
                sender = %sender,
                "sender already unsubscribed since this message arrived, skipping"
            );
            return Ok(ExecutionOutcome::skipped());
        }

        if set.is_empty() {
            let error = "no unsubscribe locator found";
            self.store.upsert_record(
                &message.id,
                None,
                set.raw_header.as_deref(),
                RecordStatus::Failed,
                Some(error),
            )?;
            self.label(&message.id, &config.label_failed).await;
            return Ok(ExecutionOutcome::failed(error.to_string()));
        }

        self.store.upsert_record(
            &message.id,
            set.primary_url()
                .or_else(|| set.primary_mailto())
                .map(|l| l.value.as_str()),
            set.raw_header.as_deref(),
            RecordStatus::Pending,
            None,
        )?;

        let mut failures: Vec<String> = Vec::new();
        let mut mailto_success: Option<String> = None;

        // Mailto first. When HTTP candidates exist this is advisory: a sent
        // mail does not stop the stronger channels from running.
        if config.enable_mailto {
            if let (Some(mailer), Some(mailto)) = (self.mailer.as_ref(), set.primary_mailto()) {
                match mailer.send_unsubscribe(&mailto.value, message).await {
                    Ok(true) => {
                        mailto_success = Some(mailto.value.clone());
                    }
                    Ok(false) => {
                        failures.push(format!("mailto {}: relay did not accept", mailto.value));
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "orchestrator",
                            message_id = %message.id,
                            "mailto channel failed: {}",
                            e
                        );
                        failures.push(format!("mailto {}: {}", mailto.value, e));
                    }
                }
            }
        }

        // One-click POST. A 2xx here is a definitive unsubscribe; nothing
        // further runs.
        if let Some(locator) = set.one_click_url() {
            match crate::channels::one_click::post_one_click(
                &self.http_client,
                &locator.value,
                config.request_timeout,
            )
            .await
            {
                Ok(true) => {
                    return self
                        .finish_success(message, config, Channel::OneClickPost, &locator.value)
                        .await;
                }
                Ok(false) => {
                    failures.push(format!("one-click {}: non-2xx response", locator.value));
                }
                Err(e) => {
                    tracing::warn!(
                        target: "orchestrator",
                        message_id = %message.id,
                        "one-click channel failed: {}",
                        e
                    );
                    failures.push(format!("one-click {}: {}", locator.value, e));
                }
            }
        }

        // Browser fallback over every URL, in resolution order. The first
        // URL is always attempted; later ones are skipped when a probe comes
        // back with a definitive 404.
        for (index, locator) in set.urls.iter().enumerate() {
            if index > 0 {
                let (reachable, status) = self.prober.probe(&locator.value).await;
                if !reachable && status == Some(404) {
                    tracing::debug!(
                        target: "orchestrator",
                        url = %locator.value,
                        "skipping candidate, probe returned 404"
                    );
                    failures.push(format!("browser {}: probe returned 404", locator.value));
                    continue;
                }
            }
            match self
                .browser
                .attempt_unsubscribe(&locator.value, config.browser_timeout, config.headless)
                .await
            {
                Ok((true, _)) => {
                    return self
                        .finish_success(message, config, Channel::Browser, &locator.value)
                        .await;
                }
                Ok((false, detail)) => {
                    failures.push(format!(
                        "browser {}: {}",
                        locator.value,
                        detail.unwrap_or_else(|| "did not confirm".to_string())
                    ));
                }
                Err(e) => {
                    // Session-level failure: the WebDriver endpoint itself is
                    // unusable. Fatal for the whole run; the record stays
                    // pending with no terminal write.
                    tracing::error!(
                        target: "orchestrator",
                        message_id = %message.id,
                        "browser session failed: {}",
                        e
                    );
                    return Err(e);
                }
            }
        }

        // A sent unsubscribe mail is terminal only when mail was the sole
        // channel available. When URL candidates existed and were all
        // exhausted, the run fails: mailto delivery is unverifiable and
        // must not debounce the sender.
        if set.urls.is_empty() {
            if let Some(address) = mailto_success {
                return self
                    .finish_success(message, config, Channel::Mailto, &address)
                    .await;
            }
        }

        let error = if failures.is_empty() {
            "no executable channel for this candidate set".to_string()
        } else {
            failures.join("; ")
        };
        self.store
            .update_status(&message.id, RecordStatus::Failed, None, Some(&error))?;
        self.label(&message.id, &config.label_failed).await;
        tracing::info!(
            target: "orchestrator",
            message_id = %message.id,
            sender = %sender,
            "all channels exhausted: {}",
            error
        );
        Ok(ExecutionOutcome::failed(error))
    }

    async fn finish_success(
        &self,
        message: &MailMessage,
        config: &Config,
        channel: Channel,
        locator: &str,
    ) -> Result<ExecutionOutcome> {
        self.store.update_status(
            &message.id,
            RecordStatus::Success,
            Some(locator),
            None,
        )?;
        self.store
            .record_success(&normalize_sender(&message.sender), message.received_at)?;
        self.label(&message.id, &config.label_unsubscribed).await;
        tracing::info!(
            target: "orchestrator",
            message_id = %message.id,
            channel = %channel,
            locator,
            "unsubscribe succeeded"
        );
        Ok(ExecutionOutcome::success(channel, locator.to_string()))
    }

    async fn label(&self, message_id: &str, label: &str) {
        if let Some(store) = self.mail_store.as_ref() {
            if let Err(e) = store.apply_label(message_id, label).await {
                tracing::warn!(target: "orchestrator", message_id, label, "label application failed: {}", e);
            }
        }
    }
}
