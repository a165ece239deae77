//! Browser channel: drives a Chrome session over WebDriver through an
//! unsubscribe page. Loads the page, checks whether it already confirms the
//! unsubscribe, otherwise clicks the most plausible control and re-checks.

use crate::channels::BrowserAgent;
use crate::core::error::{AppError, Result};
use crate::extract::body::UNSUBSCRIBE_KEYWORDS;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator as WdLocator};
use serde_json::map::Map as JsonMap;
use std::time::Duration;

/// Page-source phrases that confirm the unsubscribe took effect.
const SUCCESS_PHRASES: [&str; 7] = [
    "you have been unsubscribed",
    "successfully unsubscribed",
    "you are unsubscribed",
    "unsubscribe successful",
    "you've been removed",
    "subscription cancelled",
    "preferences updated",
];

/// Control texts that keep the subscription alive. A control whose text
/// matches one of these is never clicked, keyword or not.
const DARK_PATTERNS: [&str; 4] = [
    "stay subscribed",
    "keep me subscribed",
    "resubscribe",
    "continue receiving",
];

pub struct WebDriverAgent {
    webdriver_url: String,
}

impl WebDriverAgent {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
        }
    }

    /// Creates a WebDriver client with Chrome capabilities.
    async fn create_client(&self, headless: bool) -> Result<Client> {
        tracing::debug!(target: "browser", "Connecting to WebDriver at {}...", self.webdriver_url);

        let mut caps = JsonMap::new();
        let mut chrome_opts = JsonMap::new();

        let mut args = vec![
            "--no-sandbox",
            "--disable-gpu",
            "--disable-dev-shm-usage",
            "--window-size=1024,768",
            "--disable-extensions",
            "--disable-background-networking",
            "--disable-sync",
            "--disable-translate",
            "--mute-audio",
            "--ignore-certificate-errors",
            "--log-level=1",
        ];
        if headless {
            args.insert(0, "--headless=new");
        }
        chrome_opts.insert("args".to_string(), serde_json::json!(args));

        caps.insert("browserName".to_string(), serde_json::json!("chrome"));
        caps.insert(
            "goog:chromeOptions".to_string(),
            serde_json::json!(chrome_opts),
        );

        let mut builder = ClientBuilder::native();
        builder.capabilities(caps);

        match builder.connect(&self.webdriver_url).await {
            Ok(client) => {
                tracing::debug!(target: "browser", "WebDriver client connected.");
                Ok(client)
            }
            Err(e) => {
                tracing::error!(
                    target: "browser",
                    "Failed to connect to WebDriver at {}: {}",
                    self.webdriver_url,
                    e
                );
                Err(AppError::WebDriverSession(e))
            }
        }
    }

    async fn close_client(&self, client: Client) {
        if let Err(e) = client.close().await {
            tracing::warn!(target: "browser", "Failed to close WebDriver client cleanly: {}", e);
        }
    }

    async fn run_flow(&self, client: &Client, url: &str) -> Result<(bool, Option<String>)> {
        client.goto(url).await?;

        let source = client.source().await?;
        if page_confirms_success(&source) {
            tracing::info!(target: "browser", url, "page confirms unsubscribe on load");
            return Ok((true, None));
        }

        // No confirmation yet. Find the most plausible unsubscribe control
        // and click it.
        let candidates = client
            .find_all(WdLocator::Css(
                "a, button, input[type='submit'], input[type='button']",
            ))
            .await?;

        let mut clicked = false;
        for element in candidates {
            let text = match element.text().await {
                Ok(t) if !t.trim().is_empty() => t,
                _ => match element.attr("value").await {
                    Ok(Some(v)) => v,
                    _ => continue,
                },
            };
            let lower = text.to_lowercase();
            if DARK_PATTERNS.iter().any(|p| lower.contains(p)) {
                tracing::debug!(target: "browser", control = %text.trim(), "skipping retention control");
                continue;
            }
            if !UNSUBSCRIBE_KEYWORDS.iter().any(|k| lower.contains(k)) {
                continue;
            }
            tracing::debug!(target: "browser", control = %text.trim(), "clicking unsubscribe control");
            if element.click().await.is_ok() {
                clicked = true;
                break;
            }
        }

        if !clicked {
            return Ok((false, Some("no unsubscribe control found on page".to_string())));
        }

        // Give the page a moment to settle after the click.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let source = client.source().await?;
        if page_confirms_success(&source) {
            Ok((true, None))
        } else {
            Ok((
                false,
                Some("clicked control but page did not confirm".to_string()),
            ))
        }
    }
}

fn page_confirms_success(source: &str) -> bool {
    let lower = source.to_lowercase();
    SUCCESS_PHRASES.iter().any(|p| lower.contains(p))
}

#[async_trait]
impl BrowserAgent for WebDriverAgent {
    async fn attempt_unsubscribe(
        &self,
        url: &str,
        timeout: Duration,
        headless: bool,
    ) -> Result<(bool, Option<String>)> {
        let client = self.create_client(headless).await?;

        let outcome = match tokio::time::timeout(timeout, self.run_flow(&client, url)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(AppError::WebDriverCmd(e))) => {
                // Page-level failures are per-URL, not fatal to the run.
                tracing::warn!(target: "browser", url, "WebDriver command failed: {}", e);
                Ok((false, Some(format!("browser error: {}", e))))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(target: "browser", url, timeout_secs = timeout.as_secs(), "browser attempt timed out");
                Ok((
                    false,
                    Some(format!("timed out after {}s", timeout.as_secs())),
                ))
            }
        };

        self.close_client(client).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_confirms_success() {
        assert!(page_confirms_success(
            "<html><body><h1>You have been unsubscribed.</h1></body></html>"
        ));
        assert!(page_confirms_success("Your Preferences Updated!"));
        assert!(!page_confirms_success(
            "<html><body>Are you sure you want to unsubscribe?</body></html>"
        ));
    }
}
