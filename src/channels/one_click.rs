//! RFC 8058 one-click channel: a single POST with the fixed form body,
//! no redirects followed, no page interaction.

use crate::core::error::Result;
use reqwest::Client;
use std::time::Duration;

/// Fixed form body mandated by RFC 8058.
pub const ONE_CLICK_BODY: &str = "List-Unsubscribe=One-Click";

/// POSTs the one-click form to `url`. Any 2xx response is success; every
/// definitive non-2xx status is failure. Transport errors propagate.
pub async fn post_one_click(client: &Client, url: &str, timeout: Duration) -> Result<bool> {
    let response = client
        .post(url)
        .timeout(timeout)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(ONE_CLICK_BODY)
        .send()
        .await?;

    let status = response.status();
    tracing::info!(target: "one_click", url, status = status.as_u16(), "one-click POST completed");
    Ok(status.is_success())
}
