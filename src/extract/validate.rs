//! Candidate URL validation and reachability probing.

use crate::core::config::Config;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Structural validation of a candidate unsubscribe URL.
///
/// Beyond plain URL syntax this rejects the truncation artifacts that
/// pattern extraction produces: quoted-printable leftovers make URLs end in
/// a dangling `=`, and markup slicing leaves a bare trailing `?`.
pub fn validate_url(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.ends_with('=') || trimmed.ends_with('?') {
        return false;
    }
    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => return false,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    if parsed.host_str().map_or(true, |h| h.is_empty()) {
        return false;
    }
    // A fragment can hide the truncation from the whole-string check, so
    // the query component is inspected on its own.
    if parsed
        .query()
        .map_or(false, |q| q.trim_end().ends_with('=') || q.trim_end().is_empty())
    {
        return false;
    }
    true
}

/// Best-effort liveness probe for candidate URLs.
///
/// A probe is advisory only. HEAD requests are cheap but widely rejected or
/// filtered, so network errors resolve to the configured fail-open policy
/// rather than disqualifying the candidate.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Arc<Client>,
    timeout: Duration,
    fail_open: bool,
}

impl Prober {
    pub fn new(client: Arc<Client>, config: &Config) -> Self {
        Self {
            client,
            timeout: config.probe_timeout,
            fail_open: config.probe_fail_open,
        }
    }

    /// Issues a HEAD request and reports `(reachable, status)`.
    ///
    /// 2xx and 3xx responses count as reachable; any definitive HTTP status
    /// is passed back so callers can treat e.g. a 404 as disqualifying.
    /// Transport errors yield `(fail_open, None)`.
    pub async fn probe(&self, url: &str) -> (bool, Option<u16>) {
        let result = self
            .client
            .head(url)
            .timeout(self.timeout)
            .send()
            .await;
        match result {
            Ok(response) => {
                let status = response.status();
                let reachable = status.is_success() || status.is_redirection();
                tracing::debug!(target: "probe", url, status = status.as_u16(), reachable);
                (reachable, Some(status.as_u16()))
            }
            Err(e) => {
                tracing::debug!(
                    target: "probe",
                    url,
                    error = %e,
                    fail_open = self.fail_open,
                    "probe request failed"
                );
                (self.fail_open, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("https://example.com/unsubscribe"));
        assert!(validate_url("http://example.com/u?id=42"));
        assert!(validate_url("https://example.com/u?token=abc&x=1"));
    }

    #[test]
    fn test_rejects_truncation_artifacts() {
        // Quoted-printable soft-break residue.
        assert!(!validate_url("https://example.com/u?id="));
        assert!(!validate_url("https://example.com/u?"));
    }

    #[test]
    fn test_rejects_truncated_query_hidden_by_fragment() {
        assert!(!validate_url("https://example.com/u?id=#frag"));
        assert!(!validate_url("https://example.com/u?#frag"));
        // A complete query followed by a fragment is fine.
        assert!(validate_url("https://example.com/u?id=1#frag"));
    }

    #[test]
    fn test_rejects_non_http_and_hostless() {
        assert!(!validate_url("mailto:unsub@example.com"));
        assert!(!validate_url("ftp://example.com/u"));
        assert!(!validate_url("https://"));
        assert!(!validate_url("not a url"));
        assert!(!validate_url(""));
    }

    #[test]
    fn test_whitespace_trimmed_before_checks() {
        assert!(validate_url("  https://example.com/unsub  "));
        assert!(!validate_url("  https://example.com/u?id=  "));
    }
}
