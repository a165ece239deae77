//! Candidate resolution: turns one message into an ordered, deduplicated
//! [`CandidateSet`].
//!
//! Ordering is fixed by origin (header first, then body markup, then body
//! text) and by appearance within each origin, so resolution over the same
//! message is deterministic.

use crate::core::models::{CandidateSet, LocatorKind, MailMessage};
use crate::extract::body;
use crate::extract::decode::decode_body;
use crate::extract::header::parse_list_unsubscribe;
use crate::extract::validate::validate_url;

/// RFC 8058 marker required in `List-Unsubscribe-Post` for one-click.
const ONE_CLICK_MARKER: &str = "List-Unsubscribe=One-Click";

/// Resolves every unsubscribe locator in a message.
///
/// Header locators come first and are the only ones eligible for the
/// one-click flag. Body extraction runs all layers and its results are
/// appended, skipping values the header already produced.
pub fn resolve(message: &MailMessage) -> CandidateSet {
    let mut set = CandidateSet {
        message_id: message.id.clone(),
        urls: Vec::new(),
        mailtos: Vec::new(),
        raw_header: message.list_unsubscribe.clone(),
    };

    let one_click = message
        .list_unsubscribe_post
        .as_deref()
        .map(|post| post.contains(ONE_CLICK_MARKER))
        .unwrap_or(false);

    if let Some(raw) = message.list_unsubscribe.as_deref() {
        for mut locator in parse_list_unsubscribe(raw) {
            match locator.kind {
                LocatorKind::Url => {
                    if !validate_url(&locator.value) {
                        tracing::debug!(
                            target: "resolver",
                            message_id = %message.id,
                            url = %locator.value,
                            "dropping invalid header URL"
                        );
                        continue;
                    }
                    locator.one_click = one_click;
                    if !set.urls.iter().any(|l| l.value == locator.value) {
                        set.urls.push(locator);
                    }
                }
                LocatorKind::Mailto => {
                    if !set.mailtos.iter().any(|l| l.value == locator.value) {
                        set.mailtos.push(locator);
                    }
                }
            }
        }
    }

    let html_body = message.html_body.as_deref().map(decode_body);
    let text_body = message.text_body.as_deref().map(decode_body);
    for locator in body::extract_all(html_body.as_deref(), text_body.as_deref()) {
        if !set.urls.iter().any(|l| l.value == locator.value) {
            set.urls.push(locator);
        }
    }

    tracing::debug!(
        target: "resolver",
        message_id = %message.id,
        urls = set.urls.len(),
        mailtos = set.mailtos.len(),
        "resolved candidate set"
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::LocatorOrigin;
    use chrono::Utc;

    fn message() -> MailMessage {
        MailMessage {
            id: "msg-1".to_string(),
            sender: "news@example.com".to_string(),
            received_at: Utc::now(),
            subject: Some("Weekly digest".to_string()),
            list_unsubscribe: None,
            list_unsubscribe_post: None,
            text_body: None,
            html_body: None,
        }
    }

    #[test]
    fn test_header_only() {
        let mut msg = message();
        msg.list_unsubscribe =
            Some("<https://example.com/unsub?id=1>, <mailto:unsub@example.com>".to_string());
        let set = resolve(&msg);
        assert_eq!(set.urls.len(), 1);
        assert_eq!(set.mailtos.len(), 1);
        assert_eq!(set.urls[0].origin, LocatorOrigin::Header);
        assert!(!set.urls[0].one_click);
    }

    #[test]
    fn test_one_click_flag_requires_marker() {
        let mut msg = message();
        msg.list_unsubscribe = Some("<https://example.com/unsub>".to_string());
        msg.list_unsubscribe_post = Some("List-Unsubscribe=One-Click".to_string());
        let set = resolve(&msg);
        assert!(set.urls[0].one_click);
        assert_eq!(
            set.one_click_url().map(|l| l.value.as_str()),
            Some("https://example.com/unsub")
        );

        msg.list_unsubscribe_post = Some("something-else".to_string());
        let set = resolve(&msg);
        assert!(!set.urls[0].one_click);
        assert!(set.one_click_url().is_none());
    }

    #[test]
    fn test_one_click_never_applies_to_body_urls() {
        let mut msg = message();
        msg.list_unsubscribe_post = Some("List-Unsubscribe=One-Click".to_string());
        msg.html_body = Some(r#"<a href="https://b.com/unsub">Unsubscribe</a>"#.to_string());
        let set = resolve(&msg);
        assert_eq!(set.urls.len(), 1);
        assert!(!set.urls[0].one_click);
        assert!(set.one_click_url().is_none());
    }

    #[test]
    fn test_header_precedes_body_and_dedupes() {
        let mut msg = message();
        msg.list_unsubscribe = Some("<https://a.com/unsub>".to_string());
        msg.html_body = Some(
            r#"<a href="https://a.com/unsub">Unsubscribe</a>
               <a href="https://b.com/optout">Opt out</a>"#
                .to_string(),
        );
        let set = resolve(&msg);
        let values: Vec<&str> = set.urls.iter().map(|l| l.value.as_str()).collect();
        assert_eq!(values, vec!["https://a.com/unsub", "https://b.com/optout"]);
        assert_eq!(set.urls[0].origin, LocatorOrigin::Header);
        assert_eq!(set.urls[1].origin, LocatorOrigin::BodyMarkup);
    }

    #[test]
    fn test_invalid_header_url_dropped() {
        let mut msg = message();
        msg.list_unsubscribe = Some("<https://a.com/unsub?id=>".to_string());
        let set = resolve(&msg);
        assert!(set.urls.is_empty());
        assert!(set.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let mut msg = message();
        msg.list_unsubscribe = Some("<https://a.com/u-unsub>".to_string());
        msg.text_body = Some("see https://b.com/unsubscribe too".to_string());
        let first = resolve(&msg);
        let second = resolve(&msg);
        assert_eq!(
            first.urls.iter().map(|l| &l.value).collect::<Vec<_>>(),
            second.urls.iter().map(|l| &l.value).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_body_transfer_encoding_decoded_before_scan() {
        let mut msg = message();
        msg.text_body = Some("stop here: https://a.com/unsub?id=3D42".to_string());
        let set = resolve(&msg);
        assert_eq!(set.urls.len(), 1);
        assert_eq!(set.urls[0].value, "https://a.com/unsub?id=42");
    }

    #[test]
    fn test_empty_message_yields_empty_set() {
        let set = resolve(&message());
        assert!(set.is_empty());
        assert!(set.primary_url().is_none());
        assert!(set.primary_mailto().is_none());
    }
}
