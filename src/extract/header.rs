//! `List-Unsubscribe` header parsing (RFC 2369).
//!
//! The header value is a comma-separated list of angle-bracketed URIs, but
//! real mail streams deliver folded, space-riddled, and bracket-free
//! variants. Parsing therefore strips all whitespace up front and falls
//! back to scanning for bare URIs when no brackets are present.

use crate::core::models::{Locator, LocatorOrigin};
use crate::extract::decode::decode_mime_header;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BRACKETED: Regex = Regex::new(r"<([^>]+)>").unwrap();
    static ref BARE_URI: Regex =
        Regex::new(r"(?i)(https?://[^\s,<>]+|mailto:[^\s,<>]+)").unwrap();
}

/// Parses a raw `List-Unsubscribe` header value into locators, in the order
/// they appear. Encoded words are decoded first, then all whitespace is
/// removed (header folding leaves spaces in the middle of URIs). Entries
/// that are neither `http(s)` nor `mailto` URIs are dropped.
pub fn parse_list_unsubscribe(raw: &str) -> Vec<Locator> {
    let decoded = decode_mime_header(raw);
    let compact: String = decoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Vec::new();
    }

    let mut locators = Vec::new();
    let mut found_brackets = false;
    for caps in BRACKETED.captures_iter(&compact) {
        found_brackets = true;
        push_entry(&mut locators, &caps[1]);
    }
    if !found_brackets {
        // Malformed header without angle brackets. Salvage bare URIs.
        tracing::debug!(
            target: "header",
            "List-Unsubscribe header has no angle brackets, scanning for bare URIs"
        );
        for caps in BARE_URI.captures_iter(&compact) {
            push_entry(&mut locators, &caps[1]);
        }
    }
    locators
}

fn push_entry(locators: &mut Vec<Locator>, entry: &str) {
    let lower = entry.to_ascii_lowercase();
    if let Some(address) = lower.strip_prefix("mailto:") {
        if !address.is_empty() {
            // Preserve original casing of the address part; only the scheme
            // comparison is case-insensitive.
            locators.push(Locator::mailto(&entry["mailto:".len()..], LocatorOrigin::Header));
        }
    } else if lower.starts_with("http://") || lower.starts_with("https://") {
        locators.push(Locator::url(entry, LocatorOrigin::Header));
    } else {
        tracing::trace!(target: "header", entry, "ignoring non-URI List-Unsubscribe entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::LocatorKind;

    #[test]
    fn test_single_url() {
        let locators = parse_list_unsubscribe("<https://example.com/unsub?id=1>");
        assert_eq!(locators.len(), 1);
        assert_eq!(locators[0].kind, LocatorKind::Url);
        assert_eq!(locators[0].value, "https://example.com/unsub?id=1");
        assert_eq!(locators[0].origin, LocatorOrigin::Header);
    }

    #[test]
    fn test_url_and_mailto_ordered() {
        let locators =
            parse_list_unsubscribe("<https://a.com/u>, <mailto:unsub@a.com?subject=stop>");
        assert_eq!(locators.len(), 2);
        assert_eq!(locators[0].kind, LocatorKind::Url);
        assert_eq!(locators[1].kind, LocatorKind::Mailto);
        assert_eq!(locators[1].value, "unsub@a.com?subject=stop");
    }

    #[test]
    fn test_folded_header_with_embedded_spaces() {
        // Folding whitespace can land inside the URI itself.
        let locators = parse_list_unsubscribe("<https://example.com/un\r\n sub/token123>");
        assert_eq!(locators.len(), 1);
        assert_eq!(locators[0].value, "https://example.com/unsub/token123");
    }

    #[test]
    fn test_bare_url_fallback_without_brackets() {
        let locators = parse_list_unsubscribe("https://example.com/unsub");
        assert_eq!(locators.len(), 1);
        assert_eq!(locators[0].value, "https://example.com/unsub");
    }

    #[test]
    fn test_unsupported_schemes_dropped() {
        let locators = parse_list_unsubscribe("<ftp://example.com/x>, <tel:+15551234>");
        assert!(locators.is_empty());
    }

    #[test]
    fn test_empty_and_junk_input() {
        assert!(parse_list_unsubscribe("").is_empty());
        assert!(parse_list_unsubscribe("   ").is_empty());
        assert!(parse_list_unsubscribe("no uris here").is_empty());
    }

    #[test]
    fn test_mailto_scheme_case_insensitive() {
        let locators = parse_list_unsubscribe("<MAILTO:unsub@example.com>");
        assert_eq!(locators.len(), 1);
        assert_eq!(locators[0].kind, LocatorKind::Mailto);
        assert_eq!(locators[0].value, "unsub@example.com");
    }
}
