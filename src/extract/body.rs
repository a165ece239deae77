//! Body-based unsubscribe link discovery.
//!
//! Three layers, in decreasing order of fidelity:
//!   1. DOM scan of the HTML body, matching anchor hrefs and link text.
//!   2. Regex over raw markup, for HTML too broken to parse.
//!   3. Regex over plain text, for keyword-bearing bare URLs.
//!
//! All layers share one keyword set and one cleanup pass. Candidates that
//! fail structural validation are dropped at the source.

use crate::core::models::{Locator, LocatorOrigin};
use crate::extract::decode::decode_html_entities;
use crate::extract::validate::validate_url;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};

/// Keywords that mark a link as unsubscribe-related. Matched
/// case-insensitively against both the href and the anchor text.
pub const UNSUBSCRIBE_KEYWORDS: [&str; 6] = [
    "unsubscribe",
    "unsub",
    "opt-out",
    "optout",
    "remove",
    "preferences",
];

lazy_static! {
    static ref MARKUP_HREF: Regex = Regex::new(
        r#"(?i)href\s*=\s*["']([^"']*(?:unsub|opt[-.]?out|optout|remove|preference)[^"']*)["']"#
    )
    .unwrap();
    static ref TEXT_URL: Regex = Regex::new(
        r#"(?i)(https?://[^\s<>"]*(?:unsub|opt[-.]?out|optout|remove|preference)[^\s<>"]*)"#
    )
    .unwrap();
}

fn contains_keyword(haystack: &str) -> bool {
    let lower = haystack.to_ascii_lowercase();
    UNSUBSCRIBE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Normalizes a raw candidate: entity decode, trim, strip trailing
/// punctuation picked up from surrounding prose, then delete any interior
/// whitespace (folded markup splits URLs mid-token).
fn clean_candidate(raw: &str) -> String {
    let decoded = decode_html_entities(raw);
    let trimmed = decoded
        .trim()
        .trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
    trimmed.chars().filter(|c| !c.is_whitespace()).collect()
}

fn push_valid(out: &mut Vec<String>, raw: &str) {
    let cleaned = clean_candidate(raw);
    if !cleaned.is_empty() && validate_url(&cleaned) && !out.iter().any(|c| c == &cleaned) {
        out.push(cleaned);
    }
}

/// DOM scan: every `<a href>` whose href or visible text carries a keyword.
pub fn scan_html_dom(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("static selector");

    let mut found = Vec::new();
    for element in document.select(&anchors) {
        let href = match element.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        if !href.starts_with("http://") && !href.starts_with("https://") {
            continue;
        }
        let text: String = element.text().collect();
        if contains_keyword(href) || contains_keyword(&text) {
            push_valid(&mut found, href);
        }
    }
    found
}

/// Raw-markup scan: href attributes with keyword-bearing values, found by
/// regex. Catches documents the DOM parser mangles.
pub fn scan_markup_patterns(markup: &str) -> Vec<String> {
    let mut found = Vec::new();
    for caps in MARKUP_HREF.captures_iter(markup) {
        push_valid(&mut found, &caps[1]);
    }
    found
}

/// Plain-text scan: bare keyword-bearing URLs.
pub fn scan_text(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for caps in TEXT_URL.captures_iter(text) {
        push_valid(&mut found, &caps[1]);
    }
    found
}

/// Layered extraction that stops at the first layer producing candidates.
/// The markup layer runs against the HTML body when present, otherwise the
/// text body (newsletters often ship HTML inside `text/plain` parts).
pub fn extract_first(html_body: Option<&str>, text_body: Option<&str>) -> Vec<Locator> {
    if let Some(html) = html_body {
        let dom = scan_html_dom(html);
        if !dom.is_empty() {
            return to_locators(dom, LocatorOrigin::BodyMarkup);
        }
    }
    let markup_source = html_body.or(text_body);
    if let Some(markup) = markup_source {
        let hrefs = scan_markup_patterns(markup);
        if !hrefs.is_empty() {
            return to_locators(hrefs, LocatorOrigin::BodyMarkup);
        }
    }
    if let Some(text) = text_body {
        let urls = scan_text(text);
        if !urls.is_empty() {
            return to_locators(urls, LocatorOrigin::BodyText);
        }
    }
    Vec::new()
}

/// Union of all three layers, DOM first, markup second, text last, with
/// duplicates removed while preserving first-seen order.
pub fn extract_all(html_body: Option<&str>, text_body: Option<&str>) -> Vec<Locator> {
    let mut locators: Vec<Locator> = Vec::new();
    let mut push = |value: String, origin: LocatorOrigin| {
        if !locators.iter().any(|l| l.value == value) {
            locators.push(Locator::url(&value, origin));
        }
    };

    if let Some(html) = html_body {
        for url in scan_html_dom(html) {
            push(url, LocatorOrigin::BodyMarkup);
        }
    }
    if let Some(markup) = html_body.or(text_body) {
        for url in scan_markup_patterns(markup) {
            push(url, LocatorOrigin::BodyMarkup);
        }
    }
    if let Some(text) = text_body {
        for url in scan_text(text) {
            push(url, LocatorOrigin::BodyText);
        }
    }
    locators
}

fn to_locators(urls: Vec<String>, origin: LocatorOrigin) -> Vec<Locator> {
    urls.into_iter().map(|u| Locator::url(&u, origin)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_scan_matches_href_keyword() {
        let html = r#"<html><body>
            <a href="https://example.com/unsub?id=1">click</a>
            <a href="https://example.com/buy">shop</a>
        </body></html>"#;
        let found = scan_html_dom(html);
        assert_eq!(found, vec!["https://example.com/unsub?id=1"]);
    }

    #[test]
    fn test_dom_scan_matches_anchor_text_keyword() {
        // The href itself carries no keyword; the link text does.
        let html = r#"<a href="https://l.example.com/c/abc123">Unsubscribe here</a>"#;
        let found = scan_html_dom(html);
        assert_eq!(found, vec!["https://l.example.com/c/abc123"]);
    }

    #[test]
    fn test_dom_scan_skips_mailto_and_relative() {
        let html = r#"
            <a href="mailto:unsub@example.com">Unsubscribe</a>
            <a href="/unsubscribe">Unsubscribe</a>
        "#;
        assert!(scan_html_dom(html).is_empty());
    }

    #[test]
    fn test_embedded_space_inside_href_is_removed() {
        let html = r#"<a href="https://y.com/unsub?x=1 ">Unsubscribe</a>"#;
        let found = scan_html_dom(html);
        assert_eq!(found, vec!["https://y.com/unsub?x=1"]);
    }

    #[test]
    fn test_markup_scan_on_broken_html() {
        let markup = r#"<td><a href="https://x.com/optout/tok">bye</a></td"#;
        let found = scan_markup_patterns(markup);
        assert_eq!(found, vec!["https://x.com/optout/tok"]);
    }

    #[test]
    fn test_markup_scan_decodes_entities() {
        let markup = r#"href="https://x.com/unsub?a=1&amp;b=2""#;
        let found = scan_markup_patterns(markup);
        assert_eq!(found, vec!["https://x.com/unsub?a=1&b=2"]);
    }

    #[test]
    fn test_text_scan_strips_trailing_punctuation() {
        let text = "To stop these mails visit https://example.com/unsubscribe/tok9. Thanks!";
        let found = scan_text(text);
        assert_eq!(found, vec!["https://example.com/unsubscribe/tok9"]);
    }

    #[test]
    fn test_text_scan_ignores_urls_without_keywords() {
        let text = "See https://example.com/catalog for more.";
        assert!(scan_text(text).is_empty());
    }

    #[test]
    fn test_extract_first_stops_at_dom_layer() {
        let html = r#"<a href="https://a.com/unsub">Unsubscribe</a>"#;
        let text = "also https://b.com/unsubscribe";
        let locators = extract_first(Some(html), Some(text));
        assert_eq!(locators.len(), 1);
        assert_eq!(locators[0].value, "https://a.com/unsub");
        assert_eq!(locators[0].origin, LocatorOrigin::BodyMarkup);
    }

    #[test]
    fn test_extract_first_falls_back_to_text() {
        let locators = extract_first(None, Some("visit https://b.com/unsubscribe now"));
        assert_eq!(locators.len(), 1);
        assert_eq!(locators[0].origin, LocatorOrigin::BodyText);
    }

    #[test]
    fn test_extract_first_markup_layer_reads_text_body() {
        // HTML shipped inside a text/plain part.
        let text = r#"<a href="https://c.com/optout">x</a>"#;
        let locators = extract_first(None, Some(text));
        assert_eq!(locators.len(), 1);
        assert_eq!(locators[0].value, "https://c.com/optout");
        assert_eq!(locators[0].origin, LocatorOrigin::BodyMarkup);
    }

    #[test]
    fn test_extract_all_dedupes_across_layers() {
        let html = r#"<a href="https://a.com/unsub">Unsubscribe</a>"#;
        let text = "https://a.com/unsub and https://b.com/unsubscribe";
        let locators = extract_all(Some(html), Some(text));
        let values: Vec<&str> = locators.iter().map(|l| l.value.as_str()).collect();
        assert_eq!(values, vec!["https://a.com/unsub", "https://b.com/unsubscribe"]);
        assert_eq!(locators[0].origin, LocatorOrigin::BodyMarkup);
        assert_eq!(locators[1].origin, LocatorOrigin::BodyText);
    }

    #[test]
    fn test_invalid_candidates_rejected() {
        // Trailing '=' is a quoted-printable artifact.
        let text = "https://a.com/unsub?id=";
        assert!(scan_text(text).is_empty());
    }
}
