//! Pure, stateless decoding helpers used before any pattern matching:
//! RFC 2047 encoded words in headers, base64 / quoted-printable content
//! transfer encodings in bodies, and HTML character references.
//!
//! Every function here degrades instead of failing: undecodable input comes
//! back unchanged (or with replacement characters), never as an error.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"=\?([!->@-~]+)\?([bBqQ])\?([!->@-~]*)\?=").unwrap();
    static ref NUMERIC_ENTITY: Regex = Regex::new(r"&#(x?[0-9a-fA-F]{1,8});").unwrap();
}

/// Decodes RFC 2047 encoded words (`=?charset?B|Q?payload?=`) anywhere in a
/// header value. Whitespace between two adjacent encoded words is dropped,
/// as the RFC requires; all other text passes through untouched. A word that
/// fails to decode is left in its raw form.
pub fn decode_mime_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_end = 0;
    let mut prev_was_word = false;

    for caps in ENCODED_WORD.captures_iter(value) {
        let whole = caps.get(0).unwrap();
        let between = &value[last_end..whole.start()];

        match decode_encoded_word(&caps[1], &caps[2], &caps[3]) {
            Some(decoded) => {
                if !(prev_was_word && between.chars().all(char::is_whitespace)) {
                    out.push_str(between);
                }
                out.push_str(&decoded);
                prev_was_word = true;
            }
            None => {
                out.push_str(between);
                out.push_str(whole.as_str());
                prev_was_word = false;
            }
        }
        last_end = whole.end();
    }
    out.push_str(&value[last_end..]);
    out
}

fn decode_encoded_word(charset: &str, transfer: &str, payload: &str) -> Option<String> {
    let bytes = match transfer {
        "b" | "B" => STANDARD.decode(payload).ok()?,
        "q" | "Q" => q_decode(payload),
        _ => return None,
    };
    let encoding = Encoding::for_label_no_replacement(charset.as_bytes())?;
    Some(encoding.decode_with_bom_removal(&bytes).0.into_owned())
}

/// Q-encoding decode: `_` is a literal space regardless of charset, `=HH` is
/// a raw byte, malformed escapes stay literal.
fn q_decode(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                match hex_pair(&bytes[i + 1..]) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

fn hex_pair(bytes: &[u8]) -> Option<u8> {
    if bytes.len() < 2 {
        return None;
    }
    let hi = (bytes[0] as char).to_digit(16)?;
    let lo = (bytes[1] as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Decodes quoted-printable body content: soft line breaks removed, `=HH`
/// sequences turned into bytes, anything malformed kept literal. The result
/// is interpreted as UTF-8 with replacement of invalid sequences.
pub fn decode_quoted_printable(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            // Soft line break: '=' immediately followed by CRLF or LF.
            if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') {
                i += 3;
                continue;
            }
            if bytes.get(i + 1) == Some(&b'\n') {
                i += 2;
                continue;
            }
            if let Some(byte) = hex_pair(&bytes[i + 1..]) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Decodes a base64 body, accepting both the standard and the URL-safe
/// alphabet (mail APIs commonly hand out the latter). Whitespace and
/// padding inconsistencies are tolerated. Returns `None` only when the
/// payload is not base64 at all.
pub fn decode_base64_body(data: &str) -> Option<String> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .or_else(|_| URL_SAFE_NO_PAD.decode(cleaned.trim_end_matches('=').as_bytes()))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Normalizes a body that may still carry its content transfer encoding.
///
/// Exports are inconsistent about this: some bodies arrive decoded, some as
/// raw base64 (API dumps), some with quoted-printable escapes intact. A
/// body that decodes cleanly as base64 is taken as base64; otherwise
/// quoted-printable markers trigger a QP pass; otherwise the text is
/// returned as-is.
pub fn decode_body(raw: &str) -> String {
    if let Some(decoded) = try_base64_body(raw) {
        return decoded;
    }
    if raw.contains("=3D") || raw.contains("=\r\n") || raw.contains("=\n") {
        return decode_quoted_printable(raw);
    }
    raw.to_string()
}

fn try_base64_body(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    // Base64 bodies are line-wrapped base64 and nothing else; any other
    // character (spaces included) means this is already text.
    if trimmed.len() < 16
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '-' | '_' | '=' | '\r' | '\n'))
    {
        return None;
    }
    let decoded = decode_base64_body(trimmed)?;
    // Reject decodes that come out as binary noise.
    let printable = decoded
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .count();
    (printable * 10 >= decoded.chars().count() * 9).then_some(decoded)
}

/// Resolves HTML character references: the five predefined named entities
/// plus decimal and hexadecimal numeric references. Unknown references are
/// left untouched.
pub fn decode_html_entities(text: &str) -> String {
    let mut out = NUMERIC_ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let body = &caps[1];
            let parsed = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X'))
            {
                u32::from_str_radix(hex, 16)
            } else {
                body.parse::<u32>()
            };
            parsed
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();

    for (entity, replacement) in [
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&amp;", "&"),
    ] {
        if out.contains(entity) {
            out = out.replace(entity, replacement);
        }
    }
    out
}
