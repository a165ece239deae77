//! Unsubscribe locator extraction: decoding, header parsing, body scanning,
//! and candidate validation.

pub mod body;
pub mod decode;
pub mod header;
pub mod validate;

pub use body::{extract_all, extract_first};
pub use header::parse_list_unsubscribe;
pub use validate::{validate_url, Prober};
