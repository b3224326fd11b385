//! Response body decoding
//!
//! The charset comes from the `Content-Type` header, then from a `<meta>`
//! declaration near the top of the document, and defaults to UTF-8.
//! Undecodable bytes become U+FFFD.

use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;
use tracing::debug;

/// Bytes searched for a `<meta>` charset declaration
const META_SCAN_LIMIT: usize = 1024;

/// `<meta charset="...">` and the `http-equiv="Content-Type"` form
static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)<meta\s[^>]*charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#)
        .expect("Invalid meta charset regex")
});

/// Decode a response body to UTF-8.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_meta(bytes))
        .unwrap_or(UTF_8);

    // A byte-order mark overrides the declared encoding
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(encoding = used.name(), "replaced undecodable bytes");
    }
    text.into_owned()
}

/// `text/html; charset=iso-8859-1` -> windows-1252
fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let label = value.trim().trim_matches(|c| c == '"' || c == '\'');
        Encoding::for_label(label.as_bytes())
    })
}

fn charset_from_meta(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_SCAN_LIMIT)];
    let label = META_CHARSET_RE.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}
