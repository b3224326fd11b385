//! JSON-LD extraction from HTML
//!
//! Extracts JSON-LD data from <script type="application/ld+json"> tags.
//! Blocks are returned as parsed; `@graph` containers are left intact.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::warn;

const JSONLD_MIME: &str = "application/ld+json";

/// Extract every JSON-LD item in document order
pub fn extract_jsonld(document: &Html) -> Vec<Value> {
    let selector = match Selector::parse("script[type]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut items = Vec::new();

    for element in document.select(&selector) {
        let is_jsonld = element
            .value()
            .attr("type")
            .and_then(|t| t.split(';').next())
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(JSONLD_MIME));
        if !is_jsonld {
            continue;
        }

        let content: String = element.text().collect();
        match parse_block(&content) {
            // A block holding an array contributes each element
            Some(Value::Array(arr)) => items.extend(arr),
            Some(value) => items.push(value),
            None => {}
        }
    }

    items
}

fn parse_block(content: &str) -> Option<Value> {
    let trimmed = strip_wrappers(content.trim());
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Some(value),
        Err(err) => match serde_json::from_str::<Value>(&escape_control_chars(trimmed)) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(error = %err, "skipping malformed JSON-LD block");
                None
            }
        },
    }
}

/// Remove HTML comment and CDATA wrappers some CMSes emit around the JSON.
fn strip_wrappers(content: &str) -> &str {
    let mut s = content;
    for (open, close) in [("<!--", "-->"), ("//<![CDATA[", "//]]>"), ("<![CDATA[", "]]>")] {
        if let Some(inner) = s.strip_prefix(open).and_then(|r| r.strip_suffix(close)) {
            s = inner.trim();
        }
    }
    s
}

/// Escape raw newlines/tabs inside string literals and drop other control
/// characters there. Sites paste multi-line descriptions straight into JSON.
fn escape_control_chars(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            result.push(c);
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                result.push(c);
            }
            '"' => {
                in_string = false;
                result.push(c);
            }
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {}
            _ => result.push(c),
        }
    }

    result
}
