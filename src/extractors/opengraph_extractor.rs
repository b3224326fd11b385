//! OpenGraph meta tags extraction
//!
//! Extracts `og:` prefixed meta tags (plus `article:`, `product:` and any
//! prefix declared on `<html>`/`<head>`) into a single JSON-LD-like record.

use scraper::{Html, Selector};
use serde_json::{Map, Value};

use super::Record;

/// Namespaces recognised without a `prefix` declaration
const DEFAULT_NAMESPACES: &[(&str, &str)] = &[
    ("og", "http://ogp.me/ns#"),
    ("article", "http://ogp.me/ns/article#"),
    ("product", "http://ogp.me/ns/product#"),
];

/// Extract OpenGraph properties; returns one record, or none if the page has
/// no recognised properties.
pub fn extract_opengraph(document: &Html) -> Vec<Record> {
    let namespaces = collect_namespaces(document);

    let selector = match Selector::parse("meta[property]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut properties: Map<String, Value> = Map::new();
    let mut context: Map<String, Value> = Map::new();

    for element in document.select(&selector) {
        let property = element.value().attr("property").unwrap_or("").trim();
        let content = element.value().attr("content").unwrap_or("");

        if content.is_empty() {
            continue;
        }

        let Some((prefix, _)) = property.split_once(':') else {
            continue;
        };
        let Some((_, namespace)) = namespaces.iter().find(|(p, _)| p == prefix) else {
            continue;
        };

        if !context.contains_key(prefix) {
            context.insert(prefix.to_string(), Value::String(namespace.clone()));
        }
        insert_value(&mut properties, property, content);
    }

    if properties.is_empty() {
        return Vec::new();
    }

    let mut record = Record::new();
    record.insert("@context".to_string(), Value::Object(context));
    if let Some(og_type) = properties.get("og:type") {
        record.insert("@type".to_string(), og_type.clone());
    }
    record.extend(properties.into_iter().filter(|(key, _)| key != "og:type"));

    vec![record]
}

/// Defaults plus RDFa-style `prefix="og: http://ogp.me/ns# fb: ..."`
/// declarations. Declared prefixes override defaults.
fn collect_namespaces(document: &Html) -> Vec<(String, String)> {
    let mut namespaces: Vec<(String, String)> = DEFAULT_NAMESPACES
        .iter()
        .map(|(p, ns)| (p.to_string(), ns.to_string()))
        .collect();

    let selector = match Selector::parse("html[prefix], head[prefix]") {
        Ok(s) => s,
        Err(_) => return namespaces,
    };

    for element in document.select(&selector) {
        let declared = element.value().attr("prefix").unwrap_or("");
        for (prefix, iri) in parse_prefix_attr(declared) {
            namespaces.retain(|(p, _)| *p != prefix);
            namespaces.push((prefix, iri));
        }
    }

    namespaces
}

/// Parse an RDFa `prefix` attribute into `(prefix, iri)` pairs.
pub(crate) fn parse_prefix_attr(attr: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut tokens = attr.split_whitespace();

    while let Some(token) = tokens.next() {
        let Some(prefix) = token.strip_suffix(':') else {
            continue;
        };
        if let Some(iri) = tokens.next() {
            pairs.push((prefix.to_ascii_lowercase(), iri.to_string()));
        }
    }

    pairs
}

fn insert_value(map: &mut Map<String, Value>, key: &str, value: &str) {
    // Handle arrays (multiple values for same key, e.g., og:image)
    match map.get_mut(key) {
        Some(Value::Array(arr)) => arr.push(Value::String(value.to_string())),
        Some(existing) => {
            let old = existing.take();
            *existing = Value::Array(vec![old, Value::String(value.to_string())]);
        }
        None => {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<Record> {
        extract_opengraph(&Html::parse_document(html))
    }

    #[test]
    fn test_extract_opengraph() {
        let html = r#"
        <html>
        <head>
            <meta property="og:title" content="Best Cheesecake">
            <meta property="og:type" content="article">
            <meta property="og:image" content="https://example.com/1.jpg">
            <meta property="og:image" content="https://example.com/2.jpg">
            <meta property="article:author" content="Jane Doe">
            <meta name="twitter:card" content="summary_large_image">
        </head>
        </html>
        "#;

        let result = extract(html);
        assert_eq!(result.len(), 1);
        let record = &result[0];

        assert_eq!(record["@type"], "article");
        assert_eq!(record["og:title"], "Best Cheesecake");
        assert_eq!(record["og:image"].as_array().unwrap().len(), 2);
        assert_eq!(record["article:author"], "Jane Doe");
        assert_eq!(record["@context"]["og"], "http://ogp.me/ns#");
        assert!(record.get("twitter:card").is_none());
        assert!(record.get("og:type").is_none());
    }

    #[test]
    fn test_declared_prefix() {
        let html = r#"
        <html prefix="fb: http://ogp.me/ns/fb#">
        <head>
            <meta property="fb:app_id" content="1234">
            <meta property="unknown:thing" content="skip">
        </head>
        </html>
        "#;

        let result = extract(html);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["fb:app_id"], "1234");
        assert_eq!(result[0]["@context"]["fb"], "http://ogp.me/ns/fb#");
        assert!(result[0].get("@type").is_none());
        assert!(result[0].get("unknown:thing").is_none());
    }

    #[test]
    fn test_no_opengraph() {
        let html = r#"<html><head><meta name="description" content="x"></head></html>"#;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn test_parse_prefix_attr() {
        let pairs = parse_prefix_attr("og: http://ogp.me/ns#  Schema: http://schema.org/ dangling:");
        assert_eq!(
            pairs,
            vec![
                ("og".to_string(), "http://ogp.me/ns#".to_string()),
                ("schema".to_string(), "http://schema.org/".to_string()),
            ]
        );
    }
}
