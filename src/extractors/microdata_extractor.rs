//! Microdata (schema.org HTML attributes) extraction
//!
//! Extracts microdata from itemscope/itemprop/itemtype attributes.
//! Reference: https://html.spec.whatwg.org/multipage/microdata.html

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

use super::Record;

/// Nested items deeper than this are read as plain text values
const MAX_ITEM_DEPTH: usize = 32;

/// Extract top-level microdata items as `{type, id?, properties}` records
pub fn extract_microdata(document: &Html, base_url: &Url) -> Vec<Record> {
    let selector = match Selector::parse("[itemscope]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        // Items that are themselves a property value are reached via their owner
        .filter(|element| element.value().attr("itemprop").is_none())
        .map(|element| extract_item(&element, base_url, 0))
        .collect()
}

fn extract_item(element: &ElementRef, base_url: &Url, depth: usize) -> Record {
    let mut item = Record::new();

    if let Some(itemtype) = element.value().attr("itemtype") {
        let types: Vec<Value> = itemtype
            .split_whitespace()
            .map(|t| Value::String(t.to_string()))
            .collect();
        match types.len() {
            0 => {}
            1 => {
                item.insert("type".to_string(), types.into_iter().next().unwrap_or_default());
            }
            _ => {
                item.insert("type".to_string(), Value::Array(types));
            }
        }
    }

    if let Some(itemid) = element.value().attr("itemid") {
        item.insert("id".to_string(), Value::String(resolve(base_url, itemid)));
    }

    let mut properties = Map::new();
    collect_properties(element, base_url, depth, &mut properties);
    item.insert("properties".to_string(), Value::Object(properties));

    item
}

/// Walk descendants in document order, stopping at nested item scopes: their
/// properties belong to the nested item, not to this one.
fn collect_properties(
    scope: &ElementRef,
    base_url: &Url,
    depth: usize,
    properties: &mut Map<String, Value>,
) {
    let mut pending: Vec<ElementRef> = scope.children().rev().filter_map(ElementRef::wrap).collect();

    while let Some(element) = pending.pop() {
        if let Some(names) = element.value().attr("itemprop") {
            let value = property_value(&element, base_url, depth);
            for name in names.split_whitespace() {
                insert_value(properties, name, value.clone());
            }
        }

        if element.value().attr("itemscope").is_none() {
            pending.extend(element.children().rev().filter_map(ElementRef::wrap));
        }
    }
}

fn property_value(element: &ElementRef, base_url: &Url, depth: usize) -> Value {
    let el = element.value();
    if el.attr("itemscope").is_some() && depth < MAX_ITEM_DEPTH {
        return Value::Object(extract_item(element, base_url, depth + 1));
    }

    // Scalar value - depends on element type
    let value = match el.name() {
        "meta" => el.attr("content").unwrap_or("").to_string(),
        "link" | "a" | "area" => el.attr("href").map(|h| resolve(base_url, h)).unwrap_or_default(),
        "img" | "audio" | "video" | "source" | "iframe" | "embed" | "track" => {
            el.attr("src").map(|s| resolve(base_url, s)).unwrap_or_default()
        }
        "object" => el.attr("data").map(|d| resolve(base_url, d)).unwrap_or_default(),
        "time" => el
            .attr("datetime")
            .map(|s| s.to_string())
            .unwrap_or_else(|| element.text().collect::<String>()),
        "data" | "meter" => el.attr("value").unwrap_or("").to_string(),
        _ => element.text().collect::<String>(),
    };

    Value::String(value.trim().to_string())
}

fn resolve(base_url: &Url, reference: &str) -> String {
    base_url
        .join(reference.trim())
        .map(String::from)
        .unwrap_or_else(|_| reference.trim().to_string())
}

fn insert_value(map: &mut Map<String, Value>, key: &str, value: Value) {
    // Handle multiple values for same property
    match map.get_mut(key) {
        Some(Value::Array(arr)) => arr.push(value),
        Some(existing) => {
            let old = existing.take();
            *existing = Value::Array(vec![old, value]);
        }
        None => {
            map.insert(key.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<Record> {
        let base = Url::parse("https://example.com/recipes/pie").unwrap();
        extract_microdata(&Html::parse_document(html), &base)
    }

    #[test]
    fn test_extract_simple_microdata() {
        let html = r#"
        <div itemscope itemtype="https://schema.org/Recipe">
            <span itemprop="name">Apple Pie</span>
            <meta itemprop="totalTime" content="PT1H">
            <img itemprop="image" src="/img/pie.jpg">
            <span itemprop="recipeIngredient">3 apples</span>
            <span itemprop="recipeIngredient">1 crust</span>
        </div>
        "#;

        let result = extract(html);
        assert_eq!(result.len(), 1);
        let item = &result[0];
        assert_eq!(item["type"], "https://schema.org/Recipe");

        let props = &item["properties"];
        assert_eq!(props["name"], "Apple Pie");
        assert_eq!(props["totalTime"], "PT1H");
        assert_eq!(props["image"], "https://example.com/img/pie.jpg");
        assert_eq!(
            props["recipeIngredient"],
            serde_json::json!(["3 apples", "1 crust"])
        );
    }

    #[test]
    fn test_nested_microdata() {
        let html = r##"
        <div itemscope itemtype="https://schema.org/Recipe" itemid="#recipe">
            <span itemprop="name">Pie</span>
            <div itemprop="author" itemscope itemtype="https://schema.org/Person">
                <span itemprop="name">Jane Doe</span>
            </div>
        </div>
        "##;

        let result = extract(html);
        assert_eq!(result.len(), 1);
        let item = &result[0];
        assert_eq!(item["id"], "https://example.com/recipes/pie#recipe");
        assert_eq!(item["properties"]["name"], "Pie");

        let author = &item["properties"]["author"];
        assert_eq!(author["type"], "https://schema.org/Person");
        assert_eq!(author["properties"]["name"], "Jane Doe");
    }

    #[test]
    fn test_multiple_types_and_names() {
        let html = r#"
        <div itemscope itemtype="https://schema.org/Recipe https://schema.org/HowTo">
            <h1 itemprop="name headline">Soup</h1>
        </div>
        <div itemscope itemtype="https://schema.org/Person"></div>
        "#;

        let result = extract(html);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["type"].as_array().unwrap().len(), 2);
        assert_eq!(result[0]["properties"]["name"], "Soup");
        assert_eq!(result[0]["properties"]["headline"], "Soup");
        assert_eq!(result[1]["properties"], serde_json::json!({}));
    }

    #[test]
    fn test_deeply_nested_document() {
        let depth = 50_000;
        let html = format!(
            r#"<div itemscope itemtype="https://schema.org/Recipe">{}<span itemprop="name">Deep Pie</span>{}</div>"#,
            "<span>".repeat(depth),
            "</span>".repeat(depth)
        );

        let result = extract(&html);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["properties"]["name"], "Deep Pie");
    }

    #[test]
    fn test_nested_items_beyond_limit_become_text() {
        let levels = MAX_ITEM_DEPTH + 2;
        let mut html = String::from(r#"<div itemscope itemtype="https://schema.org/Thing">"#);
        for _ in 0..levels {
            html.push_str(r#"<div itemprop="part" itemscope itemtype="https://schema.org/Thing">"#);
        }
        html.push_str("leaf");
        html.push_str(&"</div>".repeat(levels + 1));

        let result = extract(&html);
        assert_eq!(result.len(), 1);

        let mut value = &result[0]["properties"]["part"];
        for _ in 0..MAX_ITEM_DEPTH {
            assert!(value.is_object());
            value = &value["properties"]["part"];
        }
        assert_eq!(value, "leaf");
    }
}
