//! Recipe location and normalization
//!
//! Finds the first schema.org `Recipe` node among JSON-LD records and maps
//! its loosely-typed fields onto [`Recipe`]. Follows the schema.org Recipe
//! vocabulary: <https://schema.org/Recipe>.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

use crate::config::ExtractorConfig;
use crate::fetch::{Transport, UreqTransport};
use crate::metadata::{is_falsy, MetadataExtractor};
use crate::text::TextCleaner;

pub const RECIPE_TYPE: &str = "Recipe";

/// Identifies this pipeline as the producer of a record
pub const SOURCE_TAG: &str = "recipe-extractor";

/// Canonical recipe record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub author: Option<String>,
    #[serde(rename = "recipeCategory")]
    pub category: Option<String>,
    #[serde(rename = "recipeCuisine")]
    pub cuisine: Option<String>,
    #[serde(rename = "recipeIngredient")]
    pub ingredients: Vec<String>,
    #[serde(rename = "recipeInstructions")]
    pub instructions: Vec<String>,
    pub keywords: String,
    pub source: String,
}

/// Depth-first, pre-order search for a node whose `@type` is `Recipe`.
///
/// Object values are visited in document order, then array elements by
/// index. The first match wins, so with several recipes in one graph the
/// result depends on how the page orders them.
pub fn find_recipe(value: &Value) -> Option<&Map<String, Value>> {
    if is_falsy(value) {
        return None;
    }

    match value {
        Value::Object(obj) => {
            if obj.get("@type").and_then(Value::as_str) == Some(RECIPE_TYPE) {
                return Some(obj);
            }
            obj.values().find_map(find_recipe)
        }
        Value::Array(arr) => arr.iter().find_map(find_recipe),
        _ => None,
    }
}

/// Locate and normalize the first recipe in `json_ld`.
///
/// `url` is the address originally requested; it fills in the recipe's `url`
/// when the record has none.
pub fn locate(json_ld: &[Value], url: &str, cleaner: &TextCleaner) -> Option<Recipe> {
    let record = json_ld.iter().find_map(find_recipe)?;

    let mut recipe = normalize_recipe(record, cleaner);
    if recipe.url.as_deref().map_or(true, str::is_empty) {
        recipe.url = Some(url.to_string());
    }
    Some(recipe)
}

/// Map a raw `Recipe` node onto [`Recipe`].
pub fn normalize_recipe(record: &Map<String, Value>, cleaner: &TextCleaner) -> Recipe {
    let clean = |key: &str| cleaner.clean(text_value(record.get(key)).as_deref());

    let name = clean("name");
    let category = clean("recipeCategory");
    let cuisine = clean("recipeCuisine");
    let keywords = keywords([&name, &category, &cuisine]);

    Recipe {
        description: clean("description"),
        url: record.get("url").and_then(Value::as_str).map(str::to_string),
        image: ImageField::from(record.get("image")).into_url(),
        author: cleaner.clean(AuthorField::from(record.get("author")).name()),
        ingredients: list_items(record.get("recipeIngredient"))
            .iter()
            .filter_map(|item| cleaner.clean(item.as_str()))
            .collect(),
        instructions: list_items(record.get("recipeInstructions"))
            .iter()
            .filter_map(|step| cleaner.clean(InstructionStep::from(*step).text()))
            .collect(),
        name,
        category,
        cuisine,
        keywords,
        source: SOURCE_TAG.to_string(),
    }
}

/// A string, or a list of strings joined with ", "
fn text_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

/// Elements of a list field; a lone value counts as a one-element list.
fn list_items(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().filter(|v| !is_falsy(v)).collect(),
        Some(v) if !is_falsy(v) => vec![v],
        _ => Vec::new(),
    }
}

/// Distinct non-empty values, first seen first, space-joined
fn keywords(values: [&Option<String>; 3]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for value in values.into_iter().flatten() {
        if !value.is_empty() && !seen.contains(&value.as_str()) {
            seen.push(value);
        }
    }
    seen.join(" ").trim().to_string()
}

/// `image` is a URL, a list of URLs or ImageObjects, or one ImageObject
#[derive(Debug, Clone, Copy, PartialEq)]
enum ImageField<'a> {
    Url(&'a str),
    List(&'a [Value]),
    Object(&'a Map<String, Value>),
    Missing,
}

impl<'a> From<Option<&'a Value>> for ImageField<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::String(s)) => ImageField::Url(s),
            Some(Value::Array(items)) if !items.is_empty() => ImageField::List(items),
            Some(Value::Object(obj)) => ImageField::Object(obj),
            _ => ImageField::Missing,
        }
    }
}

impl ImageField<'_> {
    fn into_url(self) -> Option<String> {
        let url = match self {
            ImageField::Url(url) => Some(url),
            ImageField::List(items) => match &items[0] {
                Value::String(url) => Some(url.as_str()),
                Value::Object(obj) => obj.get("url").and_then(Value::as_str),
                _ => None,
            },
            ImageField::Object(obj) => obj.get("url").and_then(Value::as_str),
            ImageField::Missing => None,
        };
        url.filter(|u| !u.is_empty()).map(str::to_string)
    }
}

/// `author` is a name or a Person/Organization object
#[derive(Debug, Clone, Copy, PartialEq)]
enum AuthorField<'a> {
    Name(&'a str),
    Object(&'a Map<String, Value>),
    Other,
}

impl<'a> From<Option<&'a Value>> for AuthorField<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::String(s)) => AuthorField::Name(s),
            Some(Value::Object(obj)) => AuthorField::Object(obj),
            _ => AuthorField::Other,
        }
    }
}

impl<'a> AuthorField<'a> {
    fn name(self) -> Option<&'a str> {
        match self {
            AuthorField::Name(name) => Some(name),
            AuthorField::Object(obj) => obj.get("name").and_then(Value::as_str),
            AuthorField::Other => None,
        }
    }
}

/// One `recipeInstructions` element: plain text or a HowToStep-like object
#[derive(Debug, Clone, Copy, PartialEq)]
enum InstructionStep<'a> {
    Text(&'a str),
    Object(&'a Map<String, Value>),
    Other,
}

impl<'a> From<&'a Value> for InstructionStep<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(s) => InstructionStep::Text(s),
            Value::Object(obj) => InstructionStep::Object(obj),
            _ => InstructionStep::Other,
        }
    }
}

impl<'a> InstructionStep<'a> {
    /// `text`, falling back to `name`
    fn text(self) -> Option<&'a str> {
        match self {
            InstructionStep::Text(text) => Some(text),
            InstructionStep::Object(obj) => obj
                .get("text")
                .and_then(Value::as_str)
                .or_else(|| obj.get("name").and_then(Value::as_str)),
            InstructionStep::Other => None,
        }
    }
}

/// Fetches a page and returns the recipe embedded in its JSON-LD
#[derive(Debug, Clone)]
pub struct RecipeExtractor<T = UreqTransport> {
    metadata: MetadataExtractor<T>,
    cleaner: TextCleaner,
}

impl RecipeExtractor<UreqTransport> {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self::with_metadata(MetadataExtractor::new(config), TextCleaner::new(config.charset))
    }
}

impl<T: Transport> RecipeExtractor<T> {
    pub fn with_metadata(metadata: MetadataExtractor<T>, cleaner: TextCleaner) -> Self {
        Self { metadata, cleaner }
    }

    pub fn metadata(&self) -> &MetadataExtractor<T> {
        &self.metadata
    }

    /// `None` when the page has no recipe or could not be fetched.
    pub fn extract_from_url(&self, url: &str) -> Option<Recipe> {
        let bundle = self.metadata.extract_from_url(url);
        self.locate(&bundle.json_ld, url)
    }

    /// Same as [`extract_from_url`](Self::extract_from_url) for HTML already
    /// in hand.
    pub fn extract_from_html(&self, html: &str, base_url: &Url, url: &str) -> Option<Recipe> {
        let bundle = self.metadata.extract_from_html(html, base_url);
        self.locate(&bundle.json_ld, url)
    }

    pub fn locate(&self, json_ld: &[Value], url: &str) -> Option<Recipe> {
        let recipe = locate(json_ld, url, &self.cleaner);
        match &recipe {
            Some(found) => info!(url, name = found.name.as_deref().unwrap_or(""), "found recipe"),
            None => debug!(url, records = json_ld.len(), "no recipe in JSON-LD"),
        }
        recipe
    }
}
