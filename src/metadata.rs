//! Uniform view over every embedded-metadata format
//!
//! Raw extractor output differs per format. [`normalize`] reshapes it so each
//! format is a list of JSON objects keyed with JSON-LD style `@` fields.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::config::ExtractorConfig;
use crate::extractors::{extract_all, RawMetadata, Record, Syntax};
use crate::fetch::{Fetcher, Transport, UreqTransport};

/// Normalized records per format
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataBundle {
    #[serde(rename = "json-ld")]
    pub json_ld: Vec<Value>,
    pub opengraph: Vec<Record>,
    pub rdfa: Vec<Record>,
    pub microdata: Vec<Record>,
}

impl MetadataBundle {
    pub fn is_empty(&self) -> bool {
        self.json_ld.is_empty()
            && self.opengraph.is_empty()
            && self.rdfa.is_empty()
            && self.microdata.is_empty()
    }

    pub fn count(&self, syntax: Syntax) -> usize {
        match syntax {
            Syntax::JsonLd => self.json_ld.len(),
            Syntax::OpenGraph => self.opengraph.len(),
            Syntax::Rdfa => self.rdfa.len(),
            Syntax::Microdata => self.microdata.len(),
        }
    }
}

/// Reshape raw extractor output. Empty records are dropped for every format.
pub fn normalize(raw: RawMetadata) -> MetadataBundle {
    MetadataBundle {
        json_ld: raw.json_ld.into_iter().filter(|v| !is_falsy(v)).collect(),
        opengraph: raw
            .opengraph
            .into_iter()
            .filter(|r| !r.is_empty())
            .map(normalize_opengraph)
            .collect(),
        rdfa: raw
            .rdfa
            .into_iter()
            .filter(|r| !r.is_empty())
            .map(normalize_rdfa)
            .collect(),
        microdata: raw
            .microdata
            .into_iter()
            .filter(|r| !r.is_empty())
            .map(normalize_microdata)
            .collect(),
    }
}

/// `{"@context", "@type", ...rest}`
fn normalize_opengraph(item: Record) -> Record {
    let mut normalized = Record::new();
    normalized.insert(
        "@context".to_string(),
        item.get("@context")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    );
    normalized.insert(
        "@type".to_string(),
        item.get("@type").cloned().unwrap_or(Value::Null),
    );
    normalized.extend(
        item.into_iter()
            .filter(|(key, _)| key != "@context" && key != "@type"),
    );
    normalized
}

/// `{"@id", ...rest}`
fn normalize_rdfa(item: Record) -> Record {
    let mut normalized = Record::new();
    normalized.insert(
        "@id".to_string(),
        item.get("@id").cloned().unwrap_or(Value::Null),
    );
    normalized.extend(item.into_iter().filter(|(key, _)| key != "@id"));
    normalized
}

/// `{"@type": type, "@properties": properties}`; any other field is dropped
fn normalize_microdata(item: Record) -> Record {
    let mut normalized = Record::new();
    normalized.insert(
        "@type".to_string(),
        item.get("type").cloned().unwrap_or(Value::Null),
    );
    normalized.insert(
        "@properties".to_string(),
        item.get("properties")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    );
    normalized
}

/// Null, false, zero and empty strings/arrays/objects
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(obj) => obj.is_empty(),
    }
}

/// Extract and normalize every format from an HTML string.
pub fn extract_from_html(html: &str, base_url: &Url) -> MetadataBundle {
    normalize(extract_all(html, base_url, &Syntax::ALL))
}

/// Fetches pages and returns their normalized metadata
#[derive(Debug, Clone)]
pub struct MetadataExtractor<T = UreqTransport> {
    fetcher: Fetcher<T>,
    syntaxes: Vec<Syntax>,
}

impl MetadataExtractor<UreqTransport> {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self::with_fetcher(Fetcher::new(config), config.syntaxes.clone())
    }
}

impl<T: Transport> MetadataExtractor<T> {
    pub fn with_fetcher(fetcher: Fetcher<T>, syntaxes: Vec<Syntax>) -> Self {
        Self { fetcher, syntaxes }
    }

    /// Fetch `url` and extract its metadata.
    ///
    /// A page no profile could fetch yields an empty bundle, not an error:
    /// downstream it simply contains no recipe.
    pub fn extract_from_url(&self, url: &str) -> MetadataBundle {
        let fetched = self
            .fetcher
            .fetch_with(url, |page| Ok(self.extract_from_html(&page.html, &page.base_url)));

        match fetched {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!(url, error = %err, "no metadata extracted");
                MetadataBundle::default()
            }
        }
    }

    pub fn extract_from_html(&self, html: &str, base_url: &Url) -> MetadataBundle {
        let bundle = normalize(extract_all(html, base_url, &self.syntaxes));
        debug!(
            base_url = %base_url,
            json_ld = bundle.json_ld.len(),
            opengraph = bundle.opengraph.len(),
            rdfa = bundle.rdfa.len(),
            microdata = bundle.microdata.len(),
            "extracted metadata"
        );
        bundle
    }
}
