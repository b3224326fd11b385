//! Raw structured-data extractors
//!
//! Each module decodes one embedded-metadata format from a parsed document.
//! The shapes they return are the raw input of [`crate::metadata::normalize`].

mod jsonld_extractor;
mod microdata_extractor;
mod opengraph_extractor;
mod rdfa_extractor;

pub use jsonld_extractor::*;
pub use microdata_extractor::*;
pub use opengraph_extractor::*;
pub use rdfa_extractor::*;

use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// A single metadata record: a JSON object in document order.
pub type Record = Map<String, Value>;

/// Supported embedded-metadata formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Syntax {
    #[serde(rename = "json-ld")]
    JsonLd,
    #[serde(rename = "opengraph")]
    OpenGraph,
    #[serde(rename = "rdfa")]
    Rdfa,
    #[serde(rename = "microdata")]
    Microdata,
}

impl Syntax {
    pub const ALL: [Syntax; 4] = [
        Syntax::JsonLd,
        Syntax::OpenGraph,
        Syntax::Rdfa,
        Syntax::Microdata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Syntax::JsonLd => "json-ld",
            Syntax::OpenGraph => "opengraph",
            Syntax::Rdfa => "rdfa",
            Syntax::Microdata => "microdata",
        }
    }
}

/// Raw records per format, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    /// Parsed JSON-LD blocks; top-level arrays are flattened
    pub json_ld: Vec<Value>,
    /// At most one record per document
    pub opengraph: Vec<Record>,
    /// One record per subject
    pub rdfa: Vec<Record>,
    /// One record per top-level item, `{type, id?, properties}`
    pub microdata: Vec<Record>,
}

/// Run the requested extractors over one parse of `html`.
pub fn extract_all(html: &str, base_url: &Url, syntaxes: &[Syntax]) -> RawMetadata {
    let document = Html::parse_document(html);
    let mut raw = RawMetadata::default();

    for syntax in syntaxes {
        match syntax {
            Syntax::JsonLd => raw.json_ld = extract_jsonld(&document),
            Syntax::OpenGraph => raw.opengraph = extract_opengraph(&document),
            Syntax::Rdfa => raw.rdfa = extract_rdfa(&document, base_url),
            Syntax::Microdata => raw.microdata = extract_microdata(&document, base_url),
        }
    }

    raw
}
