//! Recipe extraction from embedded web-page metadata
//!
//! Fetches a page and pulls structured data out of it:
//! - JSON-LD (including `@graph` documents)
//! - OpenGraph meta tags
//! - RDFa
//! - Microdata (schema.org)
//!
//! then normalizes the first schema.org `Recipe` found in the JSON-LD.

pub mod config;
pub mod encoding;
pub mod error;
pub mod extractors;
pub mod fetch;
pub mod handler;
pub mod metadata;
pub mod recipe;
pub mod text;

pub use config::ExtractorConfig;
pub use error::{ConfigError, Error, FetchError, ParseError};
pub use extractors::{RawMetadata, Record, Syntax};
pub use fetch::{Fetcher, HeaderProfile, Page, RawResponse, Transport, UreqTransport};
pub use handler::{handle, handle_html, Response};
pub use metadata::{normalize, MetadataBundle, MetadataExtractor};
pub use recipe::{locate, Recipe, RecipeExtractor, RECIPE_TYPE, SOURCE_TAG};
pub use text::{clean_text, Charset, TextCleaner};
