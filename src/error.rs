//! Error types for the extraction pipeline

use thiserror::Error;

/// Failure while fetching a page.
///
/// Every variant except `InvalidUrl` and `Exhausted` describes a single
/// header-profile attempt; the fetcher logs those and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("failed to read body from {url}: {message}")]
    Body { url: String, message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("all {attempts} header profiles failed for {url}")]
    Exhausted { url: String, attempts: usize },
}

/// Failure while turning a fetched document into metadata.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid base URL {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Failure while loading an [`ExtractorConfig`](crate::config::ExtractorConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors surfaced by the request handler.
#[derive(Debug, Error)]
pub enum Error {
    #[error("URL is required")]
    MissingUrl,

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("extraction panicked: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller is at fault (maps to a 4xx response).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::MissingUrl | Error::InvalidUrl { .. })
    }
}
