//! Extractor configuration
//!
//! Defaults reproduce the built-in header pool; a JSON file can replace any
//! field (missing fields keep their default):
//!
//! ```json
//! {"timeout_secs": 5, "header_profiles": [{"User-Agent": "DuckDuckBot"}]}
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::extractors::Syntax;
use crate::fetch::HeaderProfile;
use crate::text::Charset;

pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Baseline headers every profile is merged over
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("User-Agent", BROWSER_USER_AGENT),
    ("Accept", "*/*"),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Accept-Encoding", "gzip, deflate, br"),
    ("Connection", "keep-alive"),
];

/// User agents tried in order until one gets the page
pub const PROFILE_USER_AGENTS: &[&str] = &[
    BROWSER_USER_AGENT,
    "Pinterestbot",
    "APIs-Google (+https://developers.google.com/webmasters/APIs-Google.html)",
    "DuckDuckBot",
    BROWSER_USER_AGENT,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Timeout for each fetch attempt, in seconds
    pub timeout_secs: u64,
    pub default_headers: HeaderProfile,
    /// Tried in order; each is merged over `default_headers`
    pub header_profiles: Vec<HeaderProfile>,
    pub charset: Charset,
    /// Formats to extract
    pub syntaxes: Vec<Syntax>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_headers: DEFAULT_HEADERS.iter().copied().collect(),
            header_profiles: PROFILE_USER_AGENTS
                .iter()
                .map(|ua| HeaderProfile::new().with("User-Agent", *ua))
                .collect(),
            charset: Charset::default(),
            syntaxes: Syntax::ALL.to_vec(),
        }
    }
}

impl ExtractorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: display,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every fetch fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool() {
        let config = ExtractorConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.header_profiles.len(), 5);
        assert_eq!(config.header_profiles[1].user_agent(), Some("Pinterestbot"));
        assert_eq!(config.default_headers.get("accept"), Some("*/*"));
        assert_eq!(config.syntaxes, Syntax::ALL.to_vec());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ExtractorConfig = serde_json::from_str(
            r#"{"timeout_secs": 10, "charset": "unicode", "header_profiles": [{"User-Agent": "DuckDuckBot"}]}"#,
        )
        .unwrap();

        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.charset, Charset::Unicode);
        assert_eq!(config.header_profiles.len(), 1);
        assert_eq!(config.header_profiles[0].user_agent(), Some("DuckDuckBot"));
        assert_eq!(config.default_headers, ExtractorConfig::default().default_headers);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ExtractorConfig {
            timeout_secs: 0,
            ..ExtractorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(ExtractorConfig::default().validate().is_ok());

        let path = std::env::temp_dir().join(format!(
            "recipe-extractor-zero-timeout-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"timeout_secs": 0}"#).unwrap();
        let loaded = ExtractorConfig::from_file(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(loaded, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_duplicate_header_names_collapse() {
        let config: ExtractorConfig = serde_json::from_str(
            r#"{"default_headers": {"User-Agent": "browser", "user-agent": "Pinterestbot", "Accept": "*/*"}}"#,
        )
        .unwrap();

        assert_eq!(config.default_headers.len(), 2);
        assert_eq!(config.default_headers.user_agent(), Some("Pinterestbot"));
    }

    #[test]
    fn test_missing_file() {
        let err = ExtractorConfig::from_file(Path::new("/nonexistent/recipe-extractor.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
