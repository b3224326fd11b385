//! Page fetching with header-profile rotation
//!
//! Some recipe sites block unknown clients but let search or pinning bots
//! through. [`Fetcher`] tries each configured [`HeaderProfile`] in turn and
//! returns the first page that downloads and parses.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};
use url::Url;
use ureq::http::header::CONTENT_TYPE;
use ureq::ResponseExt;

use crate::config::ExtractorConfig;
use crate::encoding::decode_body;
use crate::error::{FetchError, ParseError};

/// `<base href="...">`, matched the way lenient HTML tooling does
static BASE_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<base\s[^>]*href\s*=\s*["']\s*([^"'\s]+)\s*["']"#)
        .expect("Invalid base href regex")
});

/// Bytes searched for a `<base href>` declaration
const BASE_SCAN_LIMIT: usize = 4096;

/// A set of request headers. Names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderProfile(BTreeMap<String, String>);

impl HeaderProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing value under the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name.into(), value.into());
        self
    }

    fn set(&mut self, name: String, value: String) {
        self.0.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.get("User-Agent")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This profile layered over `base`; on conflict this profile wins.
    pub fn merged_over(&self, base: &HeaderProfile) -> HeaderProfile {
        let mut merged = base.clone();
        for (name, value) in &self.0 {
            merged.set(name.clone(), value.clone());
        }
        merged
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderProfile {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut profile = HeaderProfile::new();
        for (name, value) in iter {
            profile.set(name.into(), value.into());
        }
        profile
    }
}

// Goes through `set` so names differing only in case collapse to the last one
impl<'de> Deserialize<'de> for HeaderProfile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ProfileVisitor;

        impl<'de> Visitor<'de> for ProfileVisitor {
            type Value = HeaderProfile;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HeaderProfile, A::Error> {
                let mut profile = HeaderProfile::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    profile.set(name, value);
                }
                Ok(profile)
            }
        }

        deserializer.deserialize_map(ProfileVisitor)
    }
}

/// A successfully fetched document
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub html: String,
    /// Final URL after redirects, adjusted by any `<base href>`
    pub base_url: Url,
}

/// Body and final URL of a 2xx response
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub body: String,
    pub url: String,
}

/// One HTTP GET. Implementations must turn non-2xx statuses into errors.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, headers: &HeaderProfile) -> Result<RawResponse, FetchError>;
}

/// Blocking transport backed by a shared `ureq::Agent`
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build(),
        );
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, headers: &HeaderProfile) -> Result<RawResponse, FetchError> {
        let mut request = self.agent.get(url);
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let mut response = request.call().map_err(|err| match err {
            ureq::Error::StatusCode(status) => FetchError::Status {
                url: url.to_string(),
                status,
            },
            other => FetchError::Request {
                url: url.to_string(),
                message: other.to_string(),
            },
        })?;

        let final_url = response.get_uri().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|err| FetchError::Body {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        Ok(RawResponse {
            body: decode_body(&bytes, content_type.as_deref()),
            url: final_url,
        })
    }
}

/// Sequential header-profile fallback over a [`Transport`]
#[derive(Debug, Clone)]
pub struct Fetcher<T = UreqTransport> {
    transport: T,
    default_headers: HeaderProfile,
    profiles: Vec<HeaderProfile>,
}

impl Fetcher<UreqTransport> {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self::with_transport(UreqTransport::new(config.timeout()), config)
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn with_transport(transport: T, config: &ExtractorConfig) -> Self {
        let mut profiles = config.header_profiles.clone();
        if profiles.is_empty() {
            // Defaults alone still make one attempt
            profiles.push(HeaderProfile::new());
        }
        Self {
            transport,
            default_headers: config.default_headers.clone(),
            profiles,
        }
    }

    pub fn profiles(&self) -> &[HeaderProfile] {
        &self.profiles
    }

    /// Fetch `url`, returning the first page any profile obtains.
    pub fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        self.fetch_with(url, Ok)
    }

    /// Fetch `url` and run `parse` on the page within the same attempt.
    ///
    /// A parse failure is treated like a network failure: it is logged and
    /// the next profile is tried.
    pub fn fetch_with<R, F>(&self, url: &str, mut parse: F) -> Result<R, FetchError>
    where
        F: FnMut(Page) -> Result<R, ParseError>,
    {
        Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        for (index, profile) in self.profiles.iter().enumerate() {
            let headers = profile.merged_over(&self.default_headers);
            debug!(
                url,
                profile = index,
                user_agent = headers.user_agent().unwrap_or(""),
                "fetching page"
            );

            match self.attempt(url, &headers, &mut parse) {
                Ok(result) => return Ok(result),
                Err(err) => warn!(url, profile = index, error = %err, "header profile failed"),
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.profiles.len(),
        })
    }

    fn attempt<R, F>(&self, url: &str, headers: &HeaderProfile, parse: &mut F) -> Result<R, FetchError>
    where
        F: FnMut(Page) -> Result<R, ParseError>,
    {
        let response = self.transport.get(url, headers)?;
        let base_url = resolve_base_url(&response.body, &response.url)?;
        info!(url, base_url = %base_url, bytes = response.body.len(), "fetched page");

        Ok(parse(Page {
            html: response.body,
            base_url,
        })?)
    }
}

/// The document's base URL: `response_url` joined with the first
/// `<base href>` if the page declares one.
pub fn resolve_base_url(html: &str, response_url: &str) -> Result<Url, ParseError> {
    let response_url = Url::parse(response_url).map_err(|source| ParseError::InvalidBaseUrl {
        url: response_url.to_string(),
        source,
    })?;

    let declared = BASE_HREF_RE
        .captures(document_head(html))
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str());

    Ok(match declared {
        Some(href) => response_url.join(href).unwrap_or(response_url),
        None => response_url,
    })
}

/// The leading part of `html` that may declare a `<base>`, cut on a char
/// boundary
fn document_head(html: &str) -> &str {
    if html.len() <= BASE_SCAN_LIMIT {
        return html;
    }
    let mut end = BASE_SCAN_LIMIT;
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    &html[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outcomes and records the headers of each call
    #[derive(Default)]
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<RawResponse, FetchError>>>,
        seen: Mutex<Vec<HeaderProfile>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Result<RawResponse, FetchError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &str, headers: &HeaderProfile) -> Result<RawResponse, FetchError> {
            self.seen.lock().unwrap().push(headers.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Status { url: url.to_string(), status: 503 }))
        }
    }

    fn ok(body: &str, url: &str) -> Result<RawResponse, FetchError> {
        Ok(RawResponse {
            body: body.to_string(),
            url: url.to_string(),
        })
    }

    fn blocked() -> Result<RawResponse, FetchError> {
        Err(FetchError::Status {
            url: "https://example.com/pie".to_string(),
            status: 403,
        })
    }

    #[test]
    fn test_header_merge_overrides_case_insensitively() {
        let base: HeaderProfile = [("User-Agent", "browser"), ("Accept", "*/*")].into_iter().collect();
        let profile = HeaderProfile::new().with("user-agent", "Pinterestbot");

        let merged = profile.merged_over(&base);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.user_agent(), Some("Pinterestbot"));
        assert_eq!(merged.get("ACCEPT"), Some("*/*"));
    }

    #[test]
    fn test_later_profile_succeeds() {
        let transport = ScriptedTransport::new(vec![
            blocked(),
            Err(FetchError::Request {
                url: "https://example.com/pie".to_string(),
                message: "timed out".to_string(),
            }),
            blocked(),
            ok("<html>pie</html>", "https://example.com/pie"),
        ]);
        let fetcher = Fetcher::with_transport(transport, &ExtractorConfig::default());

        let page = fetcher.fetch("https://example.com/pie").unwrap();
        assert_eq!(page.html, "<html>pie</html>");
        assert_eq!(page.base_url.as_str(), "https://example.com/pie");

        // The fourth profile is DuckDuckBot, merged over the defaults
        let seen = fetcher.transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[1].user_agent(), Some("Pinterestbot"));
        assert_eq!(seen[3].user_agent(), Some("DuckDuckBot"));
        assert_eq!(seen[3].get("Accept-Language"), Some("en-US,en;q=0.9"));
    }

    #[test]
    fn test_all_profiles_fail() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::default(), &ExtractorConfig::default());

        let err = fetcher.fetch("https://example.com/pie").unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { attempts: 5, .. }));
        assert_eq!(fetcher.transport.calls(), 5);
    }

    #[test]
    fn test_invalid_url_skips_network() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::default(), &ExtractorConfig::default());

        let err = fetcher.fetch("not a url").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert_eq!(fetcher.transport.calls(), 0);
    }

    #[test]
    fn test_parse_failure_rotates_profile() {
        let transport = ScriptedTransport::new(vec![
            ok("first", "https://example.com/pie"),
            ok("second", "https://example.com/pie"),
        ]);
        let fetcher = Fetcher::with_transport(transport, &ExtractorConfig::default());

        let result = fetcher.fetch_with("https://example.com/pie", |page| {
            if page.html == "first" {
                Err(ParseError::InvalidBaseUrl {
                    url: page.base_url.to_string(),
                    source: url::ParseError::EmptyHost,
                })
            } else {
                Ok(page.html)
            }
        });

        assert_eq!(result.unwrap(), "second");
        assert_eq!(fetcher.transport.calls(), 2);
    }

    #[test]
    fn test_empty_profile_pool_still_attempts_once() {
        let config = ExtractorConfig {
            header_profiles: Vec::new(),
            ..ExtractorConfig::default()
        };
        let transport = ScriptedTransport::new(vec![ok("page", "https://example.com/")]);
        let fetcher = Fetcher::with_transport(transport, &config);

        assert_eq!(fetcher.profiles().len(), 1);
        assert!(fetcher.fetch("https://example.com/").is_ok());
        let seen = fetcher.transport.seen.lock().unwrap();
        assert_eq!(seen[0].user_agent(), config.default_headers.user_agent());
    }

    #[test]
    fn test_resolve_base_url() {
        let plain = resolve_base_url("<html></html>", "https://example.com/a/b").unwrap();
        assert_eq!(plain.as_str(), "https://example.com/a/b");

        let html = r#"<html><head><BASE target="_self" href="/recipes/"></head></html>"#;
        let based = resolve_base_url(html, "https://example.com/a/b").unwrap();
        assert_eq!(based.as_str(), "https://example.com/recipes/");

        assert!(resolve_base_url("", "relative/path").is_err());
    }

    #[test]
    fn test_base_href_outside_document_head_is_ignored() {
        let mut html = String::from("<html><head><title>Pie</title></head><body>");
        // Multi-byte padding so the cut has to land on a char boundary
        while html.len() < BASE_SCAN_LIMIT + 10 {
            html.push('é');
        }
        html.push_str(r#"<script>var tpl = '<base href="/elsewhere/">';</script></body></html>"#);

        let base = resolve_base_url(&html, "https://example.com/a/b").unwrap();
        assert_eq!(base.as_str(), "https://example.com/a/b");
    }

    #[test]
    fn test_profile_deserializes_case_insensitively() {
        let profile: HeaderProfile =
            serde_json::from_str(r#"{"User-Agent": "browser", "user-agent": "DuckDuckBot"}"#).unwrap();

        assert_eq!(profile.len(), 1);
        assert_eq!(profile.user_agent(), Some("DuckDuckBot"));
        assert_eq!(serde_json::to_value(&profile).unwrap(), serde_json::json!({"user-agent": "DuckDuckBot"}));

        assert!(serde_json::from_str::<HeaderProfile>(r#"{"Accept": 1}"#).is_err());
    }
}
