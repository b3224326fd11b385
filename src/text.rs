//! Text sanitizing for recipe fields
//!
//! Recipe sites routinely ship entity-encoded, tag-laden, oddly spaced text in
//! their JSON-LD. [`TextCleaner`] turns that into a single plain line.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Anything shaped like `<...>`. Not an HTML parser: literal angle-bracketed
/// prose is removed too.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

/// Which characters survive cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// Printable ASCII only. Accented and non-Latin characters are dropped.
    #[default]
    Ascii,
    /// Keep every non-control character.
    Unicode,
}

impl Charset {
    fn keeps(self, c: char) -> bool {
        if c.is_whitespace() {
            // Collapsed to a single space later
            return self == Charset::Unicode || c.is_ascii();
        }
        match self {
            Charset::Ascii => c.is_ascii() && !c.is_ascii_control(),
            Charset::Unicode => !c.is_control(),
        }
    }
}

impl FromStr for Charset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" => Ok(Charset::Ascii),
            "unicode" | "utf8" | "utf-8" => Ok(Charset::Unicode),
            other => Err(format!("unknown charset '{}', expected ascii or unicode", other)),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Charset::Ascii => f.write_str("ascii"),
            Charset::Unicode => f.write_str("unicode"),
        }
    }
}

/// Sanitizer applied to every text field of a [`Recipe`](crate::recipe::Recipe).
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCleaner {
    charset: Charset,
}

impl TextCleaner {
    pub fn new(charset: Charset) -> Self {
        Self { charset }
    }

    /// Decode entities, drop unwanted characters, collapse whitespace and
    /// strip tags.
    ///
    /// The pass repeats until the output stops changing, so cleaning is
    /// idempotent even for double-encoded input such as `&amp;lt;b&amp;gt;`.
    /// Returns `None` for missing input and for input that cleans to nothing.
    pub fn clean(&self, text: Option<&str>) -> Option<String> {
        let text = text?;
        if text.is_empty() {
            return None;
        }

        let mut current = self.clean_once(text);
        loop {
            let next = self.clean_once(&current);
            if next == current {
                break;
            }
            current = next;
        }

        if current.is_empty() {
            None
        } else {
            Some(current)
        }
    }

    fn clean_once(&self, text: &str) -> String {
        let decoded = html_escape::decode_html_entities(text);
        let filtered: String = decoded.chars().filter(|&c| self.charset.keeps(c)).collect();
        let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
        TAG_RE.replace_all(&collapsed, "").into_owned()
    }
}

/// Clean with the default ASCII charset.
pub fn clean_text(text: &str) -> Option<String> {
    TextCleaner::default().clean(Some(text))
}
