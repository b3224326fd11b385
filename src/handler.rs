//! Request handling: one URL in, status code and JSON body out
//!
//! Not finding a recipe is a successful response with an empty `recipe`
//! object; only a missing or malformed URL is the caller's fault.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};
use url::Url;

use crate::error::Error;
use crate::fetch::Transport;
use crate::recipe::{Recipe, RecipeExtractor};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status_code: u16,
    pub body: Value,
}

impl Response {
    fn from_error(err: &Error) -> Self {
        let status_code = if err.is_client_error() {
            STATUS_BAD_REQUEST
        } else {
            STATUS_INTERNAL_ERROR
        };
        Self {
            status_code,
            body: json!({ "error": err.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Fetch `url` and respond with the recipe found there.
pub fn handle<T: Transport>(extractor: &RecipeExtractor<T>, url: Option<&str>) -> Response {
    respond(url, |url| extractor.extract_from_url(url))
}

/// Respond with the recipe in `html`, treating `url` as its address.
pub fn handle_html<T: Transport>(
    extractor: &RecipeExtractor<T>,
    url: Option<&str>,
    html: &str,
) -> Response {
    respond(url, |url| match Url::parse(url) {
        Ok(base_url) => extractor.extract_from_html(html, &base_url, url),
        Err(_) => None,
    })
}

fn respond<F>(url: Option<&str>, extract: F) -> Response
where
    F: FnOnce(&str) -> Option<Recipe>,
{
    info!(url = url.unwrap_or(""), "received request");

    match build_body(url, extract) {
        Ok(body) => Response {
            status_code: STATUS_OK,
            body,
        },
        Err(err) => {
            if err.is_client_error() {
                info!(error = %err, "rejected request");
            } else {
                error!(error = %err, "request failed");
            }
            Response::from_error(&err)
        }
    }
}

fn build_body<F>(url: Option<&str>, extract: F) -> Result<Value, Error>
where
    F: FnOnce(&str) -> Option<Recipe>,
{
    let url = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(Error::MissingUrl)?;
    Url::parse(url).map_err(|source| Error::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    // A panic anywhere in the pipeline still produces a response
    let found = catch_unwind(AssertUnwindSafe(|| extract(url)))
        .map_err(|payload| Error::Internal(panic_message(payload.as_ref())))?;

    let recipe = match found {
        Some(recipe) => serde_json::to_value(&recipe)?,
        None => Value::Object(Map::new()),
    };

    Ok(json!({ "url": url, "recipe": recipe }))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
