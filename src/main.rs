//! # recipe-extractor: command-line front end
//!
//! Prints the handler response for a URL as JSON. With `--html` the page is
//! read from a file instead of fetched; with `--metadata` the full normalized
//! metadata bundle is printed instead of the recipe.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use recipe_extractor::handler::{self, Response};
use recipe_extractor::{Charset, Error, ExtractorConfig, RecipeExtractor};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address of the recipe page
    url: Option<String>,

    /// Read the page from this file instead of fetching it
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,

    /// Print every extracted metadata format instead of the recipe
    #[arg(long)]
    metadata: bool,

    /// Timeout for each fetch attempt, in seconds
    #[arg(
        long,
        env = "RECIPE_EXTRACTOR_TIMEOUT_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_secs: Option<u64>,

    /// Characters kept by text cleaning (ascii or unicode)
    #[arg(long, env = "RECIPE_EXTRACTOR_CHARSET")]
    charset: Option<Charset>,

    /// JSON config file overriding the built-in defaults
    #[arg(long, value_name = "FILE", env = "RECIPE_EXTRACTOR_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> Result<ExtractorConfig> {
        let mut config = match &self.config {
            Some(path) => ExtractorConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ExtractorConfig::default(),
        };
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if let Some(charset) = self.charset {
            config.charset = charset;
        }
        config.validate()?;
        Ok(config)
    }

    fn read_html(&self) -> Result<Option<String>> {
        self.html
            .as_ref()
            .map(|path| {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))
            })
            .transpose()
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .event_format(fmt::format().compact())
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    debug!(?config, "loaded config");

    let extractor = RecipeExtractor::new(&config);
    let html = cli.read_html()?;

    let response = if cli.metadata {
        metadata_response(&extractor, cli.url.as_deref(), html.as_deref())?
    } else {
        match &html {
            Some(html) => handler::handle_html(&extractor, cli.url.as_deref(), html),
            None => handler::handle(&extractor, cli.url.as_deref()),
        }
    };

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn metadata_response(
    extractor: &RecipeExtractor,
    url: Option<&str>,
    html: Option<&str>,
) -> Result<Response> {
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(bad_request(&Error::MissingUrl));
    };
    let base_url = match Url::parse(url) {
        Ok(base_url) => base_url,
        Err(source) => {
            return Ok(bad_request(&Error::InvalidUrl {
                url: url.to_string(),
                source,
            }))
        }
    };

    let metadata = extractor.metadata();
    let bundle = match html {
        Some(html) => metadata.extract_from_html(html, &base_url),
        None => metadata.extract_from_url(url),
    };

    Ok(Response {
        status_code: handler::STATUS_OK,
        body: serde_json::to_value(&bundle).context("Failed to serialize metadata")?,
    })
}

fn bad_request(err: &Error) -> Response {
    Response {
        status_code: handler::STATUS_BAD_REQUEST,
        body: serde_json::json!({ "error": err.to_string() }),
    }
}
