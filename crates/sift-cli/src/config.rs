//! Environment-driven configuration.
//!
//! Required inputs follow the Actions runtime (`GITHUB_*`); tunables arrive
//! as `INPUT_*` variables the way action inputs are surfaced to the process.

use anyhow::{Context, Result, bail};

const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;
const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.92;
const DEFAULT_MAX_RESULTS: usize = 5;
const DEFAULT_INDEX_BRANCH: &str = "triage-index";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub token: String,
    pub event_name: String,
    pub event_path: String,
    pub repository: String,

    pub similarity_threshold: f64,
    pub duplicate_threshold: f64,
    pub max_results: usize,
    pub index_branch: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build the config from an environment lookup function; injected so
    /// tests don't mutate process-global state.
    pub fn from_env_with(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        for key in [
            "GITHUB_TOKEN",
            "GITHUB_EVENT_NAME",
            "GITHUB_EVENT_PATH",
            "GITHUB_REPOSITORY",
        ] {
            if get(key).unwrap_or_default().trim().is_empty() {
                bail!("missing required env {key}");
            }
        }

        let similarity_threshold = parse_float_input(
            get("INPUT_SIMILARITY_THRESHOLD"),
            DEFAULT_SIMILARITY_THRESHOLD,
        )
        .context("parse INPUT_SIMILARITY_THRESHOLD")?;
        if !(0.0..=1.0).contains(&similarity_threshold) {
            bail!("INPUT_SIMILARITY_THRESHOLD must be between 0 and 1");
        }

        let duplicate_threshold = parse_float_input(
            get("INPUT_DUPLICATE_THRESHOLD"),
            DEFAULT_DUPLICATE_THRESHOLD,
        )
        .context("parse INPUT_DUPLICATE_THRESHOLD")?;
        if !(0.0..=1.0).contains(&duplicate_threshold) {
            bail!("INPUT_DUPLICATE_THRESHOLD must be between 0 and 1");
        }

        let max_results = parse_int_input(get("INPUT_MAX_RESULTS"), DEFAULT_MAX_RESULTS)
            .context("parse INPUT_MAX_RESULTS")?;
        if !(1..=20).contains(&max_results) {
            bail!("INPUT_MAX_RESULTS must be between 1 and 20");
        }

        let index_branch = get("INPUT_INDEX_BRANCH")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| DEFAULT_INDEX_BRANCH.to_string());

        Ok(Self {
            token: get("GITHUB_TOKEN").unwrap_or_default(),
            event_name: get("GITHUB_EVENT_NAME").unwrap_or_default(),
            event_path: get("GITHUB_EVENT_PATH").unwrap_or_default(),
            repository: get("GITHUB_REPOSITORY").unwrap_or_default(),
            similarity_threshold,
            duplicate_threshold,
            max_results,
            index_branch,
        })
    }
}

fn parse_float_input(raw: Option<String>, fallback: f64) -> Result<f64> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(fallback),
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid float {value:?}")),
    }
}

fn parse_int_input(raw: Option<String>, fallback: usize) -> Result<usize> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(fallback),
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid integer {value:?}")),
    }
}
