//! GitHub Models embedding client.
//!
//! Retries on any non-2xx response, honoring `Retry-After` when the server
//! sends one and falling back to exponential backoff (1s, 2s, 4s, ... capped
//! at 30s) otherwise. Input is truncated to a code-point cap before the
//! request goes out.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL, DEFAULT_MAX_INPUT_CHARS, Embedder,
};

pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "https://models.inference.ai.azure.com/embeddings";

const MAX_BACKOFF_SECS: u64 = 30;

type SleepFn = Box<dyn Fn(Duration) + Send + Sync>;

/// Construction knobs for [`GitHubModelsEmbedder`].
///
/// Zero/empty fields take their defaults; only `token` is required.
#[derive(Debug, Clone, Default)]
pub struct GitHubModelsConfig {
    pub token: String,
    pub endpoint: String,
    pub model: String,
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub max_chars: usize,
    pub dimensions: usize,
}

pub struct GitHubModelsEmbedder {
    endpoint: String,
    token: String,
    model: String,
    max_retries: u32,
    max_chars: usize,
    dimensions: usize,
    client: reqwest::blocking::Client,
    sleep: SleepFn,
}

impl std::fmt::Debug for GitHubModelsEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubModelsEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .field("max_chars", &self.max_chars)
            .field("dimensions", &self.dimensions)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl GitHubModelsEmbedder {
    /// Build an embedder from config, filling defaults for unset fields.
    ///
    /// # Errors
    ///
    /// Fails when the token is blank or the HTTP client cannot be built.
    pub fn new(cfg: GitHubModelsConfig) -> Result<Self> {
        if cfg.token.trim().is_empty() {
            bail!("github token is required");
        }

        let endpoint = if cfg.endpoint.trim().is_empty() {
            DEFAULT_EMBEDDING_ENDPOINT.to_string()
        } else {
            cfg.endpoint.trim().to_string()
        };
        let model = if cfg.model.trim().is_empty() {
            DEFAULT_EMBEDDING_MODEL.to_string()
        } else {
            cfg.model.trim().to_string()
        };
        let timeout = cfg.timeout.unwrap_or(Duration::from_secs(30));
        let max_chars = if cfg.max_chars == 0 {
            DEFAULT_MAX_INPUT_CHARS
        } else {
            cfg.max_chars
        };
        let dimensions = if cfg.dimensions == 0 {
            DEFAULT_EMBEDDING_DIMENSIONS
        } else {
            cfg.dimensions
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build embedding http client")?;

        Ok(Self {
            endpoint,
            token: cfg.token,
            model,
            max_retries: cfg.max_retries,
            max_chars,
            dimensions,
            client,
            sleep: Box::new(std::thread::sleep),
        })
    }

    /// Replace the inter-retry sleep, so tests don't wait out real backoff.
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    fn request_embeddings(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, (anyhow::Error, Option<Duration>)> {
        let payload = EmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .map_err(|e| (anyhow!(e).context("send embedding request"), None))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().unwrap_or_default();
            let body = body.trim();
            let truncated: String = body.chars().take(4096).collect();
            return Err((
                anyhow!("embedding request failed: status={status} body={truncated}"),
                retry_after,
            ));
        }

        let out: EmbeddingResponse = response
            .json()
            .map_err(|e| (anyhow!(e).context("decode embedding response"), None))?;
        if out.data.is_empty() {
            return Err((anyhow!("embedding response data is empty"), None));
        }

        Ok(out.data.into_iter().map(|item| item.embedding).collect())
    }
}

impl Embedder for GitHubModelsEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embed response contained no vectors"))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|text| truncate_for_embedding(text, self.max_chars))
            .collect();

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            match self.request_embeddings(&truncated) {
                Ok(vectors) => return Ok(vectors),
                Err((err, retry_after)) => {
                    debug!("embedding attempt {attempt} failed: {err:#}");
                    last_err = Some(err);
                    if attempt == self.max_retries {
                        break;
                    }

                    let wait = retry_after
                        .filter(|d| !d.is_zero())
                        .unwrap_or_else(|| backoff_duration(attempt));
                    (self.sleep)(wait);
                }
            }
        }

        Err(anyhow!(
            "embed batch failed after {} attempts: {:#}",
            self.max_retries + 1,
            last_err.unwrap_or_else(|| anyhow!("no attempts made"))
        ))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn truncate_for_embedding(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

fn parse_retry_after(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<u64>() {
        if seconds > 0 {
            return Some(Duration::from_secs(seconds));
        }
        return None;
    }

    // HTTP-date form: wait until the given instant.
    if let Ok(when) = DateTime::parse_from_rfc2822(raw) {
        let delta = when.with_timezone(&Utc) - Utc::now();
        if let Ok(wait) = delta.to_std() {
            if !wait.is_zero() {
                return Some(wait);
            }
        }
    }

    None
}

fn backoff_duration(attempt: u32) -> Duration {
    // attempt=0 -> 1s, attempt=1 -> 2s, attempt=2 -> 4s, capped at 30s
    let seconds = 1u64
        .checked_shl(attempt)
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(seconds.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_token() {
        let err = GitHubModelsEmbedder::new(GitHubModelsConfig::default()).unwrap_err();
        assert!(err.to_string().contains("token is required"));
    }

    #[test]
    fn new_fills_defaults() {
        let embedder = GitHubModelsEmbedder::new(GitHubModelsConfig {
            token: "tkn".to_string(),
            ..GitHubModelsConfig::default()
        })
        .unwrap();

        assert_eq!(embedder.endpoint, DEFAULT_EMBEDDING_ENDPOINT);
        assert_eq!(embedder.model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(embedder.max_chars, DEFAULT_MAX_INPUT_CHARS);
        assert_eq!(embedder.dimensions(), DEFAULT_EMBEDDING_DIMENSIONS);
    }

    #[test]
    fn truncate_counts_code_points() {
        let text = "é".repeat(10);
        assert_eq!(truncate_for_embedding(&text, 4).chars().count(), 4);
        assert_eq!(truncate_for_embedding("short", 100), "short");
        assert_eq!(truncate_for_embedding("anything", 0), "");
    }

    #[test]
    fn parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("0"), None);
        assert_eq!(parse_retry_after(""), None);
        assert_eq!(parse_retry_after("garbage"), None);
    }

    #[test]
    fn parse_retry_after_http_date_in_past_is_none() {
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_duration(0), Duration::from_secs(1));
        assert_eq!(backoff_duration(1), Duration::from_secs(2));
        assert_eq!(backoff_duration(2), Duration::from_secs(4));
        assert_eq!(backoff_duration(10), Duration::from_secs(30));
        assert_eq!(backoff_duration(63), Duration::from_secs(30));
    }

    #[test]
    fn embed_batch_empty_input_is_empty() {
        let embedder = GitHubModelsEmbedder::new(GitHubModelsConfig {
            token: "tkn".to_string(),
            ..GitHubModelsConfig::default()
        })
        .unwrap();
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }
}
