//! Deterministic embedder test double.

use anyhow::{Result, anyhow, bail};

use crate::{DEFAULT_EMBEDDING_DIMENSIONS, Embedder};

/// Test double with canned vectors and an optional injected failure.
#[derive(Debug, Default)]
pub struct MockEmbedder {
    pub vectors: Vec<Vec<f32>>,
    pub error: Option<String>,
    pub dims: usize,
}

impl Embedder for MockEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if let Some(message) = &self.error {
            return Err(anyhow!("{message}"));
        }
        if self.vectors.is_empty() {
            return Ok(vec![0.0; self.dimensions()]);
        }
        Ok(self.vectors[0].clone())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if let Some(message) = &self.error {
            return Err(anyhow!("{message}"));
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if self.vectors.is_empty() {
            return Ok(vec![vec![0.0; self.dimensions()]; texts.len()]);
        }
        if self.vectors.len() < texts.len() {
            bail!("mock vectors fewer than input texts");
        }
        Ok(self.vectors[..texts.len()].to_vec())
    }

    fn dimensions(&self) -> usize {
        if self.dims == 0 {
            DEFAULT_EMBEDDING_DIMENSIONS
        } else {
            self.dims
        }
    }
}
