//! Embedding provider contract plus the default GitHub Models client.

mod github_models;
mod mock;

pub use github_models::{GitHubModelsConfig, GitHubModelsEmbedder};
pub use mock::MockEmbedder;

use anyhow::Result;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Conservative code-point cap on embedder input; the provider's token limit
/// is not directly computable from character count.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 30_000;

/// Converts text into dense vector embeddings.
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
}
