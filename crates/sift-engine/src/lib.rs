//! The per-event triage pipeline.
//!
//! One [`Engine::handle`] call runs the full sequence for a single platform
//! event: shape the embeddable text, embed it, search both backends with the
//! event's own id excluded, fuse, index the event item, and reconcile the
//! managed comment. Dependencies sit behind traits so the pipeline is
//! testable with in-memory fakes.

pub mod report;

use anyhow::{Context, Result};
use tracing::debug;

use sift_core::ingest::{PrDiffMode, PrInput, build_issue_content, build_pr_content};
use sift_core::{
    FtsResult, FuseConfig, FusedResult, ItemRecord, Store, VectorResult, build_item_id,
    fuse_results,
};
use sift_embed::Embedder;
use sift_github::{CommentAction, CommentApi, CommentManager, Event};

const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;
const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.92;
const DEFAULT_MAX_RESULTS: usize = 5;

/// Index operations the pipeline needs; implemented by [`sift_core::Store`].
pub trait SearchIndex {
    fn search_vector(
        &self,
        query_embedding: &[f32],
        exclude_id: &str,
        limit: usize,
    ) -> Result<Vec<VectorResult>>;
    fn search_fts(&self, query: &str, exclude_id: &str, limit: usize) -> Result<Vec<FtsResult>>;
    fn upsert_item(&self, rec: &ItemRecord) -> Result<()>;
    fn upsert_vector(&self, id: &str, embedding: &[f32]) -> Result<()>;
}

impl SearchIndex for Store {
    fn search_vector(
        &self,
        query_embedding: &[f32],
        exclude_id: &str,
        limit: usize,
    ) -> Result<Vec<VectorResult>> {
        Store::search_vector(self, query_embedding, exclude_id, limit)
    }

    fn search_fts(&self, query: &str, exclude_id: &str, limit: usize) -> Result<Vec<FtsResult>> {
        Store::search_fts(self, query, exclude_id, limit)
    }

    fn upsert_item(&self, rec: &ItemRecord) -> Result<()> {
        Store::upsert_item(self, rec)
    }

    fn upsert_vector(&self, id: &str, embedding: &[f32]) -> Result<()> {
        Store::upsert_vector(self, id, embedding)
    }
}

/// Where the managed comment ends up; implemented by the real comment
/// manager and by test fakes.
pub trait CommentSink {
    fn upsert_triage_comment(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<CommentAction>;
}

impl<A: CommentApi> CommentSink for CommentManager<A> {
    fn upsert_triage_comment(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<CommentAction> {
        CommentManager::upsert_triage_comment(self, owner, repo, number, body)
    }
}

/// Renders the fused results into a comment body; empty results must yield
/// an empty body.
pub trait ReportFormatter {
    fn format(&self, event: &Event, results: &[FusedResult]) -> String;
}

/// Thresholds handed down from configuration; zero fields fall back to the
/// shared defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    pub similarity_threshold: f64,
    pub duplicate_threshold: f64,
    pub max_results: usize,
}

pub struct Engine<E, S, C, F> {
    pub embedder: E,
    pub index: S,
    pub comments: C,
    pub formatter: F,
    pub config: EngineConfig,
}

impl<E, S, C, F> Engine<E, S, C, F>
where
    E: Embedder,
    S: SearchIndex,
    C: CommentSink,
    F: ReportFormatter,
{
    /// Run the full pipeline for one event.
    ///
    /// Failures propagate to the caller, which is expected to downgrade them
    /// to warnings; nothing here must ever block item creation.
    pub fn handle(&self, event: &Event) -> Result<()> {
        let current_id = build_item_id(&event.event_type, event.number);
        let content = build_embeddable_content(event);

        let mut embedding: Vec<f32> = Vec::new();
        let mut vec_results: Vec<VectorResult> = Vec::new();
        let mut fts_results: Vec<FtsResult> = Vec::new();

        if !content.trim().is_empty() {
            embedding = self.embedder.embed(&content).context("embed content")?;

            let limit = self.max_results();
            vec_results = self
                .index
                .search_vector(&embedding, &current_id, limit)
                .context("vector search")?;
            fts_results = self
                .index
                .search_fts(&content, &current_id, limit)
                .context("fts search")?;
        } else {
            debug!("event {current_id} has no embeddable content, skipping search");
        }

        let fused = fuse_results(
            &vec_results,
            &fts_results,
            &current_id,
            FuseConfig {
                similarity_threshold: self.similarity_threshold(),
                duplicate_threshold: self.duplicate_threshold(),
                max_results: self.max_results(),
            },
        );

        let item = build_item_record(event, &current_id);
        self.index.upsert_item(&item).context("upsert item")?;
        if !embedding.is_empty() {
            self.index
                .upsert_vector(&current_id, &embedding)
                .context("upsert vector")?;
        }

        let comment_body = if fused.is_empty() {
            String::new()
        } else {
            self.formatter.format(event, &fused)
        };

        self.comments
            .upsert_triage_comment(&event.owner, &event.repo, event.number, &comment_body)
            .context("upsert triage comment")?;

        Ok(())
    }

    fn similarity_threshold(&self) -> f64 {
        if self.config.similarity_threshold <= 0.0 {
            DEFAULT_SIMILARITY_THRESHOLD
        } else {
            self.config.similarity_threshold
        }
    }

    fn duplicate_threshold(&self) -> f64 {
        if self.config.duplicate_threshold <= 0.0 {
            DEFAULT_DUPLICATE_THRESHOLD
        } else {
            self.config.duplicate_threshold
        }
    }

    fn max_results(&self) -> usize {
        if self.config.max_results == 0 {
            DEFAULT_MAX_RESULTS
        } else {
            self.config.max_results
        }
    }
}

fn build_embeddable_content(event: &Event) -> String {
    match event.event_type.as_str() {
        "issue" => build_issue_content(&event.title, &event.body),
        "pr" => {
            let mode = if event.diff.trim().is_empty() {
                if event.files.is_empty() {
                    PrDiffMode::TitleBodyOnly
                } else {
                    PrDiffMode::SkipDiffKeepFiles
                }
            } else {
                PrDiffMode::Include
            };

            build_pr_content(&PrInput {
                title: event.title.clone(),
                body: event.body.clone(),
                files: event.files.clone(),
                diff: event.diff.clone(),
                mode,
            })
        }
        _ => String::new(),
    }
}

fn build_item_record(event: &Event, id: &str) -> ItemRecord {
    ItemRecord {
        id: id.to_string(),
        item_type: normalize_item_type(&event.event_type),
        number: event.number,
        title: event.title.clone(),
        body: event.body.clone(),
        author: event.author.clone(),
        state: event.state.clone(),
        labels: event.labels.clone(),
        files: event.files.clone(),
        url: event.url.clone(),
        created_at: None,
        updated_at: None,
    }
}

fn normalize_item_type(kind: &str) -> String {
    if kind == "issue" {
        "issue".to_string()
    } else {
        "pr".to_string()
    }
}
