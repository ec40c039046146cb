//! Reciprocal Rank Fusion over the vector and FTS result lists.
//!
//! RRF decides the ordering because it is scale-free across backends; the
//! user-facing number is `display_similarity = max(vec_score, fts_score)`,
//! which keeps a direct semantic meaning on each source (cosine similarity,
//! normalized BM25). The two values are carried separately on every result
//! and must never be collapsed into one.

use std::collections::HashMap;

use serde::Serialize;

use crate::fts::FtsResult;
use crate::search::VectorResult;
use crate::vector::clamp01;

const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;
const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.92;
const DEFAULT_MAX_RESULTS: usize = 5;
const RRF_K: f64 = 60.0;

/// Thresholding and truncation knobs for fusion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FuseConfig {
    pub similarity_threshold: f64,
    pub duplicate_threshold: f64,
    pub max_results: usize,
}

impl FuseConfig {
    fn normalized(self) -> Self {
        if self == Self::default() {
            return Self {
                similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
                duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
                max_results: DEFAULT_MAX_RESULTS,
            };
        }

        Self {
            similarity_threshold: clamp01(self.similarity_threshold),
            duplicate_threshold: clamp01(self.duplicate_threshold),
            max_results: if self.max_results == 0 {
                DEFAULT_MAX_RESULTS
            } else {
                self.max_results
            },
        }
    }
}

/// Merged ranking output from the vector and FTS backends.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusedResult {
    pub id: String,
    pub item_type: String,
    pub number: i64,
    pub title: String,
    pub state: String,
    pub url: String,
    pub rrf_score: f64,
    pub vec_score: f64,
    pub fts_score: f64,
    pub display_similarity: f64,
    pub is_duplicate: bool,
}

#[derive(Debug, Default)]
struct Accumulator {
    item_type: String,
    number: i64,
    title: String,
    state: String,
    url: String,
    rrf_score: f64,
    vec_score: f64,
    fts_score: f64,
}

/// Fuse the two ranked lists, threshold on display similarity, and truncate.
///
/// `exclude_id` is the last line of defense against self-matches: the vector
/// lookup and the FTS SQL both filter it already, but a stored id can still
/// leak through (e.g. via the fallback paths), so fusion filters once more.
pub fn fuse_results(
    vec_results: &[VectorResult],
    fts_results: &[FtsResult],
    exclude_id: &str,
    config: FuseConfig,
) -> Vec<FusedResult> {
    let cfg = config.normalized();
    let mut acc: HashMap<String, Accumulator> = HashMap::new();

    let mut vec_seen: Vec<&str> = Vec::new();
    for (rank, item) in vec_results.iter().enumerate() {
        if item.id.is_empty() || item.id == exclude_id || vec_seen.contains(&item.id.as_str()) {
            continue;
        }
        vec_seen.push(&item.id);

        let current = acc.entry(item.id.clone()).or_default();
        merge_metadata(
            current,
            &item.item_type,
            item.number,
            &item.title,
            &item.state,
            &item.url,
        );
        current.vec_score = current.vec_score.max(clamp01(item.vec_score));
        current.rrf_score += 1.0 / (RRF_K + rank as f64 + 1.0);
    }

    let mut fts_seen: Vec<&str> = Vec::new();
    for (rank, item) in fts_results.iter().enumerate() {
        if item.id.is_empty() || item.id == exclude_id || fts_seen.contains(&item.id.as_str()) {
            continue;
        }
        fts_seen.push(&item.id);

        let current = acc.entry(item.id.clone()).or_default();
        merge_metadata(
            current,
            &item.item_type,
            item.number,
            &item.title,
            &item.state,
            &item.url,
        );
        current.fts_score = current.fts_score.max(clamp01(item.fts_score));
        current.rrf_score += 1.0 / (RRF_K + rank as f64 + 1.0);
    }

    let mut fused: Vec<FusedResult> = acc
        .into_iter()
        .filter_map(|(id, item)| {
            let display_similarity = item.vec_score.max(item.fts_score);
            if display_similarity < cfg.similarity_threshold {
                return None;
            }

            Some(FusedResult {
                id,
                item_type: item.item_type,
                number: item.number,
                title: item.title,
                state: item.state,
                url: item.url,
                rrf_score: item.rrf_score,
                vec_score: item.vec_score,
                fts_score: item.fts_score,
                display_similarity,
                is_duplicate: display_similarity >= cfg.duplicate_threshold,
            })
        })
        .collect();

    fused.sort_by(|a, b| {
        b.rrf_score
            .partial_cmp(&a.rrf_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.display_similarity
                    .partial_cmp(&a.display_similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
    fused.truncate(cfg.max_results);

    fused
}

fn merge_metadata(
    target: &mut Accumulator,
    item_type: &str,
    number: i64,
    title: &str,
    state: &str,
    url: &str,
) {
    if target.item_type.is_empty() {
        target.item_type = item_type.to_string();
    }
    if target.number == 0 {
        target.number = number;
    }
    if target.title.is_empty() {
        target.title = title.to_string();
    }
    if target.state.is_empty() {
        target.state = state.to_string();
    }
    if target.url.is_empty() {
        target.url = url.to_string();
    }
}
