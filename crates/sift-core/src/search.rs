//! Dense-vector k-NN lookup.
//!
//! The lookup is deliberately split in two steps: a vector-only query against
//! `items_vec`, then per-hit metadata hydration from `items`. Joining the
//! vec0 virtual table with `items` in a single statement hangs indefinitely
//! on affected sqlite-vec builds, so the two-step shape is a correctness
//! requirement, not an optimization.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::store::Store;
use crate::vector::{clamp01, cosine_distance, decode_vector, encode_vector};

/// One vector similarity hit, hydrated with item metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VectorResult {
    pub id: String,
    pub item_type: String,
    pub number: i64,
    pub title: String,
    pub state: String,
    pub url: String,
    pub distance: f64,
    pub vec_score: f64,
}

#[derive(Debug, Clone)]
struct VectorHit {
    id: String,
    distance: f64,
}

impl Store {
    /// Return up to `limit` nearest stored embeddings, best first.
    ///
    /// `exclude_id` drops the event's own row so a re-ingested item never
    /// matches itself. An empty query or non-positive limit yields an empty
    /// list without error. Hits whose item metadata is missing are skipped.
    pub fn search_vector(
        &self,
        query_embedding: &[f32],
        exclude_id: &str,
        limit: usize,
    ) -> Result<Vec<VectorResult>> {
        if query_embedding.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // Headroom for the self-exclusion and for vector rows whose item
        // metadata has gone missing.
        let candidate_limit = (limit * 3).max(1);
        let hits = self.vector_only_search(query_embedding, candidate_limit)?;

        let mut results = Vec::with_capacity(limit);
        for hit in hits {
            if hit.id == exclude_id {
                continue;
            }

            let Some(meta) = self.lookup_item_meta(&hit.id)? else {
                continue;
            };

            results.push(VectorResult {
                id: meta.id,
                item_type: meta.item_type,
                number: meta.number,
                title: meta.title,
                state: meta.state,
                url: meta.url,
                distance: hit.distance,
                vec_score: clamp01(1.0 - hit.distance),
            });

            if results.len() >= limit {
                break;
            }
        }

        Ok(results)
    }

    fn vector_only_search(
        &self,
        query_embedding: &[f32],
        candidate_limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let serialized = encode_vector(query_embedding);

        match self.vector_native_search(&serialized, candidate_limit) {
            Ok(hits) => Ok(hits),
            Err(err) if should_fallback_to_brute_force(&err) => {
                debug!("vec0 query unavailable, scanning stored vectors: {err}");
                self.vector_brute_force_search(query_embedding, candidate_limit)
            }
            Err(err) => Err(err).context("vector query failed"),
        }
    }

    fn vector_native_search(
        &self,
        serialized: &[u8],
        candidate_limit: usize,
    ) -> rusqlite::Result<Vec<VectorHit>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, distance
             FROM items_vec
             WHERE embedding MATCH ?1 AND k = ?2;",
        )?;

        let rows = stmt.query_map(
            rusqlite::params![serialized, candidate_limit as i64],
            |row| {
                Ok(VectorHit {
                    id: row.get(0)?,
                    distance: row.get(1)?,
                })
            },
        )?;

        rows.collect()
    }

    fn vector_brute_force_search(
        &self,
        query_embedding: &[f32],
        candidate_limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT id, embedding FROM items_vec;")
            .context("fallback vector query failed")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .context("fallback vector query failed")?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, blob) = row.context("scan fallback vector row")?;
            let Ok(candidate) = decode_vector(&blob) else {
                continue;
            };

            hits.push(VectorHit {
                distance: cosine_distance(query_embedding, &candidate),
                id,
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(candidate_limit);

        Ok(hits)
    }
}

fn should_fallback_to_brute_force(err: &rusqlite::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    const FALLBACK_SIGNALS: &[&str] = &[
        "no such module: vec0",
        "no such column: distance",
        "no such column: k",
        "unable to use function match",
        "no such function: vec_distance",
    ];
    FALLBACK_SIGNALS.iter().any(|signal| msg.contains(signal))
}
