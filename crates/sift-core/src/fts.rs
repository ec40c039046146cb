//! FTS5 keyword search with BM25 ranking, plus a LIKE-based fallback.
//!
//! BM25 column weights are `(10.0, 1.0)` for `(title, body)`: titles are
//! short and high-signal. Raw BM25 is negative-or-zero (more negative is
//! better); `|raw| / (1 + |raw|)` maps it onto `[0, 1)` monotonically so the
//! score can be compared against cosine similarity downstream.

use anyhow::{Context, Result};
use rusqlite::ToSql;
use serde::Serialize;
use tracing::debug;

use crate::store::Store;

/// One keyword search hit plus normalized relevance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FtsResult {
    pub id: String,
    pub item_type: String,
    pub number: i64,
    pub title: String,
    pub state: String,
    pub url: String,
    pub raw_bm25: f64,
    pub fts_score: f64,
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with", "this", "these",
    "those",
];

impl Store {
    /// Run a keyword search over `items_fts`, best match first.
    ///
    /// The raw query text is tokenized and stop-word filtered here; callers
    /// pass whatever text they have (typically the embeddable content).
    /// An all-stop-word query returns an empty list without error.
    pub fn search_fts(&self, query: &str, exclude_id: &str, limit: usize) -> Result<Vec<FtsResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let terms = tokenize_query(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let fts_query = build_fts5_query(&terms);
        match self.search_fts_native(&fts_query, exclude_id, limit) {
            Ok(results) => Ok(results),
            Err(err) if should_fallback_fts(&err) => {
                debug!("fts5 query unavailable, using LIKE fallback: {err}");
                self.search_fts_fallback(&terms, exclude_id, limit)
            }
            Err(err) => Err(err).context("fts query failed"),
        }
    }

    fn search_fts_native(
        &self,
        fts_query: &str,
        exclude_id: &str,
        limit: usize,
    ) -> rusqlite::Result<Vec<FtsResult>> {
        let mut stmt = self.connection().prepare(
            "SELECT
                 i.id, i.type, i.number, i.title, i.state, i.url,
                 bm25(items_fts, 10.0, 1.0) AS score
             FROM items_fts f
             JOIN items i ON i.rowid = f.rowid
             WHERE items_fts MATCH ?1
               AND i.id != ?2
             ORDER BY score ASC
             LIMIT ?3;",
        )?;

        let rows = stmt.query_map(
            rusqlite::params![fts_query, exclude_id, limit as i64],
            |row| {
                let raw_bm25: f64 = row.get(6)?;
                Ok(FtsResult {
                    id: row.get(0)?,
                    item_type: row.get(1)?,
                    number: row.get(2)?,
                    title: row.get(3)?,
                    state: row.get(4)?,
                    url: row.get(5)?,
                    raw_bm25,
                    fts_score: normalize_bm25(raw_bm25),
                })
            },
        )?;

        rows.collect()
    }

    fn search_fts_fallback(
        &self,
        terms: &[String],
        exclude_id: &str,
        limit: usize,
    ) -> Result<Vec<FtsResult>> {
        let candidate_limit = (limit * 3).max(1);

        let mut sql = String::from(
            "SELECT id, type, number, title, state, url, lower(title || ' ' || body) AS text_blob
             FROM items
             WHERE id != ?",
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(exclude_id.to_string())];

        for term in terms {
            sql.push_str(" AND (lower(title) LIKE ? OR lower(body) LIKE ?)");
            let pattern = format!("%{term}%");
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        sql.push_str(" LIMIT ?;");
        params.push(Box::new(candidate_limit as i64));

        let mut stmt = self
            .connection()
            .prepare(&sql)
            .context("fallback fts query failed")?;

        struct FallbackRow {
            result: FtsResult,
            text_blob: String,
        }

        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter().map(|p| &**p)), |row| {
                Ok(FallbackRow {
                    result: FtsResult {
                        id: row.get(0)?,
                        item_type: row.get(1)?,
                        number: row.get(2)?,
                        title: row.get(3)?,
                        state: row.get(4)?,
                        url: row.get(5)?,
                        raw_bm25: 0.0,
                        fts_score: 0.0,
                    },
                    text_blob: row.get(6)?,
                })
            })
            .context("fallback fts query failed")?;

        let mut scored = Vec::with_capacity(candidate_limit);
        for row in rows {
            let row = row.context("scan fallback fts row")?;
            let count = term_frequency(&row.text_blob, terms);
            scored.push((count, row.result));
        }

        scored.sort_by(|(a_count, a), (b_count, b)| {
            b_count.cmp(a_count).then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(count, mut result)| {
                // Pseudo-relevance: negated term frequency keeps the same
                // shape as raw BM25 under the shared normalization.
                result.raw_bm25 = -(count as f64);
                result.fts_score = normalize_bm25(result.raw_bm25);
                result
            })
            .collect())
    }
}

/// Lowercase, split on non-alphanumeric (underscore counts as a word
/// character), and drop stop words.
pub fn tokenize_query(input: &str) -> Vec<String> {
    input
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Quote each term (doubling embedded quotes) and join with ` AND `.
pub fn build_fts5_query(terms: &[String]) -> String {
    terms
        .iter()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn normalize_bm25(raw_bm25: f64) -> f64 {
    let abs = raw_bm25.abs();
    abs / (1.0 + abs)
}

fn term_frequency(text: &str, terms: &[String]) -> usize {
    terms
        .iter()
        .map(|term| text.matches(term.as_str()).count())
        .sum()
}

fn should_fallback_fts(err: &rusqlite::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    const FALLBACK_SIGNALS: &[&str] = &[
        "no such function: bm25",
        "no such module: fts5",
        "unable to use function match",
        "no such table: items_fts",
        "no such column: items_fts",
        "no such column: f",
    ];
    FALLBACK_SIGNALS.iter().any(|signal| msg.contains(signal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemRecord;

    fn seed(store: &Store, id: &str, number: i64, title: &str, body: &str) {
        store
            .upsert_item(&ItemRecord {
                id: id.to_string(),
                item_type: "issue".to_string(),
                number,
                title: title.to_string(),
                body: body.to_string(),
                state: "open".to_string(),
                url: format!("https://example.com/{id}"),
                ..ItemRecord::default()
            })
            .unwrap();
    }

    #[test]
    fn tokenize_splits_and_drops_stop_words() {
        let terms = tokenize_query("fix (login)* timeout:\"api\"");
        assert_eq!(terms, vec!["fix", "login", "timeout", "api"]);

        assert!(tokenize_query("the in and to").is_empty());
        assert_eq!(tokenize_query("retry_backoff v2"), vec!["retry_backoff", "v2"]);
    }

    #[test]
    fn fts5_query_quotes_terms() {
        let terms = tokenize_query("fix (login)* timeout:\"api\"");
        assert_eq!(
            build_fts5_query(&terms),
            "\"fix\" AND \"login\" AND \"timeout\" AND \"api\""
        );
    }

    #[test]
    fn fts5_query_doubles_embedded_quotes() {
        let terms = vec!["a\"b".to_string()];
        assert_eq!(build_fts5_query(&terms), "\"a\"\"b\"");
    }

    #[test]
    fn normalize_bm25_is_monotone_and_bounded() {
        assert_eq!(normalize_bm25(0.0), 0.0);
        let mid = normalize_bm25(-1.0);
        let high = normalize_bm25(-9.0);
        assert!(mid < high);
        assert!(high < 1.0);
        assert!((normalize_bm25(-1e9) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn stop_word_query_returns_empty() {
        let store = Store::open_in_memory().unwrap();
        seed(&store, "issue/1", 1, "the login bug", "auth fails");
        let results = store.search_fts("the in and to", "", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn search_finds_by_title_and_excludes_self() {
        let store = Store::open_in_memory().unwrap();
        seed(&store, "issue/1", 1, "Login timeout on retry", "auth layer");
        seed(&store, "issue/2", 2, "Login flow broken", "auth timeout");
        seed(&store, "issue/3", 3, "Docs cleanup", "typos only");

        let results = store.search_fts("login timeout", "issue/1", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "issue/2");
        assert!(results[0].raw_bm25 <= 0.0);
        assert!(results[0].fts_score >= 0.0 && results[0].fts_score < 1.0);
    }

    #[test]
    fn search_respects_limit() {
        let store = Store::open_in_memory().unwrap();
        for n in 1..=8_i64 {
            seed(
                &store,
                &format!("issue/{n}"),
                n,
                &format!("login regression {n}"),
                "auth",
            );
        }

        let results = store.search_fts("login regression", "", 3).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn fallback_ranks_by_term_frequency() {
        let store = Store::open_in_memory().unwrap();
        seed(
            &store,
            "issue/1",
            1,
            "login login login",
            "login everywhere",
        );
        seed(&store, "issue/2", 2, "login once", "nothing else");

        let terms = tokenize_query("login");
        let results = store.search_fts_fallback(&terms, "", 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "issue/1");
        assert!(results[0].fts_score > results[1].fts_score);
        assert!(results[0].raw_bm25 < results[1].raw_bm25);
    }

    #[test]
    fn fallback_requires_all_terms() {
        let store = Store::open_in_memory().unwrap();
        seed(&store, "issue/1", 1, "login timeout", "auth");
        seed(&store, "issue/2", 2, "login page", "styling");

        let terms = tokenize_query("login timeout");
        let results = store.search_fts_fallback(&terms, "", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "issue/1");
    }

    #[test]
    fn fallback_excludes_self() {
        let store = Store::open_in_memory().unwrap();
        seed(&store, "issue/1", 1, "login timeout", "auth");

        let terms = tokenize_query("login");
        let results = store.search_fts_fallback(&terms, "issue/1", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn fallback_signal_detection() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("no such module: fts5".to_string()),
        );
        assert!(should_fallback_fts(&err));

        let other = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("database is locked".to_string()),
        );
        assert!(!should_fallback_fts(&other));
    }
}
