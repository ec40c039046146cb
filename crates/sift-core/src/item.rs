//! Item metadata and embedding upserts.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;

use crate::store::Store;
use crate::vector::encode_vector;

/// Canonical record for one issue or pull request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemRecord {
    pub id: String,
    pub item_type: String,
    pub number: i64,
    pub title: String,
    pub body: String,
    pub author: String,
    pub state: String,
    pub labels: Vec<String>,
    pub files: Vec<String>,
    pub url: String,

    /// `None` means "stamp with the current time on upsert".
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Subset of item columns needed to hydrate a search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemMeta {
    pub id: String,
    pub item_type: String,
    pub number: i64,
    pub title: String,
    pub state: String,
    pub url: String,
}

/// Build the stable item key `{kind}/{number}`.
///
/// Pull-request event kinds (`pr`, `pull_request`, `pull_request_target`)
/// all map to the `pr/` prefix.
pub fn build_item_id(kind: &str, number: i64) -> String {
    let kind = kind.trim().to_lowercase();
    match kind.as_str() {
        "issue" => format!("issue/{number}"),
        "pr" | "pull_request" | "pull_request_target" => format!("pr/{number}"),
        other => format!("{other}/{number}"),
    }
}

impl Store {
    /// Insert or update one item row.
    ///
    /// On conflict the original `created_at` is preserved and `updated_at`
    /// is refreshed; every other column takes the incoming value.
    ///
    /// # Errors
    ///
    /// Fails when `id` or `item_type` is blank or `number` is not positive.
    pub fn upsert_item(&self, rec: &ItemRecord) -> Result<()> {
        if rec.id.trim().is_empty() {
            bail!("item id is required");
        }
        if rec.item_type.trim().is_empty() {
            bail!("item type is required");
        }
        if rec.number <= 0 {
            bail!("item number must be positive");
        }

        let labels_json = serde_json::to_string(&rec.labels).context("marshal labels")?;
        let files_json = serde_json::to_string(&rec.files).context("marshal files")?;

        let now = Utc::now();
        let created_at = rec.created_at.unwrap_or(now);
        let updated_at = rec.updated_at.unwrap_or(now);

        self.connection()
            .execute(
                "INSERT INTO items(
                     id, type, number, title, body, author, state, labels, files, url, created_at, updated_at
                 ) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(id) DO UPDATE SET
                     type=excluded.type,
                     number=excluded.number,
                     title=excluded.title,
                     body=excluded.body,
                     author=excluded.author,
                     state=excluded.state,
                     labels=excluded.labels,
                     files=excluded.files,
                     url=excluded.url,
                     updated_at=excluded.updated_at;",
                rusqlite::params![
                    rec.id,
                    rec.item_type,
                    rec.number,
                    rec.title,
                    rec.body,
                    rec.author,
                    rec.state,
                    labels_json,
                    files_json,
                    rec.url,
                    created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                    updated_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                ],
            )
            .context("upsert item")?;

        Ok(())
    }

    /// Insert or replace the embedding stored for `id`.
    ///
    /// Some vec0 builds reject `INSERT OR REPLACE` on an existing primary
    /// key, so a unique-constraint failure falls back to delete-then-insert.
    /// Either way exactly one row holds the new bytes afterwards.
    pub fn upsert_vector(&self, id: &str, embedding: &[f32]) -> Result<()> {
        if id.trim().is_empty() {
            bail!("item id is required");
        }
        if embedding.is_empty() {
            bail!("embedding is required");
        }

        let serialized = encode_vector(embedding);
        let conn = self.connection();

        match conn.execute(
            "INSERT OR REPLACE INTO items_vec(id, embedding) VALUES(?1, ?2);",
            rusqlite::params![id, serialized],
        ) {
            Ok(_) => return Ok(()),
            Err(err) if is_unique_constraint_error(&err) => {}
            Err(err) => return Err(err).context("upsert vector"),
        }

        conn.execute("DELETE FROM items_vec WHERE id = ?1;", rusqlite::params![id])
            .context("upsert vector delete existing")?;
        conn.execute(
            "INSERT INTO items_vec(id, embedding) VALUES(?1, ?2);",
            rusqlite::params![id, serialized],
        )
        .context("upsert vector insert")?;

        Ok(())
    }

    /// Fetch the metadata needed to hydrate a search hit.
    ///
    /// `Ok(None)` is a normal outcome: the vector table can carry ids whose
    /// item row was removed out of band, and such hits are silently dropped.
    pub fn lookup_item_meta(&self, id: &str) -> Result<Option<ItemMeta>> {
        self.connection()
            .query_row(
                "SELECT id, type, number, title, state, url
                 FROM items
                 WHERE id = ?1;",
                rusqlite::params![id],
                |row| {
                    Ok(ItemMeta {
                        id: row.get(0)?,
                        item_type: row.get(1)?,
                        number: row.get(2)?,
                        title: row.get(3)?,
                        state: row.get(4)?,
                        url: row.get(5)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("lookup item meta for {id}"))
    }
}

fn is_unique_constraint_error(err: &rusqlite::Error) -> bool {
    err.to_string().to_lowercase().contains("unique constraint failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::decode_vector;
    use chrono::TimeZone;

    fn record(id: &str, number: i64, title: &str) -> ItemRecord {
        ItemRecord {
            id: id.to_string(),
            item_type: "issue".to_string(),
            number,
            title: title.to_string(),
            body: format!("{title} body"),
            author: "octocat".to_string(),
            state: "open".to_string(),
            labels: vec!["bug".to_string()],
            files: Vec::new(),
            url: format!("https://example.com/{id}"),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn build_item_id_aliases_pr_kinds() {
        assert_eq!(build_item_id("issue", 7), "issue/7");
        assert_eq!(build_item_id("pr", 7), "pr/7");
        assert_eq!(build_item_id("pull_request", 7), "pr/7");
        assert_eq!(build_item_id("pull_request_target", 7), "pr/7");
        assert_eq!(build_item_id(" Issue ", 7), "issue/7");
        assert_eq!(build_item_id("release", 7), "release/7");
    }

    #[test]
    fn upsert_item_validates_inputs() {
        let store = Store::open_in_memory().unwrap();

        let mut rec = record("", 1, "x");
        assert!(store.upsert_item(&rec).is_err());

        rec = record("issue/1", 1, "x");
        rec.item_type = String::new();
        assert!(store.upsert_item(&rec).is_err());

        rec = record("issue/1", 0, "x");
        assert!(store.upsert_item(&rec).is_err());
    }

    #[test]
    fn upsert_item_round_trips_metadata() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_item(&record("issue/1", 1, "Login timeout")).unwrap();

        let meta = store.lookup_item_meta("issue/1").unwrap().unwrap();
        assert_eq!(meta.item_type, "issue");
        assert_eq!(meta.number, 1);
        assert_eq!(meta.title, "Login timeout");
        assert_eq!(meta.state, "open");
    }

    #[test]
    fn upsert_item_preserves_created_at_on_conflict() {
        let store = Store::open_in_memory().unwrap();

        let first_created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut rec = record("issue/1", 1, "original");
        rec.created_at = Some(first_created);
        rec.updated_at = Some(first_created);
        store.upsert_item(&rec).unwrap();

        let later = Utc.with_ymd_and_hms(2025, 6, 7, 8, 9, 10).unwrap();
        rec.title = "edited".to_string();
        rec.created_at = Some(later);
        rec.updated_at = Some(later);
        store.upsert_item(&rec).unwrap();

        let (created_at, updated_at, title): (String, String, String) = store
            .connection()
            .query_row(
                "SELECT created_at, updated_at, title FROM items WHERE id = 'issue/1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();

        assert!(created_at.starts_with("2024-01-02"), "created_at = {created_at}");
        assert!(updated_at.starts_with("2025-06-07"), "updated_at = {updated_at}");
        assert_eq!(title, "edited");
    }

    #[test]
    fn upsert_item_serializes_labels_and_files_as_json() {
        let store = Store::open_in_memory().unwrap();
        let mut rec = record("pr/2", 2, "Add retry");
        rec.item_type = "pr".to_string();
        rec.labels = vec!["backend".to_string(), "auth".to_string()];
        rec.files = vec!["src/auth.rs".to_string()];
        store.upsert_item(&rec).unwrap();

        let (labels, files): (String, String) = store
            .connection()
            .query_row(
                "SELECT labels, files FROM items WHERE id = 'pr/2'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();

        assert_eq!(labels, r#"["backend","auth"]"#);
        assert_eq!(files, r#"["src/auth.rs"]"#);
    }

    #[test]
    fn upsert_vector_validates_inputs() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.upsert_vector("", &[1.0]).is_err());
        assert!(store.upsert_vector("issue/1", &[]).is_err());
    }

    #[test]
    fn upsert_vector_replaces_existing_row() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_item(&record("issue/1", 1, "x")).unwrap();

        store.upsert_vector("issue/1", &[1.0, 0.0]).unwrap();
        store.upsert_vector("issue/1", &[0.0, 1.0]).unwrap();

        let rows: i64 = store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM items_vec WHERE id = 'issue/1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);

        let blob: Vec<u8> = store
            .connection()
            .query_row(
                "SELECT embedding FROM items_vec WHERE id = 'issue/1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(decode_vector(&blob).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn lookup_item_meta_missing_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.lookup_item_meta("issue/404").unwrap().is_none());
    }

    #[test]
    fn fts_triggers_track_item_changes() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let matches = |term: &str| -> i64 {
            conn.query_row(
                "SELECT COUNT(*) FROM items_fts WHERE items_fts MATCH ?1",
                rusqlite::params![term],
                |row| row.get(0),
            )
            .unwrap()
        };

        store.upsert_item(&record("issue/1", 1, "alpha")).unwrap();
        assert_eq!(matches("alpha"), 1);

        store.upsert_item(&record("issue/1", 1, "beta")).unwrap();
        assert_eq!(matches("alpha"), 0, "stale term still indexed after update");
        assert_eq!(matches("beta"), 1);

        conn.execute("DELETE FROM items WHERE id = 'issue/1'", []).unwrap();
        assert_eq!(matches("beta"), 0, "index row should die with the item");
    }
}
