//! DDL for the triage index.
//!
//! Two migrations: v1 creates the `items` table, v2 adds the search tables.
//! The FTS5 and vec0 virtual tables each have a plain-table fallback with the
//! same logical shape so the index stays usable on SQLite builds that lack
//! the modules; the search paths detect the degraded tables at query time.

pub const SCHEMA_VERSION_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
";

pub const MIGRATION_V1_STMTS: &[&str] = &[
    "
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    number INTEGER NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    author TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT 'open',
    labels TEXT NOT NULL DEFAULT '[]',
    files TEXT NOT NULL DEFAULT '[]',
    url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
",
    "CREATE INDEX IF NOT EXISTS idx_items_type ON items(type);",
    "CREATE INDEX IF NOT EXISTS idx_items_number ON items(number);",
    "CREATE INDEX IF NOT EXISTS idx_items_state ON items(state);",
];

pub const FTS_VIRTUAL_TABLE_SQL: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS items_fts USING fts5(
    title,
    body,
    content='items',
    content_rowid='rowid',
    tokenize='porter unicode61'
);
";

/// Plain-table stand-in when the fts5 module is missing.
pub const FTS_FALLBACK_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS items_fts (
    rowid INTEGER PRIMARY KEY,
    title TEXT,
    body TEXT
);
";

/// Sync triggers for the real FTS5 table. External-content FTS5 requires the
/// special `'delete'` command with the old column values; a plain DELETE
/// cannot un-index a row whose content is already gone.
pub const FTS_TRIGGER_STMTS: &[&str] = &[
    "
CREATE TRIGGER IF NOT EXISTS items_fts_insert AFTER INSERT ON items BEGIN
    INSERT INTO items_fts(rowid, title, body) VALUES (new.rowid, new.title, new.body);
END;
",
    "
CREATE TRIGGER IF NOT EXISTS items_fts_delete AFTER DELETE ON items BEGIN
    INSERT INTO items_fts(items_fts, rowid, title, body)
    VALUES ('delete', old.rowid, old.title, old.body);
END;
",
    "
CREATE TRIGGER IF NOT EXISTS items_fts_update AFTER UPDATE ON items BEGIN
    INSERT INTO items_fts(items_fts, rowid, title, body)
    VALUES ('delete', old.rowid, old.title, old.body);
    INSERT INTO items_fts(rowid, title, body) VALUES (new.rowid, new.title, new.body);
END;
",
];

/// Sync triggers for the plain fallback table, which has no command column.
pub const FTS_FALLBACK_TRIGGER_STMTS: &[&str] = &[
    "
CREATE TRIGGER IF NOT EXISTS items_fts_insert AFTER INSERT ON items BEGIN
    INSERT INTO items_fts(rowid, title, body) VALUES (new.rowid, new.title, new.body);
END;
",
    "
CREATE TRIGGER IF NOT EXISTS items_fts_delete AFTER DELETE ON items BEGIN
    DELETE FROM items_fts WHERE rowid = old.rowid;
END;
",
    "
CREATE TRIGGER IF NOT EXISTS items_fts_update AFTER UPDATE ON items BEGIN
    DELETE FROM items_fts WHERE rowid = old.rowid;
    INSERT INTO items_fts(rowid, title, body) VALUES (new.rowid, new.title, new.body);
END;
",
];

pub const VEC_VIRTUAL_TABLE_SQL: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS items_vec USING vec0(
    id TEXT PRIMARY KEY,
    embedding float[1536] distance_metric=cosine
);
";

/// Plain-table stand-in when the vec0 module is missing.
pub const VEC_FALLBACK_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS items_vec (
    id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL
);
";
