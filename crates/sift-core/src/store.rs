//! Store lifecycle: open, configure, migrate.
//!
//! A `Store` wraps exactly one SQLite connection; the pipeline holds it from
//! open to drop. Migrations are recorded in an append-only `schema_version`
//! table and each one runs inside its own transaction, so a partially applied
//! migration rolls back as a unit.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, Transaction};
use tracing::debug;

use crate::schema;

const LATEST_SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    name: &'static str,
    up: fn(&Transaction<'_>) -> rusqlite::Result<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_items",
        up: migrate_v1,
    },
    Migration {
        version: 2,
        name: "create_search_tables",
        up: migrate_v2,
    },
];

/// Handle for the single-file triage index.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the index at `path` and bring it to the latest
    /// schema version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            bail!("db path is required");
        }

        // Must happen before the first connection so the vec0 module is
        // present on every handle this process opens.
        crate::vec_extension::ensure_registered();

        let mut conn = Connection::open(path)
            .with_context(|| format!("open sqlite db at {}", path.display()))?;
        configure_connection(&conn).context("configure sqlite db")?;
        apply_migrations(&mut conn).context("apply migrations")?;

        Ok(Self { conn })
    }

    /// Open a throwaway in-memory index, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        crate::vec_extension::ensure_registered();

        let mut conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        configure_connection(&conn).context("configure sqlite db")?;
        apply_migrations(&mut conn).context("apply migrations")?;

        Ok(Self { conn })
    }

    /// The underlying connection, exposed for migrations tooling and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
}

/// Apply all pending migrations in ascending version order.
///
/// Safe to call any number of times: versions at or below the recorded
/// maximum are skipped, so re-running at the latest version is a no-op.
///
/// # Errors
///
/// Returns an error if any migration statement fails; the failing
/// migration's transaction is rolled back and no version row is written.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(schema::SCHEMA_VERSION_TABLE_SQL)
        .context("ensure schema_version table")?;

    let current = current_schema_version(conn).context("read current schema version")?;

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }

        apply_migration(conn, migration)
            .with_context(|| format!("apply migration v{} ({})", migration.version, migration.name))?;
    }

    Ok(())
}

/// Highest migration version this build understands.
pub fn latest_schema_version() -> i64 {
    LATEST_SCHEMA_VERSION
}

/// Highest applied migration version, 0 for a fresh database.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version;",
        [],
        |row| row.get(0),
    )
}

fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let tx = conn.transaction()?;

    (migration.up)(&tx)?;

    let applied_at = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
    tx.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2);",
        rusqlite::params![migration.version, applied_at],
    )?;

    tx.commit()?;
    Ok(())
}

fn migrate_v1(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    for stmt in schema::MIGRATION_V1_STMTS {
        tx.execute_batch(stmt)?;
    }
    Ok(())
}

fn migrate_v2(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    let native_fts = ensure_fts_table(tx)?;

    let triggers = if native_fts {
        schema::FTS_TRIGGER_STMTS
    } else {
        schema::FTS_FALLBACK_TRIGGER_STMTS
    };
    for stmt in triggers {
        tx.execute_batch(stmt)?;
    }

    ensure_vector_table(tx)
}

/// Returns `true` when the real FTS5 virtual table was created, `false` when
/// the plain fallback table stands in for it.
fn ensure_fts_table(tx: &Transaction<'_>) -> rusqlite::Result<bool> {
    match tx.execute_batch(schema::FTS_VIRTUAL_TABLE_SQL) {
        Ok(()) => Ok(true),
        Err(err) if is_module_unavailable(&err, "fts5") => {
            debug!("fts5 module unavailable, creating plain items_fts table");
            tx.execute_batch(schema::FTS_FALLBACK_TABLE_SQL)?;
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn ensure_vector_table(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    match tx.execute_batch(schema::VEC_VIRTUAL_TABLE_SQL) {
        Ok(()) => Ok(()),
        Err(err) if is_module_unavailable(&err, "vec0") => {
            debug!("vec0 module unavailable, creating plain items_vec table");
            tx.execute_batch(schema::VEC_FALLBACK_TABLE_SQL)
        }
        Err(err) => Err(err),
    }
}

fn is_module_unavailable(err: &rusqlite::Error, module: &str) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains(&format!("no such module: {module}"))
}
