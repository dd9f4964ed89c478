//! Database schema and migrations
//!
//! The schema version lives in `PRAGMA user_version` so the store holds only
//! the two data tables.

use anyhow::Result;
use rusqlite::{params, Connection};
use tracing::info;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Create or upgrade the schema. Safe to call on every open.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version > SCHEMA_VERSION {
        anyhow::bail!(
            "Store schema version {} is newer than this build supports ({})",
            current_version,
            SCHEMA_VERSION
        );
    }

    if current_version < 1 {
        if is_legacy_layout(conn)? {
            upgrade_legacy_layout(conn)?;
        }
        migrate_v1(conn)?;
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Unversioned stores written by the first loader name the file columns
/// `id` and `name`.
fn is_legacy_layout(conn: &Connection) -> Result<bool> {
    Ok(has_column(conn, "commit_files", "id")? && has_column(conn, "commit_files", "name")?)
}

/// Rename the legacy file columns in place. SQLite rewrites the foreign key
/// along with the column, so rows and the cascade are kept.
fn upgrade_legacy_layout(conn: &Connection) -> Result<()> {
    info!("Upgrading unversioned store layout");
    conn.execute_batch(
        r#"
        BEGIN;
        ALTER TABLE commit_files RENAME COLUMN id TO commit_id;
        ALTER TABLE commit_files RENAME COLUMN name TO path;
        COMMIT;
        "#,
    )?;

    Ok(())
}

/// Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            id TEXT PRIMARY KEY NOT NULL,
            repo_name TEXT NOT NULL,
            summary TEXT NOT NULL,
            author_name TEXT NOT NULL,
            author_email TEXT NOT NULL,
            committed_on TEXT NOT NULL
        );

        -- added/deleted hold an integer, or the text marker git prints for binary files
        CREATE TABLE IF NOT EXISTS commit_files (
            commit_id TEXT NOT NULL,
            path TEXT NOT NULL,
            added INTEGER NOT NULL,
            deleted INTEGER NOT NULL,
            CONSTRAINT fk_commit_id
                FOREIGN KEY (commit_id)
                REFERENCES commits (id)
                ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_commits_repo_committed_on ON commits(repo_name, committed_on);
        CREATE INDEX IF NOT EXISTS idx_commit_files_commit_id ON commit_files(commit_id);

        PRAGMA user_version = 1;
        "#,
    )?;

    Ok(())
}
