//! Database module for loadstats
//!
//! SQLite storage for commits and the files they touched.

mod schema;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Transaction};
use std::path::Path;

use crate::model::{Commit, CommitGroup, FileChange, LineCount, TIMESTAMP_FORMAT};

pub use schema::SCHEMA_VERSION;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the store at `path` and bring its schema up to date
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Cascades are only enforced when foreign keys are switched on
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    pub fn initialize_schema(&self) -> Result<()> {
        schema::run_migrations(&self.conn)
    }

    /// Newest `committed_on` stored for a repository, in the store encoding
    pub fn max_committed_on(&self, repo_name: &str) -> Result<Option<String>> {
        let value = self.conn.query_row(
            "SELECT MAX(committed_on) FROM commits WHERE repo_name = ?1",
            params![repo_name],
            |row| row.get::<_, Option<String>>(0),
        )?;
        Ok(value)
    }

    /// Start the transaction that all writes of one sync go through
    pub fn begin(&mut self) -> Result<SyncWriter<'_>> {
        let tx = self.conn.transaction()?;
        Ok(SyncWriter {
            tx,
            commits: 0,
            file_changes: 0,
        })
    }

    // === Queries ===

    pub fn commit_count(&self, repo_name: Option<&str>) -> Result<usize> {
        let count: i64 = match repo_name {
            Some(repo) => self.conn.query_row(
                "SELECT COUNT(*) FROM commits WHERE repo_name = ?1",
                params![repo],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }

    pub fn file_change_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM commit_files", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Commits of one repository, newest first
    pub fn commits_for_repo(&self, repo_name: &str) -> Result<Vec<Commit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, repo_name, summary, author_name, author_email, committed_on
             FROM commits WHERE repo_name = ?1
             ORDER BY committed_on DESC, rowid",
        )?;

        let rows = stmt.query_map(params![repo_name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut commits = Vec::new();
        for row in rows {
            let (id, repo_name, summary, author_name, author_email, committed_on) = row?;
            let committed_on = NaiveDateTime::parse_from_str(&committed_on, TIMESTAMP_FORMAT)
                .with_context(|| format!("Commit {} has an invalid committed_on {:?}", id, committed_on))?;
            commits.push(Commit {
                id,
                repo_name,
                summary,
                author_name,
                author_email,
                committed_on,
            });
        }

        Ok(commits)
    }

    /// File changes of one commit, in the order they were reported
    pub fn file_changes_for(&self, commit_id: &str) -> Result<Vec<FileChange>> {
        let mut stmt = self.conn.prepare(
            "SELECT commit_id, path, added, deleted FROM commit_files
             WHERE commit_id = ?1 ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![commit_id], |row| {
            Ok(FileChange {
                commit_id: row.get(0)?,
                path: row.get(1)?,
                added: row.get::<_, LineCount>(2)?,
                deleted: row.get::<_, LineCount>(3)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a commit; its file changes go with it. Returns whether it existed.
    pub fn delete_commit(&self, commit_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM commits WHERE id = ?1", params![commit_id])?;
        Ok(deleted > 0)
    }
}

/// Write side of a sync run.
///
/// Nothing is visible to other connections until [`SyncWriter::commit`];
/// dropping the writer rolls everything back.
pub struct SyncWriter<'a> {
    tx: Transaction<'a>,
    commits: usize,
    file_changes: usize,
}

impl SyncWriter<'_> {
    pub fn insert_commit(&mut self, commit: &Commit) -> Result<()> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO commits (id, repo_name, summary, author_name, author_email, committed_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        stmt.execute(params![
            commit.id,
            commit.repo_name,
            commit.summary,
            commit.author_name,
            commit.author_email,
            commit.committed_on_text(),
        ])
        .with_context(|| format!("Failed to insert commit {}", commit.id))?;

        self.commits += 1;
        Ok(())
    }

    pub fn insert_file_change(&mut self, change: &FileChange) -> Result<()> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO commit_files (commit_id, path, added, deleted) VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![change.commit_id, change.path, change.added, change.deleted])
            .with_context(|| {
                format!("Failed to insert file change {} for commit {}", change.path, change.commit_id)
            })?;

        self.file_changes += 1;
        Ok(())
    }

    /// Insert a commit followed by its file changes
    pub fn insert_group(&mut self, group: &CommitGroup) -> Result<()> {
        self.insert_commit(&group.commit)?;
        for change in &group.files {
            self.insert_file_change(change)?;
        }
        Ok(())
    }

    /// Commit the transaction. Returns the number of commits and file changes written.
    pub fn commit(self) -> Result<(usize, usize)> {
        let counts = (self.commits, self.file_changes);
        self.tx.commit().context("Failed to commit sync transaction")?;
        Ok(counts)
    }
}
