//! Commit and file-change records

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt;

/// Textual encoding of `committed_on` in the store and of sync bounds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single commit, keyed by its short hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub id: String,
    pub repo_name: String,
    pub summary: String,
    pub author_name: String,
    pub author_email: String,
    /// UTC, second precision
    pub committed_on: NaiveDateTime,
}

impl Commit {
    pub fn committed_on_text(&self) -> String {
        self.committed_on.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// One file touched by a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub commit_id: String,
    pub path: String,
    pub added: LineCount,
    pub deleted: LineCount,
}

/// Added/deleted line count as reported by `git log --numstat`.
///
/// Binary files report a marker (`-`) instead of a number; the marker is kept
/// verbatim rather than coerced to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LineCount {
    Lines(u64),
    Sentinel(String),
}

impl LineCount {
    /// Parse a numstat count token. Returns `None` for anything that is
    /// neither all digits nor all dashes.
    pub fn parse(token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        if token.bytes().all(|b| b.is_ascii_digit()) {
            return token.parse().ok().map(LineCount::Lines);
        }
        if token.bytes().all(|b| b == b'-') {
            return Some(LineCount::Sentinel(token.to_string()));
        }
        None
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, LineCount::Sentinel(_))
    }
}

impl fmt::Display for LineCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineCount::Lines(n) => write!(f, "{}", n),
            LineCount::Sentinel(s) => f.write_str(s),
        }
    }
}

impl ToSql for LineCount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            LineCount::Lines(n) => i64::try_from(*n)
                .map(ToSqlOutput::from)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))),
            LineCount::Sentinel(s) => Ok(ToSqlOutput::from(s.as_str())),
        }
    }
}

impl FromSql for LineCount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => u64::try_from(n)
                .map(LineCount::Lines)
                .map_err(|_| FromSqlError::OutOfRange(n)),
            ValueRef::Text(text) => std::str::from_utf8(text)
                .map(|s| LineCount::Sentinel(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A commit followed by the files it touched, in log order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitGroup {
    pub commit: Commit,
    pub files: Vec<FileChange>,
}
