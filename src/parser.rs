//! Log parser
//!
//! Turns the line stream of `git log --numstat` into commit groups.
//!
//! Input format:
//! ```text
//! |<short-id><SEP><summary><SEP><author-name><SEP><author-email><SEP><iso-timestamp>
//! <added>\t<deleted>\t<path>
//! <added>\t<deleted>\t<path>
//!
//! |<short-id><SEP>...
//! ```
//!
//! Parsing is a left fold over the lines: [`LogParser::step`] takes the
//! current [`ParserState`] and one line and hands back the next state plus
//! any commit group the line completed. Nothing here touches a process or
//! a database.

use chrono::{DateTime, NaiveDateTime};

use crate::error::ParseError;
use crate::model::{Commit, CommitGroup, FileChange, LineCount, TIMESTAMP_FORMAT};

/// First character of every commit line
pub const COMMIT_MARKER: char = '|';

/// Field layout of commit lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFormat {
    pub separator: String,
}

impl LogFormat {
    /// ASCII unit separator between fields. Cannot be typed into a summary.
    pub fn unit_separator() -> Self {
        Self {
            separator: "\u{1f}".to_string(),
        }
    }

    /// `||` between fields, as produced by older invocations.
    pub fn double_pipe() -> Self {
        Self {
            separator: "||".to_string(),
        }
    }

    /// `--pretty` argument that makes git emit commit lines in this format.
    pub fn pretty_arg(&self) -> String {
        let sep: String = self
            .separator
            .chars()
            .map(|c| match c {
                '%' => "%%".to_string(),
                c if c.is_ascii_control() => format!("%x{:02x}", c as u32),
                c => c.to_string(),
            })
            .collect();

        format!(
            "--pretty=format:{}%h{sep}%s{sep}%an{sep}%ae{sep}%cI",
            COMMIT_MARKER,
            sep = sep
        )
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::unit_separator()
    }
}

/// Accumulator threaded through [`LogParser::step`]
#[derive(Debug, Default)]
pub struct ParserState {
    line: usize,
    current: Option<CommitGroup>,
}

impl ParserState {
    /// Id of the commit that file-change lines currently belong to
    pub fn current_commit_id(&self) -> Option<&str> {
        self.current.as_ref().map(|g| g.commit.id.as_str())
    }

    pub fn lines_seen(&self) -> usize {
        self.line
    }
}

pub struct LogParser {
    repo_name: String,
    format: LogFormat,
}

impl LogParser {
    pub fn new(repo_name: impl Into<String>, format: LogFormat) -> Self {
        Self {
            repo_name: repo_name.into(),
            format,
        }
    }

    /// Consume one raw line.
    ///
    /// A commit line closes the group in progress (returned) and opens a new
    /// one. A file-change line is appended to the group in progress. Blank
    /// lines only advance the line counter.
    pub fn step(
        &self,
        state: ParserState,
        raw: &str,
    ) -> Result<(ParserState, Option<CommitGroup>), ParseError> {
        let ParserState { line, current } = state;
        let line_no = line + 1;
        let text = raw.trim_end_matches(&['\r', '\n'][..]);

        if text.trim().is_empty() {
            return Ok((ParserState { line: line_no, current }, None));
        }

        if text.starts_with(COMMIT_MARKER) {
            let commit = self.parse_commit_line(line_no, text)?;
            let next = ParserState {
                line: line_no,
                current: Some(CommitGroup {
                    commit,
                    files: Vec::new(),
                }),
            };
            return Ok((next, current));
        }

        let Some(mut group) = current else {
            return Err(ParseError::FileChangeWithoutCommit {
                line: line_no,
                content: text.to_string(),
            });
        };

        let change = parse_file_change_line(line_no, &group.commit.id, text)?;
        group.files.push(change);

        Ok((
            ParserState {
                line: line_no,
                current: Some(group),
            },
            None,
        ))
    }

    /// Flush the group still in progress at end of input
    pub fn finish(&self, state: ParserState) -> Option<CommitGroup> {
        state.current
    }

    /// Parse a commit line into a [`Commit`].
    ///
    /// The id is split off the left (a hash never contains the separator),
    /// then timestamp, email and name off the right; the summary is whatever
    /// is left in between, separators included.
    pub fn parse_commit_line(&self, line_no: usize, text: &str) -> Result<Commit, ParseError> {
        let malformed = || ParseError::MalformedCommitLine {
            line: line_no,
            content: text.to_string(),
        };
        let sep = self.format.separator.as_str();

        let body = text.strip_prefix(COMMIT_MARKER).ok_or_else(malformed)?;
        let (id, rest) = body.split_once(sep).ok_or_else(malformed)?;

        let mut tail = rest.rsplitn(4, sep);
        let (Some(timestamp), Some(email), Some(name), Some(summary)) =
            (tail.next(), tail.next(), tail.next(), tail.next())
        else {
            return Err(malformed());
        };

        let id = id.trim();
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(malformed());
        }

        let committed_on = parse_timestamp(timestamp.trim()).ok_or_else(|| {
            ParseError::InvalidTimestamp {
                line: line_no,
                value: timestamp.to_string(),
            }
        })?;

        Ok(Commit {
            id: id.to_string(),
            repo_name: self.repo_name.clone(),
            summary: summary.to_string(),
            author_name: name.to_string(),
            author_email: email.to_string(),
            committed_on,
        })
    }
}

/// Parse `<added> <deleted> <path>`.
///
/// The two counts are whitespace-delimited tokens; the path is the remainder
/// of the line after the separator that follows the second count, and may
/// itself contain whitespace.
pub fn parse_file_change_line(
    line_no: usize,
    commit_id: &str,
    text: &str,
) -> Result<FileChange, ParseError> {
    let malformed = || ParseError::MalformedFileChangeLine {
        line: line_no,
        content: text.to_string(),
    };

    let (added, rest) = next_token(text).ok_or_else(malformed)?;
    let (deleted, rest) = next_token(rest).ok_or_else(malformed)?;

    let added = LineCount::parse(added).ok_or_else(malformed)?;
    let deleted = LineCount::parse(deleted).ok_or_else(malformed)?;

    let path = match rest.strip_prefix('\t') {
        Some(path) => path,
        None => rest.trim_start(),
    };
    if path.is_empty() {
        return Err(malformed());
    }

    Ok(FileChange {
        commit_id: commit_id.to_string(),
        path: path.to_string(),
        added,
        deleted,
    })
}

/// Parse a complete log held in memory
pub fn parse_lines<I, S>(parser: &LogParser, lines: I) -> Result<Vec<CommitGroup>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups = Vec::new();
    let mut state = ParserState::default();

    for line in lines {
        let (next, done) = parser.step(state, line.as_ref())?;
        state = next;
        groups.extend(done);
    }
    groups.extend(parser.finish(state));

    Ok(groups)
}

/// Split off the first whitespace-delimited token. The returned rest starts
/// at the whitespace that ended the token.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace)?;
    Some((&s[..end], &s[end..]))
}

/// Strict ISO 8601 with any offset (`%cI`), normalised to UTC. Offset-less
/// timestamps in the store encoding are taken as UTC already.
fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT))
        .ok()
}
