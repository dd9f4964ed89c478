//! Log sources
//!
//! A log source produces raw `git log --numstat` style lines, optionally
//! limited to commits at or after a [`SyncBound`]. The git-backed source
//! lives in [`crate::git::log`]; [`MemoryLogSource`] serves canned lines.

use anyhow::Result;

use crate::parser::{LogFormat, LogParser, COMMIT_MARKER};
use crate::planner::SyncBound;

/// Boxed line stream handed out by a [`LogSource`]
pub type LogLines<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

pub trait LogSource {
    /// Layout of the commit lines this source emits
    fn format(&self) -> LogFormat {
        LogFormat::default()
    }

    /// Stream the log, newest commit first. With `after`, older commits are
    /// left out by the source itself.
    fn lines(&mut self, after: Option<SyncBound>) -> Result<LogLines<'_>>;
}

/// In-memory log, filtered by commit timestamp the way `git log --after` is
#[derive(Debug, Default)]
pub struct MemoryLogSource {
    lines: Vec<String>,
    format: LogFormat,
    requested: Vec<Option<SyncBound>>,
}

impl MemoryLogSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Put newer history in front of what is already there
    pub fn prepend<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut newer: Vec<String> = lines.into_iter().map(Into::into).collect();
        newer.append(&mut self.lines);
        self.lines = newer;
    }

    /// Every bound this source has been asked for, in call order
    pub fn requested_bounds(&self) -> &[Option<SyncBound>] {
        &self.requested
    }

    fn is_before(&self, line: &str, bound: SyncBound) -> bool {
        // Unparseable commit lines are passed through for the parser to report
        LogParser::new("", self.format.clone())
            .parse_commit_line(0, line)
            .map(|commit| commit.committed_on < bound.at())
            .unwrap_or(false)
    }
}

impl LogSource for MemoryLogSource {
    fn format(&self) -> LogFormat {
        self.format.clone()
    }

    fn lines(&mut self, after: Option<SyncBound>) -> Result<LogLines<'_>> {
        self.requested.push(after);

        let Some(bound) = after else {
            return Ok(Box::new(self.lines.iter().cloned().map(Ok::<String, anyhow::Error>)));
        };

        let mut keep = true;
        let mut selected = Vec::new();
        for line in &self.lines {
            if line.starts_with(COMMIT_MARKER) {
                keep = !self.is_before(line, bound);
            }
            if keep {
                selected.push(line.clone());
            }
        }

        Ok(Box::new(selected.into_iter().map(Ok::<String, anyhow::Error>)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::lower_bound;

    fn log() -> MemoryLogSource {
        MemoryLogSource::new([
            "|ccc||third||J||j@x||2023-01-03T10:00:00Z",
            "1\t0\tc.rs",
            "",
            "|bbb||second||J||j@x||2023-01-02T10:00:00Z",
            "1\t0\tb.rs",
            "",
            "|aaa||first||J||j@x||2023-01-01T10:00:00Z",
            "1\t0\ta.rs",
        ])
        .with_format(LogFormat::double_pipe())
    }

    #[test]
    fn test_unbounded_returns_everything() {
        let mut source = log();
        let lines: Vec<String> = source.lines(None).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(lines.len(), 8);
        assert_eq!(source.requested_bounds(), &[None]);
    }

    #[test]
    fn test_bound_drops_older_commits() {
        let mut source = log();
        let bound = lower_bound(Some("2023-01-02T10:00:00")).unwrap();
        let lines: Vec<String> = source.lines(bound).unwrap().collect::<Result<_>>().unwrap();

        assert_eq!(lines, vec!["|ccc||third||J||j@x||2023-01-03T10:00:00Z", "1\t0\tc.rs", ""]);
    }

    #[test]
    fn test_prepend_adds_newer_history() {
        let mut source = log();
        source.prepend(["|ddd||fourth||J||j@x||2023-01-04T10:00:00Z"]);
        let lines: Vec<String> = source.lines(None).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(lines[0], "|ddd||fourth||J||j@x||2023-01-04T10:00:00Z");
        assert_eq!(lines.len(), 9);
    }
}
