//! Sync orchestration
//!
//! One run: read the high-water mark, plan the bound, stream the log through
//! the parser and write every group inside a single transaction.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::model::CommitGroup;
use crate::parser::{LogParser, ParserState};
use crate::planner::{self, SyncBound};
use crate::source::LogSource;

/// Outcome of one sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub repo_name: String,
    pub bound: Option<SyncBound>,
    pub commits_written: usize,
    pub file_changes_written: usize,
}

/// Bring the store up to date with `source` for `repo_name`.
///
/// `on_commit` is called for each group after it has been written (but
/// before the transaction commits). Any error leaves the store as it was.
pub fn sync_repository<F>(
    db: &mut Database,
    source: &mut dyn LogSource,
    repo_name: &str,
    mut on_commit: F,
) -> Result<SyncReport>
where
    F: FnMut(&CommitGroup),
{
    let high_water_mark = db.max_committed_on(repo_name)?;
    let bound = planner::lower_bound(high_water_mark.as_deref())?;
    info!(repo = repo_name, high_water_mark = ?high_water_mark, bound = ?bound.map(|b| b.to_string()), "Planning sync");

    let parser = LogParser::new(repo_name, source.format());
    let lines = source.lines(bound)?;
    let mut writer = db.begin()?;

    let mut write = |group: CommitGroup| -> Result<()> {
        debug!(commit = %group.commit.id, files = group.files.len(), "Writing commit");
        writer.insert_group(&group)?;
        on_commit(&group);
        Ok(())
    };

    let mut state = ParserState::default();
    for line in lines {
        let line = line?;
        let (next, done) = parser
            .step(state, &line)
            .with_context(|| format!("Failed to parse git log for {}", repo_name))?;
        state = next;
        if let Some(group) = done {
            write(group)?;
        }
    }
    if let Some(group) = parser.finish(state) {
        write(group)?;
    }

    let (commits_written, file_changes_written) = writer.commit()?;
    info!(repo = repo_name, commits_written, file_changes_written, "Sync complete");

    Ok(SyncReport {
        repo_name: repo_name.to_string(),
        bound,
        commits_written,
        file_changes_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::model::LineCount;
    use crate::parser::LogFormat;
    use crate::source::MemoryLogSource;

    fn upstream() -> MemoryLogSource {
        MemoryLogSource::new([
            "|ccc3333||Add logo||Jane||jane@example.com||2023-01-01T10:00:00Z",
            "-\t-\tassets/logo.png",
            "4\t0\tREADME.md",
            "",
            "|bbb2222||Fix a || b parsing||Joe||joe@example.com||2022-12-31T09:00:00Z",
            "10\t2\tsrc/parser.rs",
            "1\t1\tsrc/lib.rs",
            "",
            "|aaa1111||Initial commit||Jane||jane@example.com||2022-12-30T08:00:00Z",
            "20\t0\tsrc/lib.rs",
        ])
        .with_format(LogFormat::double_pipe())
    }

    fn sync(db: &mut Database, source: &mut MemoryLogSource) -> Result<SyncReport> {
        sync_repository(db, source, "widgets", |_| {})
    }

    #[test]
    fn test_first_sync_writes_everything() {
        let mut db = Database::open_in_memory().unwrap();
        let mut source = upstream();

        let mut seen = Vec::new();
        let report = sync_repository(&mut db, &mut source, "widgets", |g| seen.push(g.commit.id.clone())).unwrap();

        assert_eq!(report.commits_written, 3);
        assert_eq!(report.file_changes_written, 5);
        assert_eq!(report.bound, None);
        assert_eq!(seen, vec!["ccc3333", "bbb2222", "aaa1111"]);

        let files = db.file_changes_for("ccc3333").unwrap();
        assert_eq!(files[0].path, "assets/logo.png");
        assert_eq!(files[0].added, LineCount::Sentinel("-".to_string()));
        assert_eq!(files[1].path, "README.md");

        let commits = db.commits_for_repo("widgets").unwrap();
        let fix = commits.iter().find(|c| c.id == "bbb2222").unwrap();
        assert_eq!(fix.summary, "Fix a || b parsing");
        assert_eq!(fix.author_name, "Joe");
    }

    #[test]
    fn test_second_sync_is_a_no_op() {
        let mut db = Database::open_in_memory().unwrap();
        let mut source = upstream();

        sync(&mut db, &mut source).unwrap();
        let report = sync(&mut db, &mut source).unwrap();

        assert_eq!(report.commits_written, 0);
        assert_eq!(report.bound.unwrap().to_string(), "2023-01-01T10:00:01");
        assert_eq!(db.commit_count(None).unwrap(), 3);
        assert_eq!(db.file_change_count().unwrap(), 5);
        assert_eq!(source.requested_bounds().len(), 2);
    }

    #[test]
    fn test_new_upstream_commits_are_appended() {
        let mut db = Database::open_in_memory().unwrap();
        let mut source = upstream();
        sync(&mut db, &mut source).unwrap();

        source.prepend([
            "|fff6666||Third new||Jane||jane@example.com||2023-01-03T10:00:00Z",
            "1\t0\tc.rs",
            "",
            "|eee5555||Second new||Jane||jane@example.com||2023-01-02T10:00:00Z",
            "1\t0\tb.rs",
            "2\t2\tb2.rs",
            "",
            "|ddd4444||First new||Jane||jane@example.com||2023-01-01T10:00:01Z",
            "",
        ]);

        let report = sync(&mut db, &mut source).unwrap();
        assert_eq!(report.commits_written, 3);
        assert_eq!(report.file_changes_written, 3);
        assert_eq!(db.commit_count(Some("widgets")).unwrap(), 6);
        assert_eq!(db.file_change_count().unwrap(), 8);

        // Earlier rows untouched
        assert_eq!(db.file_changes_for("bbb2222").unwrap().len(), 2);
        assert_eq!(
            db.max_committed_on("widgets").unwrap().as_deref(),
            Some("2023-01-03T10:00:00")
        );
    }

    #[test]
    fn test_empty_log() {
        let mut db = Database::open_in_memory().unwrap();
        let mut source = MemoryLogSource::new(Vec::<String>::new());

        let report = sync(&mut db, &mut source).unwrap();
        assert_eq!(report.commits_written, 0);
        assert_eq!(db.commit_count(None).unwrap(), 0);
    }

    #[test]
    fn test_parse_error_rolls_back() {
        let mut db = Database::open_in_memory().unwrap();
        let mut source = MemoryLogSource::new([
            "|aaa1111||Good||Jane||jane@example.com||2023-01-01T10:00:00Z",
            "1\t0\ta.rs",
            "|bbb2222||Bad||Jane",
        ])
        .with_format(LogFormat::double_pipe());

        let err = sync(&mut db, &mut source).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ParseError>(),
            Some(ParseError::MalformedCommitLine { line: 3, .. })
        ));

        assert_eq!(db.commit_count(None).unwrap(), 0);
        assert_eq!(db.file_change_count().unwrap(), 0);
    }

    #[test]
    fn test_orphan_file_change_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let mut source = MemoryLogSource::new(["1\t0\ta.rs"]);

        let err = sync(&mut db, &mut source).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ParseError>(),
            Some(ParseError::FileChangeWithoutCommit { .. })
        ));
    }

    #[test]
    fn test_repositories_are_tracked_separately() {
        let mut db = Database::open_in_memory().unwrap();
        sync(&mut db, &mut upstream()).unwrap();

        let mut other = MemoryLogSource::new([
            "|9999999||Elsewhere||Ann||ann@example.com||2020-06-01T00:00:00Z",
        ])
        .with_format(LogFormat::double_pipe());
        let report = sync_repository(&mut db, &mut other, "gadgets", |_| {}).unwrap();

        assert_eq!(report.bound, None);
        assert_eq!(report.commits_written, 1);
        assert_eq!(db.commit_count(Some("gadgets")).unwrap(), 1);
    }
}
