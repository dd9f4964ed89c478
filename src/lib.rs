//! Loadstats - git history into SQLite
//!
//! Reads `git log --numstat` for one repository and stores every commit and
//! the per-file line counts it reports, with:
//! - A pure, line-at-a-time log parser
//! - Incremental syncs bounded by the newest stored commit
//! - All writes of a run in one transaction

pub mod config;
pub mod db;
pub mod error;
pub mod git;
pub mod model;
pub mod output;
pub mod parser;
pub mod planner;
pub mod source;
pub mod sync;

pub use db::Database;
pub use error::{EnvironmentError, OutputPathError, ParseError, PlanError};
pub use model::{Commit, CommitGroup, FileChange, LineCount};
pub use parser::{LogFormat, LogParser, ParserState};
pub use planner::{lower_bound, SyncBound};
pub use source::{LogSource, MemoryLogSource};
pub use sync::{sync_repository, SyncReport};
