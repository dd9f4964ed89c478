//! Git operations module
//!
//! Provides:
//! - Repository discovery and remote lookup
//! - The `git log --numstat` log source

pub mod log;
pub mod remote;

pub use log::GitLogSource;
pub use remote::{repo_name_from_url, RepoInfo};
