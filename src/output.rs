//! Output store location

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::OutputPathError;

pub const DEFAULT_DB_FILE: &str = "commits.sqlite3";

/// `~/commits.sqlite3`, or the current directory when there is no home
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DB_FILE)
}

/// Where a run writes its store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Long-lived store, opened or created, updated incrementally
    Default(PathBuf),
    /// Explicitly requested path, created empty by this run
    Fresh(PathBuf),
}

impl OutputTarget {
    /// Resolve the store path. An explicit path must not exist yet; it is
    /// created exclusively so two runs can never share it by accident.
    pub fn resolve(requested: Option<&Path>, default: PathBuf) -> Result<Self, OutputPathError> {
        let Some(path) = requested else {
            return Ok(OutputTarget::Default(default));
        };

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => OutputPathError::AlreadyExists(path.to_path_buf()),
                _ => OutputPathError::Invalid {
                    path: path.to_path_buf(),
                    source: e,
                },
            })?;

        debug!(path = %path.display(), "Created output file");
        Ok(OutputTarget::Fresh(path.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        match self {
            OutputTarget::Default(path) | OutputTarget::Fresh(path) => path,
        }
    }

    /// Undo a failed run: remove the file if this run created it
    pub fn discard(&self) {
        if let OutputTarget::Fresh(path) = self {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Could not remove output file");
            }
        }
    }
}
