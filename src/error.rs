//! Error types shared across the crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning raw log lines into commit groups
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: malformed commit line: {content:?}")]
    MalformedCommitLine { line: usize, content: String },

    #[error("line {line}: malformed file-change line: {content:?}")]
    MalformedFileChangeLine { line: usize, content: String },

    #[error("line {line}: file-change line before any commit: {content:?}")]
    FileChangeWithoutCommit { line: usize, content: String },

    #[error("line {line}: invalid commit timestamp {value:?}")]
    InvalidTimestamp { line: usize, value: String },
}

/// Errors raised while computing the incremental bound
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("stored high-water mark {value:?} is not a valid timestamp")]
    CorruptHighWaterMark {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Errors about the surrounding git environment
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("remote '{0}' is not configured")]
    NoRemote(String),

    #[error("remote '{0}' has no usable URL")]
    RemoteWithoutUrl(String),

    #[error("git executable '{0}' not found")]
    GitNotFound(String),

    #[error("git exited with {status}: {stderr}")]
    GitFailed { status: String, stderr: String },

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

/// Errors about the requested output path
#[derive(Debug, Error)]
pub enum OutputPathError {
    #[error("output path {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("output path {} is not a valid path", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
