//! `git log --numstat` log source

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use tracing::debug;

use crate::error::EnvironmentError;
use crate::git::remote::RepoInfo;
use crate::parser::LogFormat;
use crate::planner::SyncBound;
use crate::source::{LogLines, LogSource};

pub const DEFAULT_GIT_BINARY: &str = "git";

/// Streams the log of a local repository by running the git binary
pub struct GitLogSource {
    git: String,
    repo_root: PathBuf,
    has_commits: bool,
    format: LogFormat,
}

impl GitLogSource {
    pub fn new(repo: &RepoInfo) -> Self {
        Self {
            git: DEFAULT_GIT_BINARY.to_string(),
            repo_root: repo.root.clone(),
            has_commits: repo.has_commits,
            format: LogFormat::default(),
        }
    }

    /// Use a different git executable (resolved through `PATH` unless absolute)
    pub fn with_binary(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Arguments passed to git. The bound goes to git itself so older
    /// history is never produced.
    pub fn args(&self, after: Option<SyncBound>) -> Vec<String> {
        // Keep non-ASCII paths as they are instead of C-quoting them
        let mut args = vec![
            "-c".to_string(),
            "core.quotePath=false".to_string(),
            "log".to_string(),
            "--no-color".to_string(),
            "--numstat".to_string(),
            self.format.pretty_arg(),
        ];

        if let Some(bound) = after {
            args.push(format!("--after={}", bound.git_date()));
        }

        args
    }

    /// Make sure the git binary can be run at all. Call this before opening
    /// the store so a missing git never leaves a store behind.
    pub fn check(&self) -> Result<()> {
        let output = Command::new(&self.git)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            return Err(EnvironmentError::GitFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        debug!(version = %String::from_utf8_lossy(&output.stdout).trim(), "Found git");
        Ok(())
    }

    fn spawn(&self, args: &[String]) -> Result<Child> {
        debug!(git = %self.git, ?args, cwd = %self.repo_root.display(), "Running git");

        Command::new(&self.git)
            .args(args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.launch_error(e))
    }

    fn launch_error(&self, e: std::io::Error) -> anyhow::Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            EnvironmentError::GitNotFound(self.git.clone()).into()
        } else {
            anyhow::Error::new(e).context(format!("Failed to execute {}", self.git))
        }
    }
}

impl LogSource for GitLogSource {
    fn format(&self) -> LogFormat {
        self.format.clone()
    }

    fn lines(&mut self, after: Option<SyncBound>) -> Result<LogLines<'_>> {
        // `git log` fails outright on an unborn HEAD
        if !self.has_commits {
            debug!("Repository has no commits, nothing to stream");
            return Ok(Box::new(std::iter::empty::<Result<String>>()));
        }

        let args = self.args(after);
        let child = self.spawn(&args)?;
        Ok(Box::new(GitLogStream::new(child)?))
    }
}

/// Line iterator over the stdout of a running `git log`.
///
/// Owns the child: reaching the end waits for it and turns a failed exit
/// into an error item, dropping the stream early kills it.
struct GitLogStream {
    child: Child,
    reader: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    buf: Vec<u8>,
    done: bool,
}

impl GitLogStream {
    fn new(mut child: Child) -> Result<Self> {
        let stdout = child.stdout.take().context("Failed to capture git stdout")?;
        let stderr = child.stderr.take().context("Failed to capture git stderr")?;

        // Drain stderr on the side so a chatty git never blocks on a full pipe
        let stderr = thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut bytes);
            String::from_utf8_lossy(&bytes).into_owned()
        });

        Ok(Self {
            child,
            reader: BufReader::new(stdout),
            stderr: Some(stderr),
            buf: Vec::new(),
            done: false,
        })
    }

    fn finish(&mut self) -> Result<()> {
        let status = self.child.wait().context("Failed to wait for git")?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(EnvironmentError::GitFailed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Iterator for GitLogStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                self.finish().err().map(Err)
            }
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
                    self.buf.pop();
                }
                // Names and paths are not always valid UTF-8 in old history
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => {
                self.done = true;
                Some(Err(anyhow::Error::new(e).context("Failed to read git log output")))
            }
        }
    }
}

impl Drop for GitLogStream {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
