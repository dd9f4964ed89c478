use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::git::log::DEFAULT_GIT_BINARY;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Store used when no output path is given on the command line
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_git_binary")]
    pub binary: String,
    /// Remote whose URL names the repository
    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            remote: default_remote(),
        }
    }
}

fn default_git_binary() -> String {
    DEFAULT_GIT_BINARY.to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.git.binary.trim().is_empty() {
            anyhow::bail!("git.binary must not be empty");
        }
        if self.git.remote.trim().is_empty() {
            anyhow::bail!("git.remote must not be empty");
        }
        if let Some(ref path) = self.database.path {
            if path.as_os_str().is_empty() {
                anyhow::bail!("database.path must not be empty");
            }
        }

        Ok(())
    }
}
