//! Repository discovery and remote lookup

use git2::{ErrorCode, Repository};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::EnvironmentError;

/// The repository a sync runs against
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Working directory (or git dir for bare repositories)
    pub root: PathBuf,
    /// Logical name derived from the remote URL
    pub name: String,
    pub remote_url: String,
    /// False while HEAD is unborn
    pub has_commits: bool,
}

impl RepoInfo {
    /// Find the repository containing `dir` and resolve `remote`.
    pub fn discover(dir: &Path, remote: &str) -> Result<Self, EnvironmentError> {
        let repo = Repository::discover(dir)
            .map_err(|_| EnvironmentError::NotARepository(dir.to_path_buf()))?;

        let root = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        let found = repo.find_remote(remote).map_err(|e| match e.code() {
            ErrorCode::NotFound | ErrorCode::InvalidSpec => EnvironmentError::NoRemote(remote.to_string()),
            _ => EnvironmentError::Git(e),
        })?;

        // Push URL first, like `git remote get-url --push`
        let remote_url = found
            .pushurl()
            .or_else(|| found.url())
            .ok_or_else(|| EnvironmentError::RemoteWithoutUrl(remote.to_string()))?
            .to_string();

        let name = repo_name_from_url(&remote_url)
            .ok_or_else(|| EnvironmentError::RemoteWithoutUrl(remote.to_string()))?;

        let has_commits = match repo.head() {
            Ok(_) => true,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => false,
            Err(e) => return Err(EnvironmentError::Git(e)),
        };

        debug!(root = %root.display(), %name, %remote_url, has_commits, "Discovered repository");

        Ok(Self {
            root,
            name,
            remote_url,
            has_commits,
        })
    }
}

/// Last path segment of a remote URL with its extension removed.
///
/// Handles `https://host/org/name.git`, `git@host:org/name.git`,
/// `git@host:name.git` and local paths, ignoring a trailing slash.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches(&['/', '\\'][..]);
    let segment = trimmed.rsplit(&['/', '\\', ':'][..]).next()?;

    let name = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment,
    };

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_repo_name_from_url() {
        let cases = [
            ("https://github.com/acme/widgets.git", Some("widgets")),
            ("https://github.com/acme/widgets", Some("widgets")),
            ("git@github.com:acme/widgets.git", Some("widgets")),
            ("git@example.com:widgets.git", Some("widgets")),
            ("ssh://git@example.com:2222/acme/widgets.git/", Some("widgets")),
            ("/srv/git/widgets/", Some("widgets")),
            ("https://example.com/acme/my.repo.git", Some("my.repo")),
            ("", None),
        ];

        for (url, expected) in cases {
            assert_eq!(repo_name_from_url(url).as_deref(), expected, "url: {:?}", url);
        }
    }

    #[test]
    fn test_discover_with_origin() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.remote("origin", "https://github.com/acme/widgets.git").unwrap();

        let nested = dir.path().join("src");
        std::fs::create_dir_all(&nested).unwrap();

        let info = RepoInfo::discover(&nested, "origin").unwrap();
        assert_eq!(info.name, "widgets");
        assert_eq!(info.remote_url, "https://github.com/acme/widgets.git");
        assert!(!info.has_commits);
    }

    #[test]
    fn test_push_url_wins() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.remote("origin", "https://github.com/acme/mirror.git").unwrap();
        repo.remote_set_pushurl("origin", Some("git@github.com:acme/widgets.git"))
            .unwrap();

        let info = RepoInfo::discover(dir.path(), "origin").unwrap();
        assert_eq!(info.name, "widgets");
    }

    #[test]
    fn test_discover_with_commit() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.remote("origin", "https://github.com/acme/widgets.git").unwrap();

        let sig = git2::Signature::now("Jane", "jane@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
            .unwrap();

        let info = RepoInfo::discover(dir.path(), "origin").unwrap();
        assert!(info.has_commits);
    }

    #[test]
    fn test_missing_remote() {
        let dir = tempdir().unwrap();
        Repository::init(dir.path()).unwrap();

        let err = RepoInfo::discover(dir.path(), "origin").unwrap_err();
        assert!(matches!(err, EnvironmentError::NoRemote(ref name) if name == "origin"));
    }

    #[test]
    fn test_not_a_repository() {
        let dir = tempdir().unwrap();
        let err = RepoInfo::discover(dir.path(), "origin").unwrap_err();
        assert!(matches!(err, EnvironmentError::NotARepository(_)));
    }
}
