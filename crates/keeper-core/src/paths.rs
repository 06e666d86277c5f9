use anyhow::Context;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "repokeeper";

/// Per-user on-disk layout. Everything the engine touches for one user lives
/// under `<base>/<username>/`.
#[derive(Clone, Debug)]
pub struct UserStorage {
    base: PathBuf,
    username: String,
}

impl UserStorage {
    pub fn new(base: impl Into<PathBuf>, username: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            username: username.into(),
        }
    }

    /// Default base under the home directory: `~/repokeeper/<username>`.
    pub fn for_user(username: &str) -> anyhow::Result<Self> {
        let dirs = directories::BaseDirs::new().context("resolve home directory")?;
        Ok(Self::new(dirs.home_dir().join(APP_DIR), username))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn root(&self) -> PathBuf {
        self.base.join(&self.username)
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.root().join("repositories")
    }

    pub fn sync_logs_dir(&self) -> PathBuf {
        self.root().join("logs").join("sync")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root().join("downloads")
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.root().join("archives")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root().join("cache.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root().join(".keeper.lock")
    }

    /// Clone target for one repository.
    pub fn repo_dir(&self, repo_name: &str) -> PathBuf {
        self.repos_dir().join(sanitize_repo_name(repo_name))
    }

    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for dir in [
            self.repos_dir(),
            self.sync_logs_dir(),
            self.downloads_dir(),
            self.archives_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create storage dir {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn git_metadata_dir(repo_path: &Path) -> PathBuf {
    repo_path.join(".git")
}

fn sanitize_repo_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();
    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}
