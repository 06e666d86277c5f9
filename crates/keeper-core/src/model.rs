use crate::paths::UserStorage;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One remote repository plus the locally observed state the sync engine
/// maintains for it. Rebuilt from the provider inventory once per run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoRecord {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    /// Absent for repositories the sync engine must never touch.
    pub ssh_url: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    pub language: Option<String>,
    /// Remote-reported size in kilobytes.
    #[serde(default)]
    pub size_kb: u64,
    pub default_branch: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    /// Only meaningful after a local-state refresh; `need_update` is
    /// interpreted as "needs clone" while `local_exists` is false.
    #[serde(default)]
    pub local_exists: bool,
    #[serde(default)]
    pub need_update: bool,
}

impl RepoRecord {
    pub fn has_remote(&self) -> bool {
        self.ssh_url.is_some()
    }
}

/// Explicit session context passed into every engine entry point; replaces
/// process-wide user/token/repository-list state.
#[derive(Clone, Debug)]
pub struct SyncSession {
    pub username: String,
    pub token: Option<String>,
    pub storage: UserStorage,
}

impl SyncSession {
    pub fn new(username: impl Into<String>, token: Option<String>, storage: UserStorage) -> Self {
        Self {
            username: username.into(),
            token,
            storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_record_deserializes_with_missing_flags() {
        let value = serde_json::json!({
            "name": "repo",
            "full_name": "user/repo",
            "html_url": "https://github.com/user/repo",
            "ssh_url": null,
            "language": null,
            "default_branch": "main"
        });
        let repo: RepoRecord = serde_json::from_value(value).unwrap();
        assert!(!repo.has_remote());
        assert!(!repo.local_exists);
        assert!(!repo.need_update);
        assert_eq!(repo.size_kb, 0);
        assert!(repo.last_update.is_none());
    }

    #[test]
    fn repo_record_parses_rfc3339_update_time() {
        let value = serde_json::json!({
            "name": "repo",
            "full_name": "user/repo",
            "html_url": "https://github.com/user/repo",
            "ssh_url": "git@github.com:user/repo.git",
            "language": "Rust",
            "default_branch": "main",
            "last_update": "2026-01-02T03:04:05Z"
        });
        let repo: RepoRecord = serde_json::from_value(value).unwrap();
        assert!(repo.has_remote());
        assert_eq!(repo.last_update.unwrap().unix_timestamp(), 1767323045);
    }
}
