use crate::error::SyncError;
use crate::git::{GitService, PullOutcome};
use crate::health::{CloneHealth, classify_clone};
use crate::model::RepoRecord;
use crate::paths::{UserStorage, git_metadata_dir};
use serde::Serialize;
use std::fs;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Clone,
    Pull,
    Repair,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Clone => "clone",
            SyncAction::Pull => "pull",
            SyncAction::Repair => "repair",
        }
    }
}

/// Tagged outcome of one operation. `AlreadyUpToDate` replaces the
/// original's `"Already up to date"` string comparison; `Skipped` marks
/// units that were never dispatched (filtered out or cancelled).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Cloned,
    Updated,
    AlreadyUpToDate,
    Repaired,
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub repo_name: String,
    pub status: SyncStatus,
    pub message: String,
    pub duration: Duration,
    pub action: SyncAction,
}

impl SyncOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self.status, SyncStatus::Failed)
    }

    pub fn skipped(repo_name: &str, action: SyncAction, message: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            status: SyncStatus::Skipped,
            message: message.into(),
            duration: Duration::ZERO,
            action,
        }
    }

    fn failed(repo_name: &str, action: SyncAction, duration: Duration, message: String) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            status: SyncStatus::Failed,
            message,
            duration,
            action,
        }
    }
}

/// Performs exactly one action against exactly one repository. Per-repo
/// failures come back as `SyncStatus::Failed` outcomes; this function never
/// returns an error and never panics. Timing wraps only the underlying
/// version-control invocation and is reported on failure too.
pub fn sync_single_repository(
    git: &dyn GitService,
    storage: &UserStorage,
    repo: &RepoRecord,
    action: SyncAction,
    probe_timeout: Duration,
) -> SyncOutcome {
    let outcome = match action {
        SyncAction::Clone => clone_one(git, storage, repo),
        SyncAction::Pull => pull_one(git, storage, repo),
        SyncAction::Repair => repair_one(git, storage, repo, probe_timeout),
    };
    match outcome.status {
        SyncStatus::Failed => warn!(
            repo = %outcome.repo_name,
            action = %outcome.action.as_str(),
            message = %outcome.message,
            "repo operation failed"
        ),
        _ => info!(
            repo = %outcome.repo_name,
            action = %outcome.action.as_str(),
            status = ?outcome.status,
            "repo operation finished"
        ),
    }
    outcome
}

fn clone_one(git: &dyn GitService, storage: &UserStorage, repo: &RepoRecord) -> SyncOutcome {
    let Some(ssh_url) = repo.ssh_url.as_deref() else {
        return SyncOutcome::failed(
            &repo.name,
            SyncAction::Clone,
            Duration::ZERO,
            SyncError::NoRemoteUrl.to_string(),
        );
    };
    let dest = storage.repo_dir(&repo.name);
    if dest.exists() {
        return SyncOutcome::failed(
            &repo.name,
            SyncAction::Clone,
            Duration::ZERO,
            SyncError::CloneCollision(dest).to_string(),
        );
    }
    let started = Instant::now();
    match git.clone_repo(ssh_url, &dest) {
        Ok(()) => SyncOutcome {
            repo_name: repo.name.clone(),
            status: SyncStatus::Cloned,
            message: format!("cloned into {}", dest.display()),
            duration: started.elapsed(),
            action: SyncAction::Clone,
        },
        Err(err) => {
            SyncOutcome::failed(&repo.name, SyncAction::Clone, started.elapsed(), err.to_string())
        }
    }
}

fn pull_one(git: &dyn GitService, storage: &UserStorage, repo: &RepoRecord) -> SyncOutcome {
    let path = storage.repo_dir(&repo.name);
    if !path.exists() || !git_metadata_dir(&path).exists() {
        return SyncOutcome::failed(
            &repo.name,
            SyncAction::Pull,
            Duration::ZERO,
            SyncError::CloneMissing(path).to_string(),
        );
    }
    let started = Instant::now();
    match git.pull_repo(&path, &repo.default_branch) {
        Ok(PullOutcome::FastForwarded) => SyncOutcome {
            repo_name: repo.name.clone(),
            status: SyncStatus::Updated,
            message: format!("fast-forwarded {}", repo.default_branch),
            duration: started.elapsed(),
            action: SyncAction::Pull,
        },
        Ok(PullOutcome::AlreadyUpToDate) => SyncOutcome {
            repo_name: repo.name.clone(),
            status: SyncStatus::AlreadyUpToDate,
            message: "already up to date".to_string(),
            duration: started.elapsed(),
            action: SyncAction::Pull,
        },
        Err(err) => {
            SyncOutcome::failed(&repo.name, SyncAction::Pull, started.elapsed(), err.to_string())
        }
    }
}

fn repair_one(
    git: &dyn GitService,
    storage: &UserStorage,
    repo: &RepoRecord,
    probe_timeout: Duration,
) -> SyncOutcome {
    let Some(ssh_url) = repo.ssh_url.as_deref() else {
        return SyncOutcome::failed(
            &repo.name,
            SyncAction::Repair,
            Duration::ZERO,
            SyncError::NoRemoteUrl.to_string(),
        );
    };
    let path = storage.repo_dir(&repo.name);
    let health = classify_clone(git, &path, probe_timeout);
    if health == CloneHealth::Healthy {
        let pulled = pull_one(git, storage, repo);
        return SyncOutcome {
            action: SyncAction::Repair,
            ..pulled
        };
    }

    if path.exists()
        && let Err(err) = fs::remove_dir_all(&path)
    {
        return SyncOutcome::failed(
            &repo.name,
            SyncAction::Repair,
            Duration::ZERO,
            format!("remove broken clone: {err}"),
        );
    }
    let started = Instant::now();
    match git.clone_repo(ssh_url, &path) {
        Ok(()) => SyncOutcome {
            repo_name: repo.name.clone(),
            status: SyncStatus::Repaired,
            message: match health {
                CloneHealth::Broken => "re-cloned broken local copy".to_string(),
                _ => "re-cloned missing local copy".to_string(),
            },
            duration: started.elapsed(),
            action: SyncAction::Repair,
        },
        Err(err) => SyncOutcome::failed(
            &repo.name,
            SyncAction::Repair,
            started.elapsed(),
            err.to_string(),
        ),
    }
}
