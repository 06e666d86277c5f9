use crate::cache::SyncCache;
use crate::model::RepoRecord;
use crate::paths::{UserStorage, git_metadata_dir};

/// Outcome of one update decision. The original tool collapsed every probe
/// failure into a bare `false`; the `Undetermined` variant keeps that
/// fail-quiet policy while leaving the boundary visible to callers and tests.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum UpdateCheck {
    /// No ssh url; the sync engine never acts on this repository.
    NoRemote,
    /// No local clone; "needs update" means "needs clone".
    NeedsClone,
    NeedsPull { reason: String },
    UpToDate,
    /// The comparison could not be made; treated as no update needed.
    Undetermined { reason: String },
}

impl UpdateCheck {
    pub fn needs_update(&self) -> bool {
        matches!(self, UpdateCheck::NeedsClone | UpdateCheck::NeedsPull { .. })
    }

    pub fn reason(&self) -> String {
        match self {
            UpdateCheck::NoRemote => "no remote URL".to_string(),
            UpdateCheck::NeedsClone => "not cloned locally".to_string(),
            UpdateCheck::NeedsPull { reason } => reason.clone(),
            UpdateCheck::UpToDate => "up to date".to_string(),
            UpdateCheck::Undetermined { reason } => {
                format!("undetermined ({reason}); treated as up to date")
            }
        }
    }
}

/// Decides whether the local clone of `repo` needs updating. Pure
/// fs/in-memory comparison: the remote push timestamp against the last
/// recorded sync. `cache` is `None` when the per-user cache could not be
/// read; every decision then reports `Undetermined`.
pub fn check_repo_update(
    repo: &RepoRecord,
    storage: &UserStorage,
    cache: Option<&SyncCache>,
) -> UpdateCheck {
    if repo.ssh_url.is_none() {
        return UpdateCheck::NoRemote;
    }
    let path = storage.repo_dir(&repo.name);
    if !path.exists() || !git_metadata_dir(&path).exists() {
        return UpdateCheck::NeedsClone;
    }
    let Some(cache) = cache else {
        return UpdateCheck::Undetermined {
            reason: "sync cache unreadable".to_string(),
        };
    };
    let Some(remote) = repo.last_update else {
        return UpdateCheck::Undetermined {
            reason: "remote update time unknown".to_string(),
        };
    };
    let Some(last_sync) = cache.last_sync_for(&repo.name) else {
        return UpdateCheck::NeedsPull {
            reason: "never synced by this tool".to_string(),
        };
    };
    if remote.unix_timestamp() > last_sync as i64 {
        UpdateCheck::NeedsPull {
            reason: format!(
                "remote updated at {} after last sync at {last_sync}",
                remote.unix_timestamp()
            ),
        }
    } else {
        UpdateCheck::UpToDate
    }
}

/// One decision per record with a remote; the most expensive pure query in
/// the tool, recomputed after any run that could change local state.
pub fn count_needing_update(
    repos: &[RepoRecord],
    storage: &UserStorage,
    cache: Option<&SyncCache>,
) -> usize {
    repos
        .iter()
        .filter(|repo| repo.has_remote())
        .filter(|repo| check_repo_update(repo, storage, cache).needs_update())
        .count()
}

pub fn count_local(repos: &[RepoRecord], storage: &UserStorage) -> usize {
    repos
        .iter()
        .filter(|repo| {
            let path = storage.repo_dir(&repo.name);
            path.exists() && git_metadata_dir(&path).exists()
        })
        .count()
}

/// Writes the decision back onto the record's local-state flags.
pub fn refresh_local_state(
    repo: &mut RepoRecord,
    storage: &UserStorage,
    cache: Option<&SyncCache>,
) {
    let path = storage.repo_dir(&repo.name);
    repo.local_exists = path.exists() && git_metadata_dir(&path).exists();
    repo.need_update = matches!(
        check_repo_update(repo, storage, cache),
        UpdateCheck::NeedsPull { .. }
    );
}
