use crate::error::SyncError;
use crate::health::probe_with_deadline;
use git2::{
    Cred, FetchOptions, Oid, RemoteCallbacks, Repository, StatusOptions,
    build::{CheckoutBuilder, RepoBuilder},
};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Result of a pull against an existing clone. `AlreadyUpToDate` is the
/// structural no-op sentinel; callers branch on it, never on message text.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PullOutcome {
    FastForwarded,
    AlreadyUpToDate,
}

/// The version-control collaborator consumed by the sync engine.
pub trait GitService {
    fn clone_repo(&self, ssh_url: &str, dest: &Path) -> Result<(), SyncError>;
    fn pull_repo(&self, path: &Path, default_branch: &str) -> Result<PullOutcome, SyncError>;
    /// Lightweight metadata-integrity probe; must return within `timeout`
    /// and report false on timeout or any probe error.
    fn probe_integrity(&self, path: &Path, timeout: Duration) -> bool;
}

/// Production implementation over libgit2, authenticating via the ssh agent.
#[derive(Debug, Default)]
pub struct GitClient;

impl GitClient {
    pub fn new() -> Self {
        Self
    }
}

impl GitService for GitClient {
    fn clone_repo(&self, ssh_url: &str, dest: &Path) -> Result<(), SyncError> {
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(remote_callbacks());
        info!(path = %dest.display(), "cloning repo");
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fo);
        builder.clone(ssh_url, dest)?;
        Ok(())
    }

    fn pull_repo(&self, path: &Path, default_branch: &str) -> Result<PullOutcome, SyncError> {
        let repo = Repository::open(path)?;
        if !is_working_tree_clean(&repo)? {
            warn!(path = %path.display(), "working tree dirty; refusing to pull");
            return Err(SyncError::DirtyWorkingTree(path.to_path_buf()));
        }
        fetch_origin(&repo)?;
        fast_forward_default_branch(&repo, default_branch)
    }

    fn probe_integrity(&self, path: &Path, timeout: Duration) -> bool {
        let path = path.to_path_buf();
        probe_with_deadline(
            move || match Repository::open(&path) {
                Ok(repo) => repo.head().is_ok() || repo.is_empty().unwrap_or(false),
                Err(_) => false,
            },
            timeout,
        )
    }
}

fn is_working_tree_clean(repo: &Repository) -> Result<bool, SyncError> {
    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut options))?;
    Ok(statuses.is_empty())
}

fn fetch_origin(repo: &Repository) -> Result<(), SyncError> {
    let mut remote = repo.find_remote("origin")?;
    let mut fo = FetchOptions::new();
    fo.remote_callbacks(remote_callbacks());
    info!("fetching origin");
    remote.fetch(&[] as &[&str], Some(&mut fo), None)?;
    Ok(())
}

fn fast_forward_default_branch(
    repo: &Repository,
    default_branch: &str,
) -> Result<PullOutcome, SyncError> {
    let local_ref = format!("refs/heads/{default_branch}");
    let remote_ref = format!("refs/remotes/origin/{default_branch}");

    let remote_oid = match repo.refname_to_id(&remote_ref) {
        Ok(oid) => oid,
        Err(_) => {
            warn!(remote_ref = %remote_ref, "default branch missing on remote");
            return Err(SyncError::BranchMissingOnRemote {
                branch: default_branch.to_string(),
            });
        }
    };

    let local_oid = match repo.refname_to_id(&local_ref) {
        Ok(oid) => oid,
        Err(_) => {
            warn!(
                default_branch = %default_branch,
                "default branch missing locally; creating local branch"
            );
            create_local_branch(repo, default_branch, remote_oid)?;
            return Ok(PullOutcome::FastForwarded);
        }
    };

    let (ahead, behind) = repo.graph_ahead_behind(local_oid, remote_oid)?;
    if ahead > 0 {
        warn!(branch = %default_branch, ahead, behind, "local commits not on origin");
        return Err(SyncError::Diverged {
            branch: default_branch.to_string(),
        });
    }
    if behind == 0 {
        return Ok(PullOutcome::AlreadyUpToDate);
    }

    update_branch_ref(repo, &local_ref, remote_oid)?;
    if is_head_on_branch(repo, default_branch)? {
        checkout_head(repo)?;
    }
    Ok(PullOutcome::FastForwarded)
}

fn create_local_branch(
    repo: &Repository,
    default_branch: &str,
    target: Oid,
) -> Result<(), SyncError> {
    let commit = repo.find_commit(target)?;
    repo.branch(default_branch, &commit, false)?;
    Ok(())
}

fn update_branch_ref(repo: &Repository, local_ref: &str, target: Oid) -> Result<(), SyncError> {
    let mut reference = repo.find_reference(local_ref)?;
    reference.set_target(target, "fast-forward")?;
    Ok(())
}

fn is_head_on_branch(repo: &Repository, branch: &str) -> Result<bool, SyncError> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(_) => return Ok(false),
    };
    Ok(head.is_branch() && head.shorthand() == Some(branch))
}

fn checkout_head(repo: &Repository) -> Result<(), SyncError> {
    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_head(Some(&mut checkout))?;
    Ok(())
}

fn remote_callbacks() -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed| {
        if allowed.is_ssh_key() {
            Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"))
        } else {
            Cred::default()
        }
    });
    callbacks
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::fs;

    /// In-memory stand-in for `GitClient`; clones are a `.git` marker dir,
    /// pulls fast-forward once per name listed in `behind`.
    #[derive(Debug, Default)]
    pub(crate) struct FakeGit {
        pub(crate) behind: RefCell<HashSet<String>>,
        pub(crate) fail_clone: RefCell<HashSet<String>>,
        pub(crate) fail_pull: RefCell<HashSet<String>>,
        pub(crate) broken_probe: RefCell<HashSet<String>>,
        pub(crate) probe_delay: Option<Duration>,
        pub(crate) calls: RefCell<Vec<String>>,
    }

    impl FakeGit {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn mark_behind(&self, name: &str) {
            self.behind.borrow_mut().insert(name.to_string());
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn name_of(path: &Path) -> String {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        }
    }

    impl GitService for FakeGit {
        fn clone_repo(&self, _ssh_url: &str, dest: &Path) -> Result<(), SyncError> {
            let name = Self::name_of(dest);
            self.calls.borrow_mut().push(format!("clone {name}"));
            if self.fail_clone.borrow().contains(&name) {
                return Err(SyncError::Git(git2::Error::from_str(
                    "simulated network failure",
                )));
            }
            fs::create_dir_all(dest.join(".git"))?;
            Ok(())
        }

        fn pull_repo(&self, path: &Path, _default_branch: &str) -> Result<PullOutcome, SyncError> {
            let name = Self::name_of(path);
            self.calls.borrow_mut().push(format!("pull {name}"));
            if self.fail_pull.borrow().contains(&name) {
                return Err(SyncError::Git(git2::Error::from_str(
                    "simulated fetch failure",
                )));
            }
            if !path.exists() {
                return Err(SyncError::CloneMissing(path.to_path_buf()));
            }
            if self.behind.borrow_mut().remove(&name) {
                Ok(PullOutcome::FastForwarded)
            } else {
                Ok(PullOutcome::AlreadyUpToDate)
            }
        }

        fn probe_integrity(&self, path: &Path, timeout: Duration) -> bool {
            if let Some(delay) = self.probe_delay {
                return probe_with_deadline(
                    move || {
                        std::thread::sleep(delay);
                        true
                    },
                    timeout,
                );
            }
            let name = Self::name_of(path);
            path.join(".git").exists() && !self.broken_probe.borrow().contains(&name)
        }
    }
}
