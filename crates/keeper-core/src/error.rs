use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single version-control operation. Precondition violations
/// get their own variants so callers can report them without string matching.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("destination already exists: {0}")]
    CloneCollision(PathBuf),
    #[error("local clone missing: {0}")]
    CloneMissing(PathBuf),
    #[error("repository has no remote url")]
    NoRemoteUrl,
    #[error("working tree has local changes: {0}")]
    DirtyWorkingTree(PathBuf),
    #[error("branch {branch} diverged from origin")]
    Diverged { branch: String },
    #[error("branch {branch} not found on origin")]
    BranchMissingOnRemote { branch: String },
    #[error(transparent)]
    Git(#[from] git2::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
