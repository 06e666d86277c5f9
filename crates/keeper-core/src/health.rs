use crate::git::GitService;
use crate::paths::git_metadata_dir;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;
use tracing::warn;

/// Classification of one local clone, derived fresh on every check.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CloneHealth {
    Healthy,
    Broken,
    Missing,
}

/// Runs `probe` on a helper thread and gives it at most `timeout` to answer.
/// A probe that overruns is abandoned and counts as failed; the engine never
/// waits on a wedged repository.
pub fn probe_with_deadline<F>(probe: F, timeout: Duration) -> bool
where
    F: FnOnce() -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(probe());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => {
            warn!("integrity probe timed out");
            false
        }
    }
}

/// Directory absent => missing; metadata absent or probe failure => broken.
pub fn classify_clone(git: &dyn GitService, path: &Path, probe_timeout: Duration) -> CloneHealth {
    if !path.exists() {
        return CloneHealth::Missing;
    }
    if !git_metadata_dir(path).exists() {
        return CloneHealth::Broken;
    }
    if !git.probe_integrity(path, probe_timeout) {
        return CloneHealth::Broken;
    }
    CloneHealth::Healthy
}
