use crate::cache::SyncCache;
use crate::decision::{
    UpdateCheck, check_repo_update, count_local, count_needing_update, refresh_local_state,
};
use crate::git::GitService;
use crate::lockfile::RunLock;
use crate::model::{RepoRecord, SyncSession};
use crate::operation::{SyncAction, SyncOutcome, SyncStatus, sync_single_repository};
use crate::paths::git_metadata_dir;
use crate::progress::ProgressReporter;
use crate::run_log::{RepoSetTotals, save_run_log, stats_log_value};
use crate::stats::{PullCredit, RunStats};
use std::fs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// The five bulk operations, consolidated into one orchestrator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BulkMode {
    CloneMissing,
    UpdateNeeded,
    SyncAll,
    RecloneAll,
    Repair,
}

impl BulkMode {
    pub fn operation_name(&self) -> &'static str {
        match self {
            BulkMode::CloneMissing => "Clone Missing Repositories",
            BulkMode::UpdateNeeded => "Update Needed Repositories",
            BulkMode::SyncAll => "Sync All Repositories",
            BulkMode::RecloneAll => "Re-clone All Repositories",
            BulkMode::Repair => "Sync with Repair",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BulkMode::CloneMissing => "Cloning",
            BulkMode::UpdateNeeded => "Updating",
            BulkMode::SyncAll => "Syncing",
            BulkMode::RecloneAll => "Re-cloning",
            BulkMode::Repair => "Repairing",
        }
    }

    /// Re-clone deletes local copies before recreating them.
    pub fn destructive(&self) -> bool {
        matches!(self, BulkMode::RecloneAll)
    }

    fn pull_credit(&self) -> PullCredit {
        match self {
            BulkMode::UpdateNeeded => PullCredit::Updated,
            _ => PullCredit::Synced,
        }
    }

    fn nominal_action(&self) -> SyncAction {
        match self {
            BulkMode::CloneMissing | BulkMode::RecloneAll => SyncAction::Clone,
            BulkMode::UpdateNeeded | BulkMode::SyncAll => SyncAction::Pull,
            BulkMode::Repair => SyncAction::Repair,
        }
    }
}

/// What the caller is asked to confirm before any side effect happens.
#[derive(Debug, Clone, Copy)]
pub struct BulkRequest {
    pub mode: BulkMode,
    pub repo_count: usize,
}

pub struct BulkOptions<'a> {
    /// Called once, before any side-effecting work; `None` proceeds.
    pub confirm: Option<&'a dyn Fn(&BulkRequest) -> bool>,
    pub progress: &'a dyn ProgressReporter,
    pub probe_timeout: Duration,
}

impl<'a> BulkOptions<'a> {
    pub fn new(progress: &'a dyn ProgressReporter) -> Self {
        Self {
            confirm: None,
            progress,
            probe_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_confirm(mut self, confirm: &'a dyn Fn(&BulkRequest) -> bool) -> Self {
        self.confirm = Some(confirm);
        self
    }
}

struct PlannedUnit {
    index: usize,
    /// `None` means the record sits inside the mode's universe but is not
    /// actionable (no remote url); it is counted skipped, never dispatched.
    action: Option<SyncAction>,
}

/// Applies one mode across the repository list: sequential git dispatch,
/// stats folding, cache bookkeeping, flag refresh, and a best-effort run
/// log. A per-repo failure never halts the batch and nothing is retried.
pub fn run_bulk(
    git: &dyn GitService,
    session: &SyncSession,
    repos: &mut [RepoRecord],
    mode: BulkMode,
    options: BulkOptions<'_>,
) -> anyhow::Result<RunStats> {
    let storage = &session.storage;
    let mut cache = match SyncCache::load(&storage.cache_path()) {
        Ok(cache) => Some(cache),
        Err(err) => {
            warn!(error = %err, "sync cache unreadable; update decisions undetermined");
            None
        }
    };

    let plan = build_plan(repos, storage, cache.as_ref(), mode);

    let request = BulkRequest {
        mode,
        repo_count: plan.len(),
    };
    if let Some(confirm) = options.confirm
        && !confirm(&request)
    {
        info!(mode = %mode.operation_name(), "bulk run declined by caller");
        return Ok(RunStats::new());
    }

    storage.ensure_layout()?;
    let _lock = RunLock::try_acquire(&storage.lock_path())?
        .ok_or_else(|| anyhow::anyhow!("another run is already using this storage root"))?;

    info!(
        mode = %mode.operation_name(),
        repos = plan.len(),
        "starting bulk run"
    );

    let mut stats = RunStats::new();
    let total = plan.len();
    let mut completed = 0usize;

    for unit in plan {
        let repo = &repos[unit.index];
        let outcome = match unit.action {
            None => SyncOutcome::skipped(&repo.name, mode.nominal_action(), "no remote URL"),
            Some(action) => {
                if mode.destructive() {
                    let path = storage.repo_dir(&repo.name);
                    if path.exists()
                        && let Err(err) = fs::remove_dir_all(&path)
                    {
                        let outcome = SyncOutcome {
                            repo_name: repo.name.clone(),
                            status: SyncStatus::Failed,
                            message: format!("remove local copy: {err}"),
                            duration: Duration::ZERO,
                            action,
                        };
                        completed += 1;
                        stats.record(outcome, mode.pull_credit());
                        options
                            .progress
                            .report(completed, total, &repo.name, mode.label());
                        continue;
                    }
                }
                sync_single_repository(git, storage, repo, action, options.probe_timeout)
            }
        };

        if let Some(cache) = cache.as_mut()
            && should_record_sync(outcome.status)
        {
            cache.record_sync(&repo.name, current_timestamp_secs());
        }
        completed += 1;
        stats.record(outcome, mode.pull_credit());
        options
            .progress
            .report(completed, total, &repo.name, mode.label());
    }

    if let Some(cache) = cache.as_ref()
        && let Err(err) = cache.save(&storage.cache_path())
    {
        warn!(error = %err, "failed to save sync cache");
    }

    for repo in repos.iter_mut() {
        refresh_local_state(repo, storage, cache.as_ref());
    }

    let totals = RepoSetTotals {
        total: repos.len(),
        local: count_local(repos, storage),
        needs_update: count_needing_update(repos, storage, cache.as_ref()),
    };
    match save_run_log(
        storage,
        mode.operation_name(),
        &session.username,
        stats_log_value(&stats),
        Some(totals),
    ) {
        Ok(path) => info!(path = %path.display(), "run log saved"),
        Err(err) => warn!(error = %err, "failed to save run log"),
    }

    info!(
        mode = %mode.operation_name(),
        attempted = stats.attempted,
        succeeded = stats.succeeded(),
        failed = stats.failed,
        skipped = stats.skipped,
        "bulk run finished"
    );
    Ok(stats)
}

fn build_plan(
    repos: &[RepoRecord],
    storage: &crate::paths::UserStorage,
    cache: Option<&SyncCache>,
    mode: BulkMode,
) -> Vec<PlannedUnit> {
    let mut plan = Vec::new();
    for (index, repo) in repos.iter().enumerate() {
        let local = {
            let path = storage.repo_dir(&repo.name);
            path.exists() && git_metadata_dir(&path).exists()
        };
        match mode {
            BulkMode::CloneMissing => {
                if repo.has_remote() && !local {
                    plan.push(PlannedUnit {
                        index,
                        action: Some(SyncAction::Clone),
                    });
                }
            }
            BulkMode::UpdateNeeded => {
                if matches!(
                    check_repo_update(repo, storage, cache),
                    UpdateCheck::NeedsPull { .. }
                ) {
                    plan.push(PlannedUnit {
                        index,
                        action: Some(SyncAction::Pull),
                    });
                }
            }
            BulkMode::SyncAll => {
                let action = if !repo.has_remote() {
                    None
                } else if local {
                    Some(SyncAction::Pull)
                } else {
                    Some(SyncAction::Clone)
                };
                plan.push(PlannedUnit { index, action });
            }
            BulkMode::RecloneAll => {
                let action = repo.has_remote().then_some(SyncAction::Clone);
                plan.push(PlannedUnit { index, action });
            }
            BulkMode::Repair => {
                let action = repo.has_remote().then_some(SyncAction::Repair);
                plan.push(PlannedUnit { index, action });
            }
        }
    }
    plan
}

fn should_record_sync(status: SyncStatus) -> bool {
    matches!(
        status,
        SyncStatus::Cloned | SyncStatus::Updated | SyncStatus::AlreadyUpToDate | SyncStatus::Repaired
    )
}

fn current_timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// One entry point per bulk mode, as exposed to the command surface.
pub fn clone_missing(
    git: &dyn GitService,
    session: &SyncSession,
    repos: &mut [RepoRecord],
    options: BulkOptions<'_>,
) -> anyhow::Result<RunStats> {
    run_bulk(git, session, repos, BulkMode::CloneMissing, options)
}

pub fn update_needed(
    git: &dyn GitService,
    session: &SyncSession,
    repos: &mut [RepoRecord],
    options: BulkOptions<'_>,
) -> anyhow::Result<RunStats> {
    run_bulk(git, session, repos, BulkMode::UpdateNeeded, options)
}

pub fn sync_all(
    git: &dyn GitService,
    session: &SyncSession,
    repos: &mut [RepoRecord],
    options: BulkOptions<'_>,
) -> anyhow::Result<RunStats> {
    run_bulk(git, session, repos, BulkMode::SyncAll, options)
}

pub fn reclone_all(
    git: &dyn GitService,
    session: &SyncSession,
    repos: &mut [RepoRecord],
    options: BulkOptions<'_>,
) -> anyhow::Result<RunStats> {
    run_bulk(git, session, repos, BulkMode::RecloneAll, options)
}

pub fn repair_sync(
    git: &dyn GitService,
    session: &SyncSession,
    repos: &mut [RepoRecord],
    options: BulkOptions<'_>,
) -> anyhow::Result<RunStats> {
    run_bulk(git, session, repos, BulkMode::Repair, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::FakeGit;
    use crate::paths::UserStorage;
    use crate::progress::NullProgress;
    use crate::progress::recording::RecordingProgress;
    use std::fs;
    use tempfile::TempDir;
    use time::OffsetDateTime;

    fn repo(name: &str, ssh: bool, last_update: Option<i64>) -> RepoRecord {
        RepoRecord {
            name: name.to_string(),
            full_name: format!("alice/{name}"),
            html_url: format!("https://github.com/alice/{name}"),
            ssh_url: ssh.then(|| format!("git@github.com:alice/{name}.git")),
            private: false,
            fork: false,
            archived: false,
            language: None,
            size_kb: 0,
            default_branch: "main".to_string(),
            last_update: last_update
                .map(|secs| OffsetDateTime::from_unix_timestamp(secs).unwrap()),
            local_exists: false,
            need_update: false,
        }
    }

    fn session(tmp: &TempDir) -> SyncSession {
        SyncSession::new("alice", None, UserStorage::new(tmp.path(), "alice"))
    }

    fn cloned(session: &SyncSession, name: &str) {
        fs::create_dir_all(session.storage.repo_dir(name).join(".git")).unwrap();
    }

    fn assert_balanced(stats: &RunStats) {
        assert_eq!(
            stats.attempted,
            stats.succeeded() + stats.failed + stats.skipped
        );
    }

    #[test]
    fn clone_missing_selects_only_missing_with_remote() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        cloned(&session, "present");
        let mut repos = vec![
            repo("present", true, None),
            repo("absent", true, None),
            repo("no-remote", false, None),
        ];
        let git = FakeGit::new();
        let stats = clone_missing(
            &git,
            &session,
            &mut repos,
            BulkOptions::new(&NullProgress),
        )
        .unwrap();

        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.cloned, 1);
        assert_eq!(git.calls(), vec!["clone absent".to_string()]);
        assert_balanced(&stats);
        assert!(repos[1].local_exists);
    }

    #[test]
    fn update_needed_never_pulls_missing_clones() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        cloned(&session, "stale");
        let mut cache = SyncCache::new();
        cache.record_sync("stale", 100);
        cache.save(&session.storage.cache_path()).unwrap();

        let mut repos = vec![
            repo("stale", true, Some(200)),
            repo("uncloned", true, Some(200)),
            repo("no-remote", false, Some(200)),
        ];
        let git = FakeGit::new();
        git.mark_behind("stale");
        let stats = update_needed(
            &git,
            &session,
            &mut repos,
            BulkOptions::new(&NullProgress),
        )
        .unwrap();

        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.updated, 1);
        assert!(!git.calls().iter().any(|call| call.contains("uncloned")));
        assert!(!git.calls().iter().any(|call| call.contains("no-remote")));
        assert_balanced(&stats);
    }

    #[test]
    fn sync_all_twice_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        cloned(&session, "existing");
        let mut repos = vec![
            repo("existing", true, Some(100)),
            repo("fresh", true, Some(100)),
        ];
        let git = FakeGit::new();
        git.mark_behind("existing");

        let first = sync_all(&git, &session, &mut repos, BulkOptions::new(&NullProgress)).unwrap();
        assert_eq!(first.cloned, 1);
        assert_eq!(first.synced, 1);
        assert_balanced(&first);

        let second = sync_all(&git, &session, &mut repos, BulkOptions::new(&NullProgress)).unwrap();
        assert_eq!(second.cloned, 0);
        assert_eq!(second.synced, 0);
        assert_eq!(second.skipped, 2);
        assert_balanced(&second);
        assert!(second
            .results
            .iter()
            .all(|outcome| outcome.status == SyncStatus::AlreadyUpToDate));
    }

    #[test]
    fn repair_scenario_clones_skips_and_repairs() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        // A: no local clone. B: healthy and current. C: metadata missing.
        cloned(&session, "b");
        fs::create_dir_all(session.storage.repo_dir("c")).unwrap();
        let mut repos = vec![
            repo("a", true, None),
            repo("b", true, None),
            repo("c", true, None),
        ];
        let git = FakeGit::new();
        let stats = repair_sync(&git, &session, &mut repos, BulkOptions::new(&NullProgress)).unwrap();

        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.repaired, 2);
        assert_balanced(&stats);
        let c_outcome = stats
            .results
            .iter()
            .find(|outcome| outcome.repo_name == "c")
            .unwrap();
        assert!(c_outcome.message.contains("re-cloned"));
        let b_outcome = stats
            .results
            .iter()
            .find(|outcome| outcome.repo_name == "b")
            .unwrap();
        assert_eq!(b_outcome.status, SyncStatus::AlreadyUpToDate);
        assert!(session.storage.repo_dir("c").join(".git").exists());
    }

    #[test]
    fn repair_skips_records_without_remote() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut repos = vec![repo("no-remote", false, None)];
        let git = FakeGit::new();
        let stats = repair_sync(&git, &session, &mut repos, BulkOptions::new(&NullProgress)).unwrap();
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.skipped, 1);
        assert!(git.calls().is_empty());
        assert_balanced(&stats);
    }

    #[test]
    fn failures_do_not_halt_the_batch() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut repos = vec![repo("bad", true, None), repo("good", true, None)];
        let git = FakeGit::new();
        git.fail_clone.borrow_mut().insert("bad".to_string());
        let stats = clone_missing(
            &git,
            &session,
            &mut repos,
            BulkOptions::new(&NullProgress),
        )
        .unwrap();

        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.cloned, 1);
        assert_balanced(&stats);
        assert!(!repos[0].local_exists);
        assert!(repos[1].local_exists);
    }

    #[test]
    fn reclone_deletes_and_recreates() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        cloned(&session, "web");
        fs::write(
            session.storage.repo_dir("web").join("local-only.txt"),
            "data",
        )
        .unwrap();
        let mut repos = vec![repo("web", true, None)];
        let git = FakeGit::new();
        let stats = reclone_all(&git, &session, &mut repos, BulkOptions::new(&NullProgress)).unwrap();

        assert_eq!(stats.cloned, 1);
        assert!(!session.storage.repo_dir("web").join("local-only.txt").exists());
        assert!(session.storage.repo_dir("web").join(".git").exists());
        assert_balanced(&stats);
    }

    #[test]
    fn reclone_never_deletes_without_remote() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        cloned(&session, "keep");
        let mut repos = vec![repo("keep", false, None)];
        let git = FakeGit::new();
        let stats = reclone_all(&git, &session, &mut repos, BulkOptions::new(&NullProgress)).unwrap();

        assert_eq!(stats.skipped, 1);
        assert!(session.storage.repo_dir("keep").join(".git").exists());
        assert!(git.calls().is_empty());
    }

    #[test]
    fn declined_confirmation_has_no_side_effects() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut repos = vec![repo("web", true, None)];
        let git = FakeGit::new();
        let decline = |_request: &BulkRequest| false;
        let stats = reclone_all(
            &git,
            &session,
            &mut repos,
            BulkOptions::new(&NullProgress).with_confirm(&decline),
        )
        .unwrap();

        assert_eq!(stats.attempted, 0);
        assert!(git.calls().is_empty());
        assert!(!session.storage.repos_dir().exists());
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut repos: Vec<RepoRecord> = Vec::new();
        let git = FakeGit::new();
        let stats = sync_all(&git, &session, &mut repos, BulkOptions::new(&NullProgress)).unwrap();
        assert_eq!(stats.attempted, 0);
        assert_balanced(&stats);
    }

    #[test]
    fn progress_is_reported_per_unit() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut repos = vec![repo("one", true, None), repo("two", true, None)];
        let git = FakeGit::new();
        let progress = RecordingProgress::default();
        clone_missing(&git, &session, &mut repos, BulkOptions::new(&progress)).unwrap();

        let events = progress.events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, 1);
        assert_eq!(events[1].0, 2);
        assert_eq!(events[0].1, 2);
        assert_eq!(events[0].3, "Cloning");
    }

    #[test]
    fn run_log_is_written_per_run() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut repos = vec![repo("web", true, None)];
        let git = FakeGit::new();
        clone_missing(&git, &session, &mut repos, BulkOptions::new(&NullProgress)).unwrap();

        let entries: Vec<_> = fs::read_dir(session.storage.sync_logs_dir())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn held_lock_rejects_second_run() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let _lock = RunLock::try_acquire(&session.storage.lock_path())
            .unwrap()
            .unwrap();
        let mut repos = vec![repo("web", true, None)];
        let git = FakeGit::new();
        let result = clone_missing(&git, &session, &mut repos, BulkOptions::new(&NullProgress));
        assert!(result.is_err());
    }
}
