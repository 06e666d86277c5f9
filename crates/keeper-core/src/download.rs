use crate::model::{RepoRecord, SyncSession};
use crate::progress::ProgressReporter;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Per-branch result inside one repository download.
#[derive(Debug, Clone)]
pub struct BranchDownload {
    pub branch: String,
    pub size_bytes: u64,
    pub succeeded: bool,
}

/// What the archive service reports for one repository.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub branches_total: u32,
    pub branches_downloaded: u32,
    pub total_bytes: u64,
    pub branches: Vec<BranchDownload>,
}

/// Opaque all-branches zip download service. `Sync` so the worker pool can
/// share one instance across threads.
pub trait ArchiveDownloader: Sync {
    fn download_all_branches(
        &self,
        repo: &RepoRecord,
        token: Option<&str>,
        dest: &Path,
    ) -> anyhow::Result<DownloadReport>;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DownloadStatus {
    Downloaded,
    Failed,
    Skipped,
}

impl DownloadStatus {
    fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub repo_name: String,
    pub status: DownloadStatus,
    pub message: String,
    pub branches_total: u32,
    pub branches_downloaded: u32,
    pub bytes: u64,
    pub duration: Duration,
}

/// Counters for one bulk download run; same balance invariant as the sync
/// stats: attempted = downloaded + failed + skipped.
#[derive(Debug, Default)]
pub struct DownloadStats {
    pub attempted: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_branches: u32,
    pub total_bytes: u64,
    pub results: Vec<DownloadOutcome>,
    pub durations: Vec<Duration>,
}

impl DownloadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: DownloadOutcome) {
        self.attempted += 1;
        self.durations.push(outcome.duration);
        match outcome.status {
            DownloadStatus::Downloaded => {
                self.downloaded += 1;
                self.total_branches += outcome.branches_downloaded;
                self.total_bytes += outcome.bytes;
            }
            DownloadStatus::Failed => self.failed += 1,
            DownloadStatus::Skipped => self.skipped += 1,
        }
        self.results.push(outcome);
    }
}

/// Counters and results for the persisted record, durations stripped.
pub fn download_stats_log_value(stats: &DownloadStats) -> Value {
    let results: Vec<Value> = stats
        .results
        .iter()
        .map(|outcome| {
            json!({
                "repo": outcome.repo_name,
                "status": outcome.status.as_str(),
                "message": outcome.message,
                "branches_downloaded": outcome.branches_downloaded,
                "branches_total": outcome.branches_total,
                "bytes": outcome.bytes,
            })
        })
        .collect();
    json!({
        "attempted": stats.attempted,
        "downloaded": stats.downloaded,
        "failed": stats.failed,
        "skipped": stats.skipped,
        "total_branches": stats.total_branches,
        "total_bytes": stats.total_bytes,
        "results": results,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest {
    pub repo_count: usize,
    pub workers: usize,
}

pub struct DownloadOptions<'a> {
    /// 0 means auto: available parallelism minus one, at least one.
    pub workers: usize,
    pub unit_timeout: Duration,
    pub stop: Arc<AtomicBool>,
    pub progress: &'a dyn ProgressReporter,
    pub confirm: Option<&'a dyn Fn(&DownloadRequest) -> bool>,
}

impl<'a> DownloadOptions<'a> {
    pub fn new(progress: &'a dyn ProgressReporter) -> Self {
        Self {
            workers: 0,
            unit_timeout: Duration::from_secs(300),
            stop: Arc::new(AtomicBool::new(false)),
            progress,
            confirm: None,
        }
    }
}

pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|value| value.get())
        .unwrap_or(4);
    cpus.saturating_sub(1).max(1)
}

enum DownloadEvent {
    Finished {
        repo_name: String,
        result: anyhow::Result<DownloadReport>,
        duration: Duration,
    },
}

/// Downloads every repository's branches as zip archives under a bounded
/// worker pool. Records stay read-only during the parallel phase; outcomes
/// are folded on the orchestrating thread in completion order.
pub fn run_bulk_download(
    downloader: &dyn ArchiveDownloader,
    session: &SyncSession,
    repos: &[RepoRecord],
    options: DownloadOptions<'_>,
) -> anyhow::Result<DownloadStats> {
    let workers = if options.workers == 0 {
        default_worker_count()
    } else {
        options.workers
    }
    .min(repos.len().max(1));

    let request = DownloadRequest {
        repo_count: repos.len(),
        workers,
    };
    if let Some(confirm) = options.confirm
        && !confirm(&request)
    {
        info!("bulk download declined by caller");
        return Ok(DownloadStats::new());
    }

    session.storage.ensure_layout()?;
    let dest = session.storage.downloads_dir();
    let token = session.token.as_deref();
    let total = repos.len();

    info!(repos = total, workers, "starting bulk download");

    let mut stats = DownloadStats::new();
    let queue: Mutex<Vec<&RepoRecord>> = Mutex::new(repos.iter().rev().collect());
    let stop = &options.stop;
    let (tx, rx) = mpsc::channel::<DownloadEvent>();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let dest = &dest;
            scope.spawn(move || {
                loop {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let next = {
                        let mut guard = queue.lock().unwrap();
                        guard.pop()
                    };
                    let Some(repo) = next else {
                        break;
                    };
                    let started = Instant::now();
                    let result = downloader.download_all_branches(repo, token, dest);
                    let _ = tx.send(DownloadEvent::Finished {
                        repo_name: repo.name.clone(),
                        result,
                        duration: started.elapsed(),
                    });
                }
            });
        }
        drop(tx);

        let mut completed = 0usize;
        while let Ok(event) = rx.recv() {
            let DownloadEvent::Finished {
                repo_name,
                result,
                duration,
            } = event;
            completed += 1;
            let outcome = fold_result(&repo_name, result, duration, options.unit_timeout);
            if outcome.status == DownloadStatus::Failed {
                warn!(repo = %repo_name, message = %outcome.message, "download failed");
            }
            stats.record(outcome);
            options
                .progress
                .report(completed, total, &repo_name, "Downloading");
        }
    });

    // Units the workers never picked up were cancelled; they count skipped.
    let mut remaining = queue.into_inner().unwrap();
    while let Some(repo) = remaining.pop() {
        stats.record(DownloadOutcome {
            repo_name: repo.name.clone(),
            status: DownloadStatus::Skipped,
            message: "download stopped before start".to_string(),
            branches_total: 0,
            branches_downloaded: 0,
            bytes: 0,
            duration: Duration::ZERO,
        });
    }

    info!(
        attempted = stats.attempted,
        downloaded = stats.downloaded,
        failed = stats.failed,
        skipped = stats.skipped,
        "bulk download finished"
    );
    Ok(stats)
}

/// One repository, no pool; used by the single-download command.
pub fn download_one(
    downloader: &dyn ArchiveDownloader,
    session: &SyncSession,
    repo: &RepoRecord,
    unit_timeout: Duration,
) -> anyhow::Result<DownloadOutcome> {
    session.storage.ensure_layout()?;
    let started = Instant::now();
    let result = downloader.download_all_branches(
        repo,
        session.token.as_deref(),
        &session.storage.downloads_dir(),
    );
    Ok(fold_result(&repo.name, result, started.elapsed(), unit_timeout))
}

fn fold_result(
    repo_name: &str,
    result: anyhow::Result<DownloadReport>,
    duration: Duration,
    unit_timeout: Duration,
) -> DownloadOutcome {
    if duration > unit_timeout {
        return DownloadOutcome {
            repo_name: repo_name.to_string(),
            status: DownloadStatus::Failed,
            message: format!("download timed out after {}s", unit_timeout.as_secs()),
            branches_total: 0,
            branches_downloaded: 0,
            bytes: 0,
            duration,
        };
    }
    match result {
        Ok(report) => DownloadOutcome {
            repo_name: repo_name.to_string(),
            status: DownloadStatus::Downloaded,
            message: format!(
                "{}/{} branches ({} bytes)",
                report.branches_downloaded, report.branches_total, report.total_bytes
            ),
            branches_total: report.branches_total,
            branches_downloaded: report.branches_downloaded,
            bytes: report.total_bytes,
            duration,
        },
        Err(err) => DownloadOutcome {
            repo_name: repo_name.to_string(),
            status: DownloadStatus::Failed,
            message: err.to_string(),
            branches_total: 0,
            branches_downloaded: 0,
            bytes: 0,
            duration,
        },
    }
}
