use super::args::{CommonArgs, DownloadArgs, SyncArgs, SyncModeArg};
use super::shared::{
    build_session, confirm, load_repositories, print_download_summary, print_sync_summary,
};
use crate::progress::TerminalProgress;
use anyhow::Context;
use keeper_core::download::{DownloadOptions, DownloadRequest, download_one, run_bulk_download};
use keeper_core::git::GitClient;
use keeper_core::model::SyncSession;
use keeper_core::orchestrator::{BulkMode, BulkOptions, BulkRequest, run_bulk};
use keeper_core::progress::{NullProgress, ProgressReporter};
use keeper_core::run_log::save_run_log;
use keeper_github::{GitHubArchiveDownloader, GitHubClient};
use std::time::Duration;
use tracing::warn;

pub(super) fn handle_sync(common: &CommonArgs, args: &SyncArgs) -> anyhow::Result<()> {
    let session = build_session(common)?;
    let provider = GitHubClient::new()?;
    let mut repos = load_repositories(&provider, &session)?;
    let git = GitClient::new();

    let mode = match args.mode {
        SyncModeArg::All => BulkMode::SyncAll,
        SyncModeArg::Needed => BulkMode::UpdateNeeded,
        SyncModeArg::Missing => BulkMode::CloneMissing,
        SyncModeArg::Repair => BulkMode::Repair,
        SyncModeArg::Reclone => BulkMode::RecloneAll,
    };

    let assume_yes = common.yes;
    let ask = move |request: &BulkRequest| {
        let question = if request.mode.destructive() {
            format!(
                "Delete and re-clone {} repositories? Local-only changes are lost",
                request.repo_count
            )
        } else {
            format!(
                "{} {} repositories?",
                request.mode.label(),
                request.repo_count
            )
        };
        confirm(&question, assume_yes)
    };

    let progress = progress_for(common);
    let options = BulkOptions::new(progress.as_ref())
        .with_confirm(&ask);
    let stats = run_bulk(&git, &session, &mut repos, mode, options)?;
    print_sync_summary(mode.operation_name(), &stats);
    Ok(())
}

pub(super) fn handle_download(common: &CommonArgs, args: &DownloadArgs) -> anyhow::Result<()> {
    let session = build_session(common)?;
    let provider = GitHubClient::new()?;
    let repos = load_repositories(&provider, &session)?;
    let downloader = GitHubArchiveDownloader::new()?;
    let unit_timeout = Duration::from_secs(args.timeout_secs);

    if let Some(name) = args.repo.as_deref() {
        let repo = repos
            .iter()
            .find(|repo| repo.name == name)
            .with_context(|| format!("no repository named {name}"))?;
        let outcome = download_one(&downloader, &session, repo, unit_timeout)?;
        println!("{}: {}", outcome.repo_name, outcome.message);
        save_download_log(&session, "Download Single Repository", &outcome);
        return Ok(());
    }

    let assume_yes = common.yes;
    let ask = move |request: &DownloadRequest| {
        confirm(
            &format!(
                "Download all branches of {} repositories as zip archives ({} workers)? \
                 This may take a long time and use significant disk space",
                request.repo_count, request.workers
            ),
            assume_yes,
        )
    };

    let progress = progress_for(common);
    let mut options = DownloadOptions::new(progress.as_ref());
    options.workers = args.jobs;
    options.unit_timeout = unit_timeout;
    options.confirm = Some(&ask);
    let stats = run_bulk_download(&downloader, &session, &repos, options)?;
    print_download_summary(&stats);

    if let Err(err) = save_run_log(
        &session.storage,
        "Download All Repositories",
        &session.username,
        keeper_core::download::download_stats_log_value(&stats),
        None,
    ) {
        warn!(error = %err, "failed to save download log");
    }
    Ok(())
}

fn save_download_log(
    session: &SyncSession,
    operation: &str,
    outcome: &keeper_core::download::DownloadOutcome,
) {
    let mut stats = keeper_core::download::DownloadStats::new();
    stats.record(outcome.clone());
    if let Err(err) = save_run_log(
        &session.storage,
        operation,
        &session.username,
        keeper_core::download::download_stats_log_value(&stats),
        None,
    ) {
        warn!(error = %err, "failed to save download log");
    }
}

fn progress_for(common: &CommonArgs) -> Box<dyn ProgressReporter> {
    if common.quiet {
        Box::new(NullProgress)
    } else {
        Box::new(TerminalProgress)
    }
}
