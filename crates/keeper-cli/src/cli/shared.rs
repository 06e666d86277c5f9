use super::args::CommonArgs;
use anyhow::Context;
use keeper_core::cache::SyncCache;
use keeper_core::decision::refresh_local_state;
use keeper_core::download::DownloadStats;
use keeper_core::model::{RepoRecord, SyncSession};
use keeper_core::paths::UserStorage;
use keeper_core::provider::RepoProvider;
use keeper_core::stats::RunStats;
use std::io::{BufRead, Write};
use std::time::Duration;
use tracing::warn;

pub(super) fn build_session(common: &CommonArgs) -> anyhow::Result<SyncSession> {
    let username = common
        .user
        .as_deref()
        .context("missing --user; which GitHub account should be inventoried?")?;
    let token = common
        .token
        .clone()
        .or_else(|| std::env::var("GITHUB_TOKEN").ok());
    let storage = match common.root.as_ref() {
        Some(root) => UserStorage::new(root, username),
        None => UserStorage::for_user(username)?,
    };
    Ok(SyncSession::new(username, token, storage))
}

/// Fetches the inventory and refreshes the local-state flags on each record.
pub(super) fn load_repositories(
    provider: &dyn RepoProvider,
    session: &SyncSession,
) -> anyhow::Result<Vec<RepoRecord>> {
    let mut repos = provider
        .list_repos(session)
        .context("fetch repository inventory")?;
    let cache = load_cache(session);
    for repo in repos.iter_mut() {
        refresh_local_state(repo, &session.storage, cache.as_ref());
    }
    Ok(repos)
}

pub(super) fn load_cache(session: &SyncSession) -> Option<SyncCache> {
    match SyncCache::load(&session.storage.cache_path()) {
        Ok(cache) => Some(cache),
        Err(err) => {
            warn!(error = %err, "sync cache unreadable");
            None
        }
    }
}

/// Interactive yes/no gate; `--yes` answers affirmatively without prompting.
pub(super) fn confirm(question: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "{question} [y/N]: ");
    let _ = stdout.flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub(super) fn print_sync_summary(operation: &str, stats: &RunStats) {
    println!("\n{} summary", operation);
    println!("  attempted: {}", stats.attempted);
    if stats.cloned > 0 {
        println!("  cloned:    {}", stats.cloned);
    }
    if stats.synced > 0 {
        println!("  synced:    {}", stats.synced);
    }
    if stats.updated > 0 {
        println!("  updated:   {}", stats.updated);
    }
    if stats.repaired > 0 {
        println!("  repaired:  {}", stats.repaired);
    }
    println!("  skipped:   {}", stats.skipped);
    println!("  failed:    {}", stats.failed);
    if !stats.durations.is_empty() {
        println!("  total time:   {}", format_duration(stats.total_duration()));
        println!(
            "  avg per repo: {}",
            format_duration(stats.average_duration())
        );
    }
    for outcome in stats.results.iter().filter(|outcome| !outcome.succeeded()) {
        println!("  failed {}: {}", outcome.repo_name, outcome.message);
    }
}

pub(super) fn print_download_summary(stats: &DownloadStats) {
    println!("\nDownload summary");
    println!("  attempted:  {}", stats.attempted);
    println!("  downloaded: {}", stats.downloaded);
    println!("  failed:     {}", stats.failed);
    println!("  skipped:    {}", stats.skipped);
    println!("  branches:   {}", stats.total_branches);
    println!("  size:       {:.2} MB", stats.total_bytes as f64 / 1_048_576.0);
    for outcome in stats.results.iter() {
        if outcome.status == keeper_core::download::DownloadStatus::Failed {
            println!("  failed {}: {}", outcome.repo_name, outcome.message);
        }
    }
}

pub(super) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let minutes = (secs / 60.0).floor() as u64;
        format!("{minutes}m {:.1}s", secs - minutes as f64 * 60.0)
    }
}
