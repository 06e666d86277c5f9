use super::args::CommonArgs;
use super::shared::{build_session, load_cache, load_repositories};
use keeper_core::decision::{check_repo_update, count_local, count_needing_update};
use keeper_core::git::GitClient;
use keeper_core::health::{CloneHealth, classify_clone};
use keeper_core::provider::RepoProvider;
use keeper_github::GitHubClient;
use std::time::Duration;

pub(super) fn handle_status(common: &CommonArgs) -> anyhow::Result<()> {
    let session = build_session(common)?;
    let provider = GitHubClient::new()?;
    let repos = load_repositories(&provider, &session)?;
    let cache = load_cache(&session);

    let private = repos.iter().filter(|repo| repo.private).count();
    let forks = repos.iter().filter(|repo| repo.fork).count();
    let archived = repos.iter().filter(|repo| repo.archived).count();

    println!("Repositories for {}", session.username);
    println!("  total:        {}", repos.len());
    println!("  local:        {}", count_local(&repos, &session.storage));
    println!(
        "  needs update: {}",
        count_needing_update(&repos, &session.storage, cache.as_ref())
    );
    println!("  private:      {private}");
    println!("  public:       {}", repos.len() - private);
    println!("  forks:        {forks}");
    println!("  archived:     {archived}");

    match provider.rate_limit(&session) {
        Ok(limit) => println!(
            "API rate limit: {}/{} remaining",
            limit.remaining, limit.limit
        ),
        Err(err) => println!("API rate limit unavailable: {err}"),
    }
    Ok(())
}

pub(super) fn handle_list(common: &CommonArgs) -> anyhow::Result<()> {
    let session = build_session(common)?;
    let provider = GitHubClient::new()?;
    let repos = load_repositories(&provider, &session)?;
    let cache = load_cache(&session);

    if repos.is_empty() {
        println!("No repositories found.");
        return Ok(());
    }
    println!(
        "{:<40} {:<6} {:<22} {:<10} {:>9}",
        "name", "local", "state", "language", "size"
    );
    for repo in &repos {
        let check = check_repo_update(repo, &session.storage, cache.as_ref());
        println!(
            "{:<40} {:<6} {:<22} {:<10} {:>6.1} MB",
            truncate(&repo.name, 40),
            if repo.local_exists { "yes" } else { "no" },
            truncate(&check.reason(), 22),
            repo.language.as_deref().unwrap_or("-"),
            repo.size_kb as f64 / 1024.0
        );
    }
    Ok(())
}

pub(super) fn handle_health(common: &CommonArgs) -> anyhow::Result<()> {
    let session = build_session(common)?;
    let provider = GitHubClient::new()?;
    let repos = load_repositories(&provider, &session)?;
    let git = GitClient::new();

    let mut healthy = 0usize;
    let mut broken = 0usize;
    let mut missing = 0usize;
    for repo in &repos {
        let path = session.storage.repo_dir(&repo.name);
        match classify_clone(&git, &path, Duration::from_secs(5)) {
            CloneHealth::Healthy => healthy += 1,
            CloneHealth::Broken => {
                broken += 1;
                println!("broken:  {}", repo.name);
            }
            CloneHealth::Missing => missing += 1,
        }
    }

    println!("\nHealth status");
    println!("  healthy: {healthy}");
    println!("  broken:  {broken}");
    println!("  missing: {missing}");
    if broken > 0 || missing > 0 {
        println!("Run `repokeeper sync repair` to fix broken clones.");
    }
    Ok(())
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let kept: String = value.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}
