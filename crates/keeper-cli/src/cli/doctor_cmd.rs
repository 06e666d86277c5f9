use super::args::CommonArgs;
use super::shared::build_session;
use keeper_core::provider::RepoProvider;
use keeper_github::GitHubClient;
use keeper_github::diagnostics::{external_ip, github_ssh_reachable};
use std::time::Duration;

/// Go/no-go gate before syncing: ssh reachability, external IP, API access.
pub(super) fn handle_doctor(common: &CommonArgs) -> anyhow::Result<()> {
    let ssh_ok = github_ssh_reachable(Duration::from_secs(3)).unwrap_or(false);
    println!(
        "ssh github.com:22 ... {}",
        if ssh_ok { "reachable" } else { "unreachable" }
    );

    match external_ip() {
        Some(ip) => println!("external ip ........ {ip}"),
        None => println!("external ip ........ unavailable"),
    }

    let api_ok = match build_session(common) {
        Ok(session) => {
            let provider = GitHubClient::new()?;
            match provider.rate_limit(&session) {
                Ok(limit) => {
                    println!(
                        "github api ......... ok ({}/{} requests remaining)",
                        limit.remaining, limit.limit
                    );
                    true
                }
                Err(err) => {
                    println!("github api ......... failed: {err}");
                    false
                }
            }
        }
        Err(err) => {
            println!("github api ......... skipped: {err}");
            false
        }
    };

    println!(
        "\nready to sync: {}",
        if ssh_ok && api_ok { "yes" } else { "no" }
    );
    Ok(())
}
