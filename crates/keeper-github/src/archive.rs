use crate::http::send_with_retry;
use crate::models::BranchItem;
use anyhow::Context;
use keeper_core::download::{ArchiveDownloader, BranchDownload, DownloadReport};
use keeper_core::model::RepoRecord;
use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

/// Downloads every branch of a repository as a zipball through the GitHub
/// API. One failing branch never aborts the rest.
pub struct GitHubArchiveDownloader {
    client: Client,
    api_base: String,
}

impl GitHubArchiveDownloader {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("repokeeper")
            .timeout(Duration::from_secs(120))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    fn list_branches(&self, repo: &RepoRecord, token: Option<&str>) -> anyhow::Result<Vec<String>> {
        let mut branches = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/repos/{}/branches?per_page={PER_PAGE}&page={page}",
                self.api_base, repo.full_name
            );
            let payload: Vec<BranchItem> = self
                .get(&url, token)?
                .json()
                .context("parse branch page")?;
            let count = payload.len();
            branches.extend(payload.into_iter().map(|branch| branch.name));
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(branches)
    }

    fn download_branch(
        &self,
        repo: &RepoRecord,
        branch: &str,
        token: Option<&str>,
        repo_dir: &Path,
    ) -> anyhow::Result<u64> {
        let url = format!(
            "{}/repos/{}/zipball/{branch}",
            self.api_base, repo.full_name
        );
        let bytes = self.get(&url, token)?.bytes().context("read zipball body")?;
        let file = repo_dir.join(format!("{}_{}.zip", repo.name, safe_branch_name(branch)));
        fs::write(&file, &bytes).with_context(|| format!("write archive {}", file.display()))?;
        Ok(bytes.len() as u64)
    }

    fn get(&self, url: &str, token: Option<&str>) -> anyhow::Result<reqwest::blocking::Response> {
        send_with_retry(|| {
            let mut request = self
                .client
                .get(url)
                .header("accept", "application/vnd.github+json");
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            Ok(request)
        })
    }
}

impl ArchiveDownloader for GitHubArchiveDownloader {
    fn download_all_branches(
        &self,
        repo: &RepoRecord,
        token: Option<&str>,
        dest: &Path,
    ) -> anyhow::Result<DownloadReport> {
        let branches = self.list_branches(repo, token)?;
        let repo_dir = dest.join(&repo.name);
        fs::create_dir_all(&repo_dir)
            .with_context(|| format!("create download dir {}", repo_dir.display()))?;

        let mut report = DownloadReport {
            branches_total: branches.len() as u32,
            ..DownloadReport::default()
        };
        for branch in branches {
            match self.download_branch(repo, &branch, token, &repo_dir) {
                Ok(size) => {
                    report.branches_downloaded += 1;
                    report.total_bytes += size;
                    report.branches.push(BranchDownload {
                        branch,
                        size_bytes: size,
                        succeeded: true,
                    });
                }
                Err(err) => {
                    warn!(repo = %repo.name, branch = %branch, error = %err, "branch download failed");
                    report.branches.push(BranchDownload {
                        branch,
                        size_bytes: 0,
                        succeeded: false,
                    });
                }
            }
        }
        info!(
            repo = %repo.name,
            downloaded = report.branches_downloaded,
            total = report.branches_total,
            bytes = report.total_bytes,
            "repository archives downloaded"
        );
        Ok(report)
    }
}

fn safe_branch_name(branch: &str) -> String {
    branch
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch == '-' || ch == '.' { ch } else { '_' })
        .collect()
}
