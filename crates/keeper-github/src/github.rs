use crate::http::send_with_retry;
use crate::models::{ApiRepo, RateLimitResponse};
use anyhow::Context;
use keeper_core::model::{RepoRecord, SyncSession};
use keeper_core::provider::{RateLimit, RepoProvider};
use reqwest::blocking::Client;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::info;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

/// Blocking GitHub API client. With a token it lists the authenticated
/// user's repositories (private included); without one it falls back to the
/// public listing for the session's username.
pub struct GitHubClient {
    client: Client,
    api_base: String,
}

impl GitHubClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("repokeeper")
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    fn repos_url(&self, session: &SyncSession, page: usize) -> String {
        if session.token.is_some() {
            format!(
                "{}/user/repos?per_page={PER_PAGE}&page={page}&affiliation=owner",
                self.api_base
            )
        } else {
            format!(
                "{}/users/{}/repos?per_page={PER_PAGE}&page={page}",
                self.api_base, session.username
            )
        }
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

impl RepoProvider for GitHubClient {
    fn list_repos(&self, session: &SyncSession) -> anyhow::Result<Vec<RepoRecord>> {
        let token = session.token.as_deref();
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let url = self.repos_url(session, page);
            let payload: Vec<ApiRepo> = self
                .get(&url, token)?
                .json()
                .context("parse repository page")?;
            let count = payload.len();
            records.extend(payload.into_iter().map(ApiRepo::into_record));
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        info!(user = %session.username, repos = records.len(), "fetched repository inventory");
        Ok(records)
    }

    fn rate_limit(&self, session: &SyncSession) -> anyhow::Result<RateLimit> {
        let url = format!("{}/rate_limit", self.api_base);
        let payload: RateLimitResponse = self
            .get(&url, session.token.as_deref())?
            .json()
            .context("parse rate limit")?;
        Ok(RateLimit {
            limit: payload.resources.core.limit,
            remaining: payload.resources.core.remaining,
            reset_at: payload
                .resources
                .core
                .reset
                .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok()),
        })
    }
}
