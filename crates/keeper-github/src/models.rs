use keeper_core::model::RepoRecord;
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRepo {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) html_url: String,
    pub(crate) ssh_url: Option<String>,
    #[serde(default)]
    pub(crate) private: bool,
    #[serde(default)]
    pub(crate) fork: bool,
    #[serde(default)]
    pub(crate) archived: bool,
    pub(crate) language: Option<String>,
    /// Kilobytes, as the API reports it.
    #[serde(default)]
    pub(crate) size: u64,
    pub(crate) default_branch: Option<String>,
    pub(crate) pushed_at: Option<String>,
}

impl ApiRepo {
    pub(crate) fn into_record(self) -> RepoRecord {
        let last_update = self
            .pushed_at
            .as_deref()
            .and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok());
        RepoRecord {
            name: self.name,
            full_name: self.full_name,
            html_url: self.html_url,
            ssh_url: self.ssh_url,
            private: self.private,
            fork: self.fork,
            archived: self.archived,
            language: self.language,
            size_kb: self.size,
            default_branch: self.default_branch.unwrap_or_else(|| "main".to_string()),
            last_update,
            local_exists: false,
            need_update: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BranchItem {
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResponse {
    pub(crate) resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResources {
    pub(crate) core: RateWindow,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateWindow {
    pub(crate) limit: u32,
    pub(crate) remaining: u32,
    pub(crate) reset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_repo_maps_into_record() {
        let value = json!({
            "name": "web",
            "full_name": "alice/web",
            "html_url": "https://github.com/alice/web",
            "ssh_url": "git@github.com:alice/web.git",
            "private": true,
            "fork": false,
            "archived": false,
            "language": "Rust",
            "size": 420,
            "default_branch": "main",
            "pushed_at": "2026-01-02T03:04:05Z"
        });
        let repo: ApiRepo = serde_json::from_value(value).unwrap();
        let record = repo.into_record();
        assert_eq!(record.name, "web");
        assert!(record.private);
        assert_eq!(record.size_kb, 420);
        assert_eq!(record.last_update.unwrap().unix_timestamp(), 1767323045);
    }

    #[test]
    fn missing_ssh_url_and_branch_get_defaults() {
        let value = json!({
            "name": "site",
            "full_name": "alice/site",
            "html_url": "https://github.com/alice/site",
            "ssh_url": null,
            "language": null,
            "default_branch": null,
            "pushed_at": "not-a-timestamp"
        });
        let repo: ApiRepo = serde_json::from_value(value).unwrap();
        let record = repo.into_record();
        assert!(record.ssh_url.is_none());
        assert_eq!(record.default_branch, "main");
        assert!(record.last_update.is_none());
    }

    #[test]
    fn rate_limit_response_parses() {
        let value = json!({
            "resources": { "core": { "limit": 5000, "remaining": 4200, "reset": 1767323045 } }
        });
        let limits: RateLimitResponse = serde_json::from_value(value).unwrap();
        assert_eq!(limits.resources.core.limit, 5000);
        assert_eq!(limits.resources.core.remaining, 4200);
    }
}
