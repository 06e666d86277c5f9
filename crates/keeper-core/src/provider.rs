use crate::model::{RepoRecord, SyncSession};
use time::OffsetDateTime;

/// Remote API rate-limit counters, surfaced read-only.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Option<OffsetDateTime>,
}

/// The remote repository inventory service.
pub trait RepoProvider {
    fn list_repos(&self, session: &SyncSession) -> anyhow::Result<Vec<RepoRecord>>;
    fn rate_limit(&self, session: &SyncSession) -> anyhow::Result<RateLimit>;
}
