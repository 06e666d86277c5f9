use crate::operation::{SyncOutcome, SyncStatus};
use std::time::Duration;

/// Which counter a successful pull feeds: the update-needed mode reports
/// `updated`, every other mode reports `synced`. Mirrors the per-operation
/// stats the original tool kept.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PullCredit {
    Synced,
    Updated,
}

/// Counters and outcomes for one bulk run. Fresh per run, read once for the
/// summary and the persisted log record, then discarded.
#[derive(Debug, Default)]
pub struct RunStats {
    pub attempted: usize,
    pub cloned: usize,
    pub synced: usize,
    pub updated: usize,
    pub repaired: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Completion order, not submission order, under concurrency.
    pub results: Vec<SyncOutcome>,
    pub durations: Vec<Duration>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: SyncOutcome, pull_credit: PullCredit) {
        self.attempted += 1;
        self.durations.push(outcome.duration);
        match outcome.status {
            SyncStatus::Cloned => self.cloned += 1,
            SyncStatus::Repaired => self.repaired += 1,
            SyncStatus::Updated => match pull_credit {
                PullCredit::Synced => self.synced += 1,
                PullCredit::Updated => self.updated += 1,
            },
            SyncStatus::AlreadyUpToDate | SyncStatus::Skipped => self.skipped += 1,
            SyncStatus::Failed => self.failed += 1,
        }
        self.results.push(outcome);
    }

    pub fn succeeded(&self) -> usize {
        self.cloned + self.synced + self.updated + self.repaired
    }

    pub fn total_duration(&self) -> Duration {
        self.durations.iter().sum()
    }

    pub fn average_duration(&self) -> Duration {
        if self.durations.is_empty() {
            Duration::ZERO
        } else {
            self.total_duration() / self.durations.len() as u32
        }
    }
}
