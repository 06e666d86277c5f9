use crate::paths::UserStorage;
use crate::stats::RunStats;
use anyhow::Context;
use serde::Serialize;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Snapshot of the whole repository set at log time.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RepoSetTotals {
    pub total: usize,
    pub local: usize,
    pub needs_update: usize,
}

#[derive(Serialize)]
struct RunLogRecord {
    run_id: String,
    operation: String,
    timestamp: String,
    username: String,
    statistics: Value,
    repositories_total: Option<usize>,
    repositories_local: Option<usize>,
    repositories_needs_update: Option<usize>,
}

/// Counters and per-repo results for the persisted record. Raw durations
/// stay out of the log; the summary view renders them instead.
pub fn stats_log_value(stats: &RunStats) -> Value {
    let results: Vec<Value> = stats
        .results
        .iter()
        .map(|outcome| {
            json!({
                "repo": outcome.repo_name,
                "status": outcome.status,
                "action": outcome.action,
                "message": outcome.message,
            })
        })
        .collect();
    json!({
        "attempted": stats.attempted,
        "cloned": stats.cloned,
        "synced": stats.synced,
        "updated": stats.updated,
        "repaired": stats.repaired,
        "failed": stats.failed,
        "skipped": stats.skipped,
        "successful": stats.succeeded(),
        "results": results,
    })
}

/// Writes one timestamp-named JSON record under `logs/sync/`. Never
/// overwrites: a name collision gets a numeric suffix. Persistence is a
/// best-effort side channel; callers log the error and keep their stats.
pub fn save_run_log(
    storage: &UserStorage,
    operation: &str,
    username: &str,
    statistics: Value,
    totals: Option<RepoSetTotals>,
) -> anyhow::Result<PathBuf> {
    let now = OffsetDateTime::now_utc();
    save_run_log_at(storage, operation, username, statistics, totals, now)
}

fn save_run_log_at(
    storage: &UserStorage,
    operation: &str,
    username: &str,
    statistics: Value,
    totals: Option<RepoSetTotals>,
    now: OffsetDateTime,
) -> anyhow::Result<PathBuf> {
    let record = RunLogRecord {
        run_id: Uuid::new_v4().to_string(),
        operation: operation.to_string(),
        timestamp: now.format(&Rfc3339).context("format timestamp")?,
        username: username.to_string(),
        statistics,
        repositories_total: totals.map(|totals| totals.total),
        repositories_local: totals.map(|totals| totals.local),
        repositories_needs_update: totals.map(|totals| totals.needs_update),
    };

    let logs_dir = storage.sync_logs_dir();
    fs::create_dir_all(&logs_dir).context("create sync log dir")?;
    let stamp = now
        .format(&time::format_description::parse(
            "[year][month][day]_[hour][minute][second]",
        )?)
        .context("format log stamp")?;
    let path = unique_log_path(&logs_dir, &safe_operation_name(operation), &stamp);
    let data = serde_json::to_string_pretty(&record).context("serialize run log")?;
    fs::write(&path, data).with_context(|| format!("write run log {}", path.display()))?;
    Ok(path)
}

fn safe_operation_name(operation: &str) -> String {
    let name: String = operation
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { '_' })
        .collect();
    if name.is_empty() { "run".to_string() } else { name }
}

fn unique_log_path(dir: &Path, safe_op: &str, stamp: &str) -> PathBuf {
    let mut suffix = 0;
    loop {
        let name = if suffix == 0 {
            format!("{safe_op}_{stamp}.json")
        } else {
            format!("{safe_op}_{stamp}-{suffix}.json")
        };
        let path = dir.join(name);
        if !path.exists() {
            return path;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{SyncAction, SyncOutcome, SyncStatus};
    use crate::stats::PullCredit;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_stats() -> RunStats {
        let mut stats = RunStats::new();
        stats.record(
            SyncOutcome {
                repo_name: "web".to_string(),
                status: SyncStatus::Cloned,
                message: "cloned".to_string(),
                duration: Duration::from_secs(2),
                action: SyncAction::Clone,
            },
            PullCredit::Synced,
        );
        stats
    }

    #[test]
    fn run_log_contains_record_fields_without_durations() {
        let tmp = TempDir::new().unwrap();
        let storage = UserStorage::new(tmp.path(), "alice");
        let stats = sample_stats();
        let path = save_run_log(
            &storage,
            "Sync All Repositories",
            "alice",
            stats_log_value(&stats),
            Some(RepoSetTotals {
                total: 3,
                local: 2,
                needs_update: 1,
            }),
        )
        .unwrap();

        let data = fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["operation"], "Sync All Repositories");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["repositories_total"], 3);
        assert_eq!(value["repositories_local"], 2);
        assert_eq!(value["repositories_needs_update"], 1);
        assert_eq!(value["statistics"]["cloned"], 1);
        assert_eq!(value["statistics"]["results"][0]["repo"], "web");
        assert!(value["statistics"]["results"][0].get("duration").is_none());
        assert!(!data.contains("duration"));
    }

    #[test]
    fn missing_totals_serialize_as_null() {
        let tmp = TempDir::new().unwrap();
        let storage = UserStorage::new(tmp.path(), "alice");
        let path = save_run_log(
            &storage,
            "Download",
            "alice",
            stats_log_value(&RunStats::new()),
            None,
        )
        .unwrap();
        let value: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert!(value["repositories_total"].is_null());
        assert!(value["repositories_local"].is_null());
    }

    #[test]
    fn log_names_never_collide() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("sync_all_20260101_000000.json"), "{}").unwrap();
        let path = unique_log_path(tmp.path(), "sync_all", "20260101_000000");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "sync_all_20260101_000000-1.json"
        );
    }

    #[test]
    fn operation_names_are_filesystem_safe() {
        assert_eq!(
            safe_operation_name("Sync with Repair"),
            "sync_with_repair".to_string()
        );
        assert_eq!(safe_operation_name(""), "run".to_string());
    }
}
