use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const CACHE_VERSION: u32 = 1;

/// Per-user sync bookkeeping. `last_sync` records, per repository name, the
/// unix time of the last operation that left the clone matching the remote;
/// the update decision engine compares it against the remote push timestamp.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncCache {
    pub version: u32,
    #[serde(default)]
    pub last_sync: HashMap<String, u64>,
}

impl SyncCache {
    pub fn new() -> Self {
        Self {
            version: CACHE_VERSION,
            last_sync: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path)?;
        let cache: SyncCache = serde_json::from_str(&data)?;
        if cache.version > CACHE_VERSION {
            anyhow::bail!("unsupported cache version {}", cache.version);
        }
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn record_sync(&mut self, repo_name: &str, now: u64) {
        self.last_sync.insert(repo_name.to_string(), now);
    }

    pub fn last_sync_for(&self, repo_name: &str) -> Option<u64> {
        self.last_sync.get(repo_name).copied()
    }

    pub fn forget(&mut self, repo_name: &str) {
        self.last_sync.remove(repo_name);
    }
}
