use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::models::InitialPage;

/// Pre-fetched first page as written at build time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub host: String,
    pub generated_at: DateTime<Utc>,
    pub initial: InitialPage,
}

impl StoredSnapshot {
    /// Whether the snapshot is still inside its revalidate window at `now`
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.generated_at);
        match age.to_std() {
            Ok(age) => age < max_age,
            // generated "in the future": clock skew, treat as fresh
            Err(_) => true,
        }
    }
}

/// JSON store for build-time first pages, one file per publication host
pub struct SnapshotStore {
    snapshots_dir: PathBuf,
}

impl SnapshotStore {
    /// Opens the store in the default data directory
    pub fn new() -> Result<Self> {
        let base_dir = if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
            PathBuf::from(xdg_data).join("recapfeed")
        } else {
            // XDG default
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share/recapfeed")
        };

        Self::at(&base_dir)
    }

    pub fn at(base_dir: &Path) -> Result<Self> {
        let snapshots_dir = base_dir.join("snapshots");
        fs::create_dir_all(&snapshots_dir).with_context(|| {
            format!("Failed to create snapshot directory {}", snapshots_dir.display())
        })?;
        Ok(Self { snapshots_dir })
    }

    pub fn store(&self, host: &str, initial: &InitialPage) -> Result<StoredSnapshot> {
        let snapshot = StoredSnapshot {
            host: host.to_string(),
            generated_at: Utc::now(),
            initial: initial.clone(),
        };

        let path = self.path_for(host);
        // write then rename so a concurrent reader never sees half a file
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(&snapshot)?)
            .with_context(|| format!("Failed to write snapshot {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to replace snapshot {}", path.display()))?;

        debug!(host, posts = initial.page.posts.len(), "stored first page snapshot");
        Ok(snapshot)
    }

    pub fn load(&self, host: &str) -> Result<Option<StoredSnapshot>> {
        let path = self.path_for(host);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Invalid snapshot format in {}", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Returns the stored first page only if it is younger than `max_age`
    pub fn load_fresh(&self, host: &str, max_age: Duration) -> Result<Option<InitialPage>> {
        Ok(self
            .load(host)?
            .filter(|s| s.is_fresh(max_age, Utc::now()))
            .map(|s| s.initial))
    }

    fn path_for(&self, host: &str) -> PathBuf {
        self.snapshots_dir.join(format!("{}.json", sanitize_filename(host)))
    }
}

fn sanitize_filename(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect()
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
