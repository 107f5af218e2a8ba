//! Backup and retention
//!
//! A slow periodic task that bundles every persisted namespace into one
//! timestamped JSON document and keeps only the most recent snapshots.

use std::path::PathBuf;
use std::sync::Arc;

use glob::glob;
use serde_json::{Map, Value};
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::BACKUP_TARGET;
use crate::gateway::Clock;
use crate::store::{JsonStore, StoreError, StoreResult};

/// Seconds between backup snapshots
pub const BACKUP_INTERVAL_SECS: u64 = 1800;

/// Snapshots retained before the oldest is deleted
pub const BACKUP_RETENTION: usize = 48;

/// Periodic combined snapshot of all durable state
pub struct BackupTask {
    store: Arc<JsonStore>,
    clock: Arc<dyn Clock>,
    dir: PathBuf,
}

impl BackupTask {
    pub fn new(store: Arc<JsonStore>, clock: Arc<dyn Clock>, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            clock,
            dir: dir.into(),
        }
    }

    /// Spawn the backup loop onto the runtime.
    pub fn start(self, interval_seconds: u64) {
        tokio::spawn(async move {
            self.run(interval_seconds).await;
        });
    }

    async fn run(&self, interval_seconds: u64) {
        info!(
            target: BACKUP_TARGET,
            "starting backup task with {interval_seconds}s interval"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
        loop {
            interval.tick().await;
            match self.snapshot().await {
                Ok(path) => {
                    info!(target: BACKUP_TARGET, path = %path.display(), "data backup complete");
                }
                Err(err) => {
                    error!(target: BACKUP_TARGET, error = %err, "failed to perform data backup");
                }
            }
        }
    }

    /// Write one combined snapshot and apply the retention policy.
    ///
    /// # Errors
    /// Returns a `StoreError` when the backup directory or file cannot be
    /// written.
    pub async fn snapshot(&self) -> StoreResult<PathBuf> {
        let mut combined = Map::new();
        for namespace in self.store.namespaces() {
            if let Some(value) = self.store.snapshot(&namespace).await {
                combined.insert(namespace, value);
            }
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let stamp = self.clock.now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("backup_{stamp}.json"));
        let body =
            serde_json::to_string_pretty(&Value::Object(combined)).map_err(|source| {
                StoreError::Encode {
                    namespace: "backup".to_string(),
                    source,
                }
            })?;

        tokio::fs::write(&path, body)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        self.rotate().await;
        Ok(path)
    }

    /// Delete the oldest snapshots beyond the retention count. Timestamped
    /// names sort lexicographically, so a plain sort orders them by age.
    async fn rotate(&self) {
        let pattern = self.dir.join("backup_*.json");
        let Ok(paths) = glob(&pattern.to_string_lossy()) else {
            return;
        };

        let mut snapshots: Vec<PathBuf> = paths.flatten().collect();
        snapshots.sort();

        if snapshots.len() <= BACKUP_RETENTION {
            return;
        }

        let excess = snapshots.len() - BACKUP_RETENTION;
        for path in snapshots.into_iter().take(excess) {
            if let Err(err) = tokio::fs::remove_file(&path).await {
                warn!(
                    target: BACKUP_TARGET,
                    path = %path.display(),
                    error = %err,
                    "failed to delete rotated backup"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_support::SteppingClock;
    use crate::store::GuildMap;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn temp_dirs() -> (Arc<JsonStore>, PathBuf) {
        let root = std::env::temp_dir().join(format!("raffle-backup-{}", uuid::Uuid::new_v4()));
        (Arc::new(JsonStore::new(root.join("data"))), root.join("backups"))
    }

    fn stepping_clock() -> Arc<SteppingClock> {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Arc::new(SteppingClock::new(base, chrono::Duration::seconds(1)))
    }

    async fn seeded_store(store: &JsonStore) {
        let mut map: GuildMap<u32> = GuildMap::new();
        let mut guild = BTreeMap::new();
        guild.insert("3".to_string(), 7);
        map.insert("1".to_string(), guild);
        store.save("giveaways", &map).await.unwrap();
        store.save("warnings", &map).await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_bundles_all_namespaces() {
        let (store, backup_dir) = temp_dirs();
        seeded_store(&store).await;

        let task = BackupTask::new(Arc::clone(&store), stepping_clock(), &backup_dir);
        let path = task.snapshot().await.unwrap();

        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(value.get("giveaways").is_some());
        assert!(value.get("warnings").is_some());
        assert_eq!(value["giveaways"]["1"]["3"], 7);
    }

    #[tokio::test]
    async fn test_rotation_keeps_newest_snapshots() {
        let (store, backup_dir) = temp_dirs();
        seeded_store(&store).await;

        let task = BackupTask::new(Arc::clone(&store), stepping_clock(), &backup_dir);

        let mut written = Vec::new();
        for _ in 0..BACKUP_RETENTION + 3 {
            written.push(task.snapshot().await.unwrap());
        }

        let mut remaining: Vec<PathBuf> =
            glob(&backup_dir.join("backup_*.json").to_string_lossy())
                .unwrap()
                .flatten()
                .collect();
        remaining.sort();

        assert_eq!(remaining.len(), BACKUP_RETENTION);
        assert_eq!(
            remaining.last().unwrap(),
            written.last().unwrap(),
            "newest snapshot must survive rotation"
        );
        assert!(!remaining.contains(&written[0]), "oldest snapshot must be pruned");
    }
}
