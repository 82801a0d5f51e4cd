use std::time::Duration;

use serde::Deserialize;
use sql_connection::SqlConnect;
use tokio::time::interval;
use tracing::{error, info};

use crate::TombstoneDao;

fn default_retention_days() -> i64 { 30 }
fn default_grace_days() -> i64 { 7 }
fn default_interval_secs() -> u64 { 3600 }

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// How long tombstones survive before the sweep purges them. Must exceed
    /// the reconciliation importer's run interval or deleted messages can be
    /// re-imported.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// How long a soft-deleted message stays restorable before the sweep
    /// hard-deletes it.
    #[serde(default = "default_grace_days")]
    pub grace_days: i64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            grace_days: default_grace_days(),
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Clone)]
pub struct RetentionScheduler {
    tombstones: TombstoneDao,
    config: RetentionConfig,
}

impl RetentionScheduler {
    pub fn new(db: SqlConnect, config: RetentionConfig) -> Self {
        Self { tombstones: TombstoneDao::new(db), config }
    }

    /// One sweep cycle: purge expired tombstones, then hard-delete messages
    /// whose soft-delete grace period has lapsed.
    pub async fn run_once(&self) -> anyhow::Result<(u64, u64)> {
        let swept = self
            .tombstones
            .sweep_expired_tombstones(self.config.retention_days)
            .await?;
        let purged = self
            .tombstones
            .hard_delete_aged_soft_deletes(self.config.grace_days)
            .await?;

        info!(swept, purged, "retention sweep complete");
        Ok((swept, purged))
    }

    /// Run sweeps on a fixed interval until the task is dropped.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval =
                interval(Duration::from_secs(self.config.interval_secs));
            sweep_interval.tick().await; // Skip first immediate tick

            info!(
                interval_secs = self.config.interval_secs,
                retention_days = self.config.retention_days,
                grace_days = self.config.grace_days,
                "starting retention sweep job"
            );

            loop {
                sweep_interval.tick().await;

                if let Err(e) = self.run_once().await {
                    error!("retention sweep failed: {e}");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_apply_to_empty_input() {
        let config: RetentionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.grace_days, 7);
        assert_eq!(config.interval_secs, 3600);
    }

    #[test]
    fn config_overrides_win() {
        let config: RetentionConfig =
            serde_json::from_str(r#"{"retention_days": 90, "grace_days": 1}"#)
                .unwrap();
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.grace_days, 1);
        assert_eq!(config.interval_secs, 3600);
    }
}
