use chat_errors::ChatError;
use chat_models::Tombstone;
use chrono::{Duration, Utc};
use sql_connection::SqlConnect;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct TombstoneDao {
    db: SqlConnect,
}

fn map_row(row: &tokio_postgres::Row) -> Tombstone {
    Tombstone {
        message_id: row.get(0),
        channel_id: row.get(1),
        personality_id: row.get(2),
        persona_id: row.get(3),
        deleted_at: row.get(4),
    }
}

impl TombstoneDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    /// Purge tombstones older than the retention window. The window must be
    /// long enough that the reconciliation importer is guaranteed at least
    /// one run inside it.
    #[instrument(skip(self))]
    pub async fn sweep_expired_tombstones(
        &self, retention_days: i64,
    ) -> Result<u64, ChatError> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "DELETE FROM message_tombstones WHERE deleted_at < $1",
            )
            .await?;
        let swept = client.execute(&stmt, &[&cutoff]).await?;
        Ok(swept)
    }

    /// Hard-delete messages whose soft-delete mark has aged past the grace
    /// period. Their tombstones were written by the soft-delete step, so
    /// this writes none.
    #[instrument(skip(self))]
    pub async fn hard_delete_aged_soft_deletes(
        &self, grace_days: i64,
    ) -> Result<u64, ChatError> {
        let cutoff = Utc::now() - Duration::days(grace_days);
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "DELETE FROM messages \
                 WHERE deleted_at IS NOT NULL AND deleted_at < $1",
            )
            .await?;
        let purged = client.execute(&stmt, &[&cutoff]).await?;
        Ok(purged)
    }

    pub async fn exists(&self, message_id: Uuid) -> Result<bool, ChatError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(
                "SELECT EXISTS(SELECT 1 FROM message_tombstones \
                 WHERE message_id = $1)",
            )
            .await?;
        let row = client.query_one(&stmt, &[&message_id]).await?;
        Ok(row.get(0))
    }

    pub async fn count(&self) -> Result<i64, ChatError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare("SELECT COUNT(*) FROM message_tombstones")
            .await?;
        let row = client.query_one(&stmt, &[]).await?;
        Ok(row.get(0))
    }

    /// Tombstones scoped to one channel, for the reconciliation importer.
    pub async fn find_by_channel(
        &self, channel_id: &str,
    ) -> Result<Vec<Tombstone>, ChatError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(
                "SELECT message_id, channel_id, personality_id, \
                 persona_id, deleted_at \
                 FROM message_tombstones WHERE channel_id = $1 \
                 ORDER BY deleted_at DESC",
            )
            .await?;
        let rows = client.query(&stmt, &[&channel_id]).await?;
        Ok(rows.iter().map(map_row).collect())
    }
}
