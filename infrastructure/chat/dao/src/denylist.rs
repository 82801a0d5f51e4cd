use chat_errors::ChatError;
use chat_models::DenylistEntry;
use sql_connection::SqlConnect;
use tracing::instrument;

#[derive(Clone)]
pub struct DenylistDao {
    db: SqlConnect,
}

fn map_row(row: &tokio_postgres::Row) -> DenylistEntry {
    DenylistEntry {
        guild_id: row.get(0),
        channel_id: row.get(1),
        user_id: row.get(2),
        pattern: row.get(3),
    }
}

impl DenylistDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    /// Duplicate-tolerant insert; returns whether a row was actually added.
    #[instrument(skip(self), fields(guild_id = %entry.guild_id))]
    pub async fn add(
        &self, entry: &DenylistEntry,
    ) -> Result<bool, ChatError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "INSERT INTO denylist_entries \
                 (guild_id, channel_id, user_id, pattern) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (guild_id, channel_id, user_id, pattern) \
                 DO NOTHING",
            )
            .await?;
        let added = client
            .execute(
                &stmt,
                &[
                    &entry.guild_id,
                    &entry.channel_id,
                    &entry.user_id,
                    &entry.pattern,
                ],
            )
            .await?;
        Ok(added > 0)
    }

    /// Returns whether a row was actually removed.
    #[instrument(skip(self), fields(guild_id = %entry.guild_id))]
    pub async fn remove(
        &self, entry: &DenylistEntry,
    ) -> Result<bool, ChatError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "DELETE FROM denylist_entries \
                 WHERE guild_id = $1 AND channel_id = $2 \
                 AND user_id = $3 AND pattern = $4",
            )
            .await?;
        let removed = client
            .execute(
                &stmt,
                &[
                    &entry.guild_id,
                    &entry.channel_id,
                    &entry.user_id,
                    &entry.pattern,
                ],
            )
            .await?;
        Ok(removed > 0)
    }

    pub async fn find_by_guild(
        &self, guild_id: &str,
    ) -> Result<Vec<DenylistEntry>, ChatError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(
                "SELECT guild_id, channel_id, user_id, pattern \
                 FROM denylist_entries WHERE guild_id = $1 \
                 ORDER BY pattern",
            )
            .await?;
        let rows = client.query(&stmt, &[&guild_id]).await?;
        Ok(rows.iter().map(map_row).collect())
    }

    pub async fn all(&self) -> Result<Vec<DenylistEntry>, ChatError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(
                "SELECT guild_id, channel_id, user_id, pattern \
                 FROM denylist_entries ORDER BY guild_id, pattern",
            )
            .await?;
        let rows = client.query(&stmt, &[]).await?;
        Ok(rows.iter().map(map_row).collect())
    }
}
