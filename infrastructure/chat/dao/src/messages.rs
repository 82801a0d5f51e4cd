use chat_errors::ChatError;
use chat_models::{Message, MessageSelector, NewMessage};
use chrono::{DateTime, Utc};
use sql_connection::SqlConnect;
use tracing::instrument;
use uuid::Uuid;

use crate::{PgParam, PgParamVec};

#[derive(Clone)]
pub struct MessageDao {
    db: SqlConnect,
}

const MESSAGE_COLUMNS: &str = "id, channel_id, personality_id, persona_id, \
                               author_id, content, created_at, deleted_at";

fn map_row(row: &tokio_postgres::Row) -> Message {
    Message {
        id: row.get(0),
        channel_id: row.get(1),
        personality_id: row.get(2),
        persona_id: row.get(3),
        author_id: row.get(4),
        content: row.get(5),
        created_at: row.get(6),
        deleted_at: row.get(7),
    }
}

/// Render the selector as a WHERE fragment, appending its parameters.
/// Errors on an empty selector so a bug can never match every row.
fn selector_clause(
    selector: &MessageSelector, params: &mut PgParamVec,
) -> Result<String, ChatError> {
    if selector.is_empty() {
        return Err(ChatError::EmptySelector);
    }

    let mut clauses = Vec::new();
    let mut n = params.len();

    if let Some(ids) = &selector.ids {
        n += 1;
        clauses.push(format!("id = ANY(${n})"));
        params.push(Box::new(ids.clone()));
    }
    if let Some(channel_id) = &selector.channel_id {
        n += 1;
        clauses.push(format!("channel_id = ${n}"));
        params.push(Box::new(channel_id.clone()));
    }
    if let Some(personality_id) = &selector.personality_id {
        n += 1;
        clauses.push(format!("personality_id = ${n}"));
        params.push(Box::new(personality_id.clone()));
    }
    if let Some(persona_id) = &selector.persona_id {
        n += 1;
        clauses.push(format!("persona_id = ${n}"));
        params.push(Box::new(persona_id.clone()));
    }
    if let Some(author_id) = &selector.author_id {
        n += 1;
        clauses.push(format!("author_id = ${n}"));
        params.push(Box::new(author_id.clone()));
    }
    if let Some(older_than) = &selector.older_than {
        n += 1;
        clauses.push(format!("created_at < ${n}"));
        params.push(Box::new(*older_than));
    }

    Ok(clauses.join(" AND "))
}

struct SelectedRows {
    ids: Vec<Uuid>,
    channel_ids: Vec<String>,
    personality_ids: Vec<Option<String>>,
    persona_ids: Vec<Option<String>>,
}

impl SelectedRows {
    fn from_rows(rows: &[tokio_postgres::Row]) -> Self {
        let mut selected = SelectedRows {
            ids: Vec::with_capacity(rows.len()),
            channel_ids: Vec::with_capacity(rows.len()),
            personality_ids: Vec::with_capacity(rows.len()),
            persona_ids: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            selected.ids.push(row.get(0));
            selected.channel_ids.push(row.get(1));
            selected.personality_ids.push(row.get(2));
            selected.persona_ids.push(row.get(3));
        }
        selected
    }
}

impl MessageDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    pub fn db(&self) -> &SqlConnect { &self.db }

    #[instrument(skip(self, req), fields(channel_id = %req.channel_id))]
    pub async fn create(&self, req: NewMessage) -> Result<Message, ChatError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(&format!(
                "INSERT INTO messages (id, channel_id, personality_id, \
                 persona_id, author_id, content) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING {MESSAGE_COLUMNS}"
            ))
            .await?;

        let row = client
            .query_one(
                &stmt,
                &[
                    &Uuid::now_v7(),
                    &req.channel_id,
                    &req.personality_id,
                    &req.persona_id,
                    &req.author_id,
                    &req.content,
                ],
            )
            .await?;

        Ok(map_row(&row))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Message, ChatError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
            ))
            .await?;
        let rows = client.query(&stmt, &[&id]).await?;

        rows.first()
            .map(map_row)
            .ok_or(ChatError::NotFound { message_id: id })
    }

    /// Live (not soft-deleted) channel history, newest first, keyset
    /// paginated on `(created_at, id)`. The id tiebreak keeps messages that
    /// share a timestamp from being skipped at a page boundary.
    #[instrument(skip_all, fields(channel_id))]
    pub async fn find_by_channel_with_cursor(
        &self, channel_id: &str, cursor: Option<(DateTime<Utc>, Uuid)>,
        limit: u64,
    ) -> Result<(Vec<Message>, Option<(DateTime<Utc>, Uuid)>), ChatError>
    {
        let client = self.db.get_read_client().await?;
        let limit = limit.min(1000);
        let limit_plus_one = limit as i64 + 1;

        let rows = match cursor {
            Some((cursor_timestamp, cursor_id)) => {
                let stmt = client
                    .prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages \
                         WHERE channel_id = $1 AND deleted_at IS NULL \
                         AND (created_at, id) < ($2, $3) \
                         ORDER BY created_at DESC, id DESC LIMIT $4"
                    ))
                    .await?;
                client
                    .query(
                        &stmt,
                        &[
                            &channel_id,
                            &cursor_timestamp,
                            &cursor_id,
                            &limit_plus_one,
                        ],
                    )
                    .await?
            }
            None => {
                let stmt = client
                    .prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages \
                         WHERE channel_id = $1 AND deleted_at IS NULL \
                         ORDER BY created_at DESC, id DESC LIMIT $2"
                    ))
                    .await?;
                client.query(&stmt, &[&channel_id, &limit_plus_one]).await?
            }
        };

        let messages: Vec<Message> =
            rows.iter().take(limit as usize).map(map_row).collect();

        let next_cursor = if rows.len() > limit as usize {
            messages.last().map(|m| (m.created_at, m.id))
        }
        else {
            None
        };

        Ok((messages, next_cursor))
    }

    pub async fn count(&self) -> Result<i64, ChatError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(
                "SELECT COUNT(*) FROM messages WHERE deleted_at IS NULL",
            )
            .await?;
        let row = client.query_one(&stmt, &[]).await?;
        Ok(row.get(0))
    }

    /// Delete matching messages behind the tombstone ledger.
    ///
    /// One transaction, in this order: read matching ids, insert a
    /// tombstone per id (duplicate-tolerant), delete the rows. A
    /// reconciliation sweep racing the delete sees the tombstone first and
    /// must not resurrect the rows. Returns the deleted count; zero matches
    /// write no tombstones. Database errors propagate unchanged — the
    /// caller must treat them as "state unknown".
    #[instrument(skip_all)]
    pub async fn delete_with_tombstone(
        &self, selector: &MessageSelector,
    ) -> Result<u64, ChatError> {
        let mut client = self.db.get_client().await?;
        let tx = client.transaction().await?;

        let mut params: PgParamVec = Vec::new();
        let clause = selector_clause(selector, &mut params)?;
        let param_refs: Vec<&PgParam> =
            params.iter().map(|p| p.as_ref() as &PgParam).collect();

        let rows = tx
            .query(
                &format!(
                    "SELECT id, channel_id, personality_id, persona_id \
                     FROM messages WHERE {clause}"
                ),
                &param_refs,
            )
            .await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let selected = SelectedRows::from_rows(&rows);
        insert_tombstones(&tx, &selected).await?;

        let deleted = tx
            .execute(
                "DELETE FROM messages WHERE id = ANY($1)",
                &[&selected.ids],
            )
            .await?;

        tx.commit().await?;
        Ok(deleted)
    }

    /// Soft-delete behind the tombstone ledger: same transaction shape as
    /// `delete_with_tombstone`, but rows are marked instead of removed. The
    /// aged-soft-delete sweep hard-deletes them later without writing more
    /// tombstones.
    #[instrument(skip_all)]
    pub async fn soft_delete_with_tombstone(
        &self, selector: &MessageSelector,
    ) -> Result<u64, ChatError> {
        let mut client = self.db.get_client().await?;
        let tx = client.transaction().await?;

        let mut params: PgParamVec = Vec::new();
        let clause = selector_clause(selector, &mut params)?;
        let param_refs: Vec<&PgParam> =
            params.iter().map(|p| p.as_ref() as &PgParam).collect();

        let rows = tx
            .query(
                &format!(
                    "SELECT id, channel_id, personality_id, persona_id \
                     FROM messages \
                     WHERE deleted_at IS NULL AND {clause}"
                ),
                &param_refs,
            )
            .await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let selected = SelectedRows::from_rows(&rows);
        insert_tombstones(&tx, &selected).await?;

        let marked = tx
            .execute(
                "UPDATE messages SET deleted_at = now() \
                 WHERE id = ANY($1)",
                &[&selected.ids],
            )
            .await?;

        tx.commit().await?;
        Ok(marked)
    }
}

async fn insert_tombstones(
    tx: &tokio_postgres::Transaction<'_>, selected: &SelectedRows,
) -> Result<u64, tokio_postgres::Error> {
    tx.execute(
        "INSERT INTO message_tombstones \
         (message_id, channel_id, personality_id, persona_id, deleted_at) \
         SELECT t.message_id, t.channel_id, t.personality_id, \
                t.persona_id, now() \
         FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::text[]) \
              AS t(message_id, channel_id, personality_id, persona_id) \
         ON CONFLICT (message_id) DO NOTHING",
        &[
            &selected.ids,
            &selected.channel_ids,
            &selected.personality_ids,
            &selected.persona_ids,
        ],
    )
    .await
}
