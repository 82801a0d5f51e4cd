use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored chat message. `deleted_at` marks a soft delete; soft-deleted
/// rows are excluded from history reads and hard-deleted after a grace
/// period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: String,
    pub personality_id: Option<String>,
    pub persona_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub channel_id: String,
    pub personality_id: Option<String>,
    pub persona_id: Option<String>,
    pub author_id: String,
    pub content: String,
}

/// Selects messages for tombstone-protected deletion. All populated fields
/// must match; an empty selector matches nothing rather than everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageSelector {
    pub ids: Option<Vec<Uuid>>,
    pub channel_id: Option<String>,
    pub personality_id: Option<String>,
    pub persona_id: Option<String>,
    pub author_id: Option<String>,
    pub older_than: Option<DateTime<Utc>>,
}

impl MessageSelector {
    pub fn is_empty(&self) -> bool {
        self.ids.is_none()
            && self.channel_id.is_none()
            && self.personality_id.is_none()
            && self.persona_id.is_none()
            && self.author_id.is_none()
            && self.older_than.is_none()
    }

    pub fn for_channel(channel_id: impl Into<String>) -> Self {
        Self { channel_id: Some(channel_id.into()), ..Self::default() }
    }

    pub fn for_ids(ids: Vec<Uuid>) -> Self {
        Self { ids: Some(ids), ..Self::default() }
    }
}

/// Durable marker that a message was deleted, consulted by the
/// reconciliation importer so deleted rows are never resurrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub message_id: Uuid,
    pub channel_id: String,
    pub personality_id: Option<String>,
    pub persona_id: Option<String>,
    pub deleted_at: DateTime<Utc>,
}

/// One denylist row; the primary key is the full tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenylistEntry {
    pub guild_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub pattern: String,
}
