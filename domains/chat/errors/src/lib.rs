use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Database error: {0}")]
    Database(#[from] sql_connection::PgError),
    #[error("Connection error: {0}")]
    Connection(#[from] sql_connection::PoolError),
    #[error("Message not found: {message_id}")]
    NotFound { message_id: Uuid },
    #[error("Empty selector: refusing to match all messages")]
    EmptySelector,
}
