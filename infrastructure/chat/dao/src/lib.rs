//! DAOs over the relational store: message history, the tombstone ledger,
//! retention sweeps, the denylist, and the durable media-description tier.

pub mod denylist;
pub mod media;
pub mod messages;
pub mod retention;
pub mod tombstones;

pub use denylist::DenylistDao;
pub use media::MediaCacheDao;
pub use messages::MessageDao;
pub use retention::{RetentionConfig, RetentionScheduler};
pub use tombstones::TombstoneDao;

// Parameter aliases shared by the DAO modules.
pub(crate) type PgParam = dyn tokio_postgres::types::ToSql + Sync;
pub(crate) type PgParamVec =
    Vec<Box<dyn tokio_postgres::types::ToSql + Sync + Send>>;
