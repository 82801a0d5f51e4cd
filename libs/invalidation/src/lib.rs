//! Cross-process cache invalidation broadcast.
//!
//! Worker processes keep local caches (API keys, personas, denylists,
//! channel-activation flags, personality configs) that go stale when any
//! peer mutates the backing data. This crate broadcasts invalidation
//! events over redis pub/sub: one generic broadcaster/listener, one
//! declarative shape validator, and a small binding per cache domain.
//!
//! Delivery is best-effort and at-least-once; callbacks must be
//! idempotent (repeated "invalidate X" is a no-op past the first
//! application).

pub mod bindings;
pub mod channel;
pub mod schema;

pub use bindings::{
    ApiKeyEvent, ChannelActivationEvent, DenylistEntryRef, DenylistEvent,
    LlmConfigEvent, PersonaEvent, api_key_binding,
    channel_activation_binding, denylist_binding, llm_config_binding,
    persona_binding,
};
pub use channel::{
    Callback, ChannelBinding, ChannelError, InvalidationChannel,
};
pub use schema::{EventSchema, Field, FieldKind, Variant};
