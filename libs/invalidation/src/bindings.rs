//! Per-domain channel bindings.
//!
//! Topics are partitioned per cache domain so events never cross domains.
//! Wire shape is a flat JSON object with a `type` discriminator and
//! camelCase fields; the schemas below accept exactly the serde output of
//! the event enums and nothing else.

use serde::{Deserialize, Serialize};

use crate::{
    channel::ChannelBinding,
    schema::{EventSchema, Field, FieldKind, Variant},
};

/// Standard shape reused by per-user cache domains: invalidate one user's
/// entry, or everything.
pub static STANDARD_SCHEMA: EventSchema = EventSchema {
    variants: &[
        Variant {
            tag: "user",
            fields: &[Field { name: "discordId", kind: FieldKind::Str }],
        },
        Variant { tag: "all", fields: &[] },
    ],
};

static CHANNEL_SCHEMA: EventSchema = EventSchema {
    variants: &[
        Variant {
            tag: "channel",
            fields: &[Field { name: "channelId", kind: FieldKind::Str }],
        },
        Variant { tag: "all", fields: &[] },
    ],
};

static ENTRY_FIELDS: &[Field] = &[
    Field { name: "guildId", kind: FieldKind::Str },
    Field { name: "channelId", kind: FieldKind::Str },
    Field { name: "userId", kind: FieldKind::Str },
    Field { name: "pattern", kind: FieldKind::Str },
];

static DENYLIST_SCHEMA: EventSchema = EventSchema {
    variants: &[
        Variant {
            tag: "add",
            fields: &[Field {
                name: "entry",
                kind: FieldKind::Record(ENTRY_FIELDS),
            }],
        },
        Variant {
            tag: "remove",
            fields: &[Field {
                name: "entry",
                kind: FieldKind::Record(ENTRY_FIELDS),
            }],
        },
        Variant { tag: "all", fields: &[] },
    ],
};

static LLM_CONFIG_SCHEMA: EventSchema = EventSchema {
    variants: &[
        Variant {
            tag: "personality",
            fields: &[Field {
                name: "personalityId",
                kind: FieldKind::Str,
            }],
        },
        Variant { tag: "all", fields: &[] },
    ],
};

/// API-key cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ApiKeyEvent {
    User {
        #[serde(rename = "discordId")]
        discord_id: String,
    },
    All,
}

/// Persona cache invalidation (same standard shape as API keys).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PersonaEvent {
    User {
        #[serde(rename = "discordId")]
        discord_id: String,
    },
    All,
}

/// Channel-activation flag invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelActivationEvent {
    Channel {
        #[serde(rename = "channelId")]
        channel_id: String,
    },
    All,
}

/// Flat reference identifying one denylist entry on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenylistEntryRef {
    pub guild_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub pattern: String,
}

/// Denylist cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DenylistEvent {
    Add { entry: DenylistEntryRef },
    Remove { entry: DenylistEntryRef },
    All,
}

/// LLM personality-config invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LlmConfigEvent {
    Personality {
        #[serde(rename = "personalityId")]
        personality_id: String,
    },
    All,
}

pub fn api_key_binding() -> ChannelBinding<ApiKeyEvent> {
    ChannelBinding {
        topic: "cache:api-keys",
        schema: &STANDARD_SCHEMA,
        describe: |event| {
            match event {
                ApiKeyEvent::User { discord_id } => {
                    format!("user {discord_id}")
                }
                ApiKeyEvent::All => "all".into(),
            }
        },
    }
}

pub fn persona_binding() -> ChannelBinding<PersonaEvent> {
    ChannelBinding {
        topic: "cache:personas",
        schema: &STANDARD_SCHEMA,
        describe: |event| {
            match event {
                PersonaEvent::User { discord_id } => {
                    format!("user {discord_id}")
                }
                PersonaEvent::All => "all".into(),
            }
        },
    }
}

pub fn channel_activation_binding() -> ChannelBinding<ChannelActivationEvent>
{
    ChannelBinding {
        topic: "cache:channels",
        schema: &CHANNEL_SCHEMA,
        describe: |event| {
            match event {
                ChannelActivationEvent::Channel { channel_id } => {
                    format!("channel {channel_id}")
                }
                ChannelActivationEvent::All => "all".into(),
            }
        },
    }
}

pub fn denylist_binding() -> ChannelBinding<DenylistEvent> {
    ChannelBinding {
        topic: "cache:denylist",
        schema: &DENYLIST_SCHEMA,
        describe: |event| {
            match event {
                DenylistEvent::Add { entry } => {
                    format!("add {}:{}", entry.guild_id, entry.pattern)
                }
                DenylistEvent::Remove { entry } => {
                    format!("remove {}:{}", entry.guild_id, entry.pattern)
                }
                DenylistEvent::All => "all".into(),
            }
        },
    }
}

pub fn llm_config_binding() -> ChannelBinding<LlmConfigEvent> {
    ChannelBinding {
        topic: "cache:personalities",
        schema: &LLM_CONFIG_SCHEMA,
        describe: |event| {
            match event {
                LlmConfigEvent::Personality { personality_id } => {
                    format!("personality {personality_id}")
                }
                LlmConfigEvent::All => "all".into(),
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn standard_events_serialize_to_declared_wire_shape() {
        let event = ApiKeyEvent::User { discord_id: "42".into() };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "user", "discordId": "42"}));
        assert!(STANDARD_SCHEMA.validate(&value));

        let value = serde_json::to_value(ApiKeyEvent::All).unwrap();
        assert_eq!(value, json!({"type": "all"}));
        assert!(STANDARD_SCHEMA.validate(&value));
    }

    #[test]
    fn channel_activation_round_trip() {
        let event =
            ChannelActivationEvent::Channel { channel_id: "c9".into() };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "channel", "channelId": "c9"}));
        assert!(channel_activation_binding().schema.validate(&value));

        let back: ChannelActivationEvent =
            serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn denylist_events_carry_flat_entry_records() {
        let entry = DenylistEntryRef {
            guild_id: "g1".into(),
            channel_id: "c1".into(),
            user_id: "u1".into(),
            pattern: "spam".into(),
        };
        let value =
            serde_json::to_value(DenylistEvent::Add { entry: entry.clone() })
                .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "add",
                "entry": {
                    "guildId": "g1",
                    "channelId": "c1",
                    "userId": "u1",
                    "pattern": "spam"
                }
            })
        );
        assert!(denylist_binding().schema.validate(&value));

        let value =
            serde_json::to_value(DenylistEvent::Remove { entry }).unwrap();
        assert!(denylist_binding().schema.validate(&value));
    }

    #[test]
    fn llm_config_round_trip() {
        let event =
            LlmConfigEvent::Personality { personality_id: "p7".into() };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "personality", "personalityId": "p7"})
        );
        assert!(llm_config_binding().schema.validate(&value));
    }

    #[test]
    fn schemas_reject_cross_domain_payloads() {
        // A denylist payload is not a valid standard event and vice versa.
        let denylist = json!({"type": "add", "entry": {
            "guildId": "g", "channelId": "c", "userId": "u", "pattern": "p"
        }});
        assert!(!STANDARD_SCHEMA.validate(&denylist));

        let standard = json!({"type": "user", "discordId": "42"});
        assert!(!denylist_binding().schema.validate(&standard));
    }

    #[test]
    fn malformed_standard_payloads_fail_validation() {
        // Missing declared field
        assert!(!STANDARD_SCHEMA.validate(&json!({"type": "user"})));
        // Extra field on empty variant
        assert!(
            !STANDARD_SCHEMA.validate(&json!({"type": "all", "x": true}))
        );
    }
}
