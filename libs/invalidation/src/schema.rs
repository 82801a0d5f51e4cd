//! Data-driven wire-shape validation for invalidation events.
//!
//! Every channel declares its event shapes as a static table of variants
//! (tag plus named fields) and one generic interpreter checks decoded
//! payloads against it. A payload passes only if its key set is exactly
//! the declared set and every field has the declared primitive kind;
//! anything looser risks silently accepting events from a peer running a
//! different schema version.

use serde_json::Value;

/// Discriminator field carried by every event.
pub const TAG_FIELD: &str = "type";

/// Primitive kind of a declared field. `Record` allows exactly one level
/// of nesting; nested fields must themselves be primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Num,
    Bool,
    Record(&'static [Field]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// One tagged variant of an event union.
#[derive(Debug, Clone, Copy)]
pub struct Variant {
    pub tag: &'static str,
    pub fields: &'static [Field],
}

/// Declarative shape of everything a channel may carry.
#[derive(Debug, Clone, Copy)]
pub struct EventSchema {
    pub variants: &'static [Variant],
}

impl EventSchema {
    /// Type-guard over an already-decoded JSON value.
    ///
    /// Rejects any key outside the declared field set (plus the tag), any
    /// missing declared field, and any field whose JSON kind differs from
    /// the declaration. The field-set check subsumes a raw key-count check
    /// and also catches duplicate-key payloads that a count would miss.
    pub fn validate(&self, payload: &Value) -> bool {
        let Some(map) = payload.as_object() else {
            return false;
        };
        let Some(tag) = map.get(TAG_FIELD).and_then(Value::as_str) else {
            return false;
        };
        let Some(variant) = self.variants.iter().find(|v| v.tag == tag)
        else {
            return false;
        };

        for key in map.keys() {
            if key != TAG_FIELD
                && !variant.fields.iter().any(|f| f.name == key)
            {
                return false;
            }
        }

        variant.fields.iter().all(|field| {
            map.get(field.name)
                .is_some_and(|value| kind_matches(field.kind, value))
        })
    }
}

fn kind_matches(kind: FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::Str => value.is_string(),
        FieldKind::Num => value.is_number(),
        FieldKind::Bool => value.is_boolean(),
        FieldKind::Record(fields) => {
            let Some(map) = value.as_object() else {
                return false;
            };
            if map.keys().any(|k| !fields.iter().any(|f| f.name == k)) {
                return false;
            }
            fields.iter().all(|field| {
                map.get(field.name).is_some_and(|v| {
                    // One level only; nested records are not allowed.
                    !matches!(field.kind, FieldKind::Record(_))
                        && kind_matches(field.kind, v)
                })
            })
        }
    }
}
