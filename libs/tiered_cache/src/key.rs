//! Cache key derivation.
//!
//! Tier-1 keys prefer the domain's stable identifier; without one, the key
//! is a content hash of the normalized source URL. External CDN links
//! rotate signature/expiry query parameters, so normalization strips the
//! query and fragment before hashing to keep the key stable across
//! rotations. Tier-2 keys are always the stable identifier — hashes are
//! not collision-free across renames and tier 2 is the source of truth.

use sha2::{Digest, Sha256};
use url::Url;

/// Identifies a cache entry by stable id, source URL, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub durable_id: Option<String>,
    pub source_url: Option<String>,
}

impl KeyDescriptor {
    pub fn for_id(id: impl Into<String>) -> Self {
        Self { durable_id: Some(id.into()), source_url: None }
    }

    pub fn for_url(url: impl Into<String>) -> Self {
        Self { durable_id: None, source_url: Some(url.into()) }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Ephemeral-tier key: the stable id when present, else a hash of the
    /// normalized URL. None when the descriptor is empty.
    pub fn tier1_key(&self) -> Option<String> {
        if let Some(id) = &self.durable_id {
            return Some(id.clone());
        }
        self.source_url.as_deref().map(derived_url_key)
    }

    /// Durable-tier key: the stable id only.
    pub fn tier2_key(&self) -> Option<&str> { self.durable_id.as_deref() }
}

/// Strip the ephemeral portion (query, fragment) of a URL-like key.
pub fn normalize_source_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        // Not a parseable URL; drop anything after '?' or '#' by hand.
        Err(_) => {
            let end = raw.find(['?', '#']).unwrap_or(raw.len());
            raw[..end].to_string()
        }
    }
}

fn derived_url_key(raw: &str) -> String {
    let normalized = normalize_source_url(raw);
    let digest = Sha256::digest(normalized.as_bytes());
    format!("url:{}", hex::encode(digest))
}
