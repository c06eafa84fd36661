//! Identifiers and value types shared across the orchestrator workspace:
//! vault/ingester/chunk/job identifiers, the case-insensitive attribute map
//! carried on every ingested record, and chunk metadata as reported by a
//! `ChunkManager` implementation.

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};
use time_provider::Time;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn get(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id!(VaultId, "Identifies a storage partition.");
uuid_id!(IngesterId, "Identifies a registered ingester instance.");
uuid_id!(ChunkId, "Identifies a chunk within a vault's chunk manager.");
uuid_id!(JobId, "Identifies a scheduler job run.");

/// Case-insensitive-on-lookup attribute map carried on every ingested record.
///
/// Keys are stored in their original case for display, but `get`/`contains_key`
/// compare case-insensitively, matching the filter grammar's predicate
/// semantics (`key=value` matches regardless of case on either side).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attrs(BTreeMap<String, String>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair, overwriting any existing value for a key
    /// that compares equal case-insensitively.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if let Some(existing) = self.find_key(&key) {
            self.0.insert(existing, value.into());
        } else {
            self.0.insert(key, value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.find_key(key)
            .and_then(|k| self.0.get(&k))
            .map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find_key(key).is_some()
    }

    /// True if any attribute has this value, compared case-insensitively.
    pub fn contains_value(&self, value: &str) -> bool {
        self.0.values().any(|v| v.eq_ignore_ascii_case(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn find_key(&self, key: &str) -> Option<String> {
        self.0
            .keys()
            .find(|k| k.eq_ignore_ascii_case(key))
            .cloned()
    }
}

impl FromIterator<(String, String)> for Attrs {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// Metadata describing one chunk, as reported by `ChunkManager::list`/`meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMeta {
    pub id: ChunkId,
    pub start: Time,
    pub end: Time,
    pub record_count: u64,
    pub byte_size: u64,
    pub sealed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_lookup_is_case_insensitive() {
        let mut attrs = Attrs::new();
        attrs.insert("Env", "Prod");

        assert_eq!(attrs.get("env"), Some("Prod"));
        assert_eq!(attrs.get("ENV"), Some("Prod"));
        assert!(attrs.contains_key("eNv"));
        assert!(attrs.contains_value("prod"));
    }

    #[test]
    fn attrs_insert_overwrites_existing_key_case_insensitively() {
        let mut attrs = Attrs::new();
        attrs.insert("env", "staging");
        attrs.insert("ENV", "prod");

        assert_eq!(attrs.iter().count(), 1);
        assert_eq!(attrs.get("env"), Some("prod"));
    }

    #[test]
    fn ids_round_trip_through_uuid() {
        let id = VaultId::new();
        let raw = id.get();
        assert_eq!(VaultId::from(raw), id);
    }
}
