//! Record type for the synced dataset.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entity of the synced dataset.
///
/// Identity is the primary `key`: two records with the same key are the
/// same logical entity, and a later write fully replaces the earlier one
/// (no field-level merge). Attributes are an arbitrary set of named JSON
/// values; the store does not interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Globally unique primary key. Never empty for a stored record.
    pub key: String,
    /// Arbitrary attribute fields.
    pub attrs: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// Creates a record with the given key and attributes.
    pub fn new(key: impl Into<String>, attrs: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            key: key.into(),
            attrs,
        }
    }

    /// Creates a record with the given key and no attributes.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self::new(key, BTreeMap::new())
    }

    /// Returns an attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&serde_json::Value> {
        self.attrs.get(name)
    }
}
