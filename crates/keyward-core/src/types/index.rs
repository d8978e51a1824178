//! Attribute index types

use std::collections::HashMap;

/// Mapping from the values of one record attribute to the owning uid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeIndex {
    attribute: String,
    entries: HashMap<String, String>,
}

impl AttributeIndex {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            entries: HashMap::new(),
        }
    }

    /// Attribute path this index was built for
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Record `value` as belonging to `uid`. A later insert for the same
    /// value replaces the earlier owner.
    pub fn insert(&mut self, value: impl Into<String>, uid: impl Into<String>) {
        self.entries.insert(value.into(), uid.into());
    }

    pub fn lookup(&self, value: &str) -> Option<&str> {
        self.entries.get(value).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
