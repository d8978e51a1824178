//! Keyward Storage
//!
//! Flat-file user store: one YAML record per user in the identities
//! directory, plus the attribute indexer used to find users by any field.

pub mod engine;

pub use engine::{is_valid_name, AttributeIndexer, FileStore, RECORD_SUFFIX};
