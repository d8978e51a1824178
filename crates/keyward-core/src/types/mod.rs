//! Core types for Keyward

mod index;
mod record;

pub use index::*;
pub use record::*;
