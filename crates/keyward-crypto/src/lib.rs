//! Cryptography utilities for Keyward

pub mod password;

pub use password::*;
