//! Shared building blocks: errors, output, hashing, locking, environment.

pub mod env;
pub mod error;
pub mod hash;
pub mod lock;
pub mod output;
