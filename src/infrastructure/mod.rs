//! Infrastructure layer - Technical implementations
//!
//! PostgreSQL repositories and the in-memory directory cache.

pub mod cache;
pub mod persistence;
