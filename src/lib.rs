//! Squawk - FreeSWITCH control-plane provisioning service
//!
//! Answers the softswitch's XML_CURL lookups (directory, dialplan,
//! configuration) from PostgreSQL and ingests Call Detail Records into a
//! queryable history through a durable staging queue.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
