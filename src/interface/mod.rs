//! Interface layer - HTTP surface
//!
//! `xmlcurl` answers the softswitch's provisioning lookups; `api` carries
//! the admin REST endpoints, CDR ingest, and health checks.

pub mod api;
pub mod xmlcurl;
