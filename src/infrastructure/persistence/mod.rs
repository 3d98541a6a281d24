//! Persistence implementations

pub mod cdr_repository;
pub mod database;
pub mod extension_repository;
pub mod queue_repository;

pub use cdr_repository::PgCdrRepository;
pub use database::{create_pool, health_check, run_migrations};
pub use extension_repository::PgExtensionRepository;
pub use queue_repository::PgQueueRepository;
