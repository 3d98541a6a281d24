//! Application layer - CDR processing pipeline
//!
//! Drives staged CDR XML through parse -> enrich -> persist, plus the
//! retention janitor for the staging table.

pub mod cdr_enricher;
pub mod cdr_parser;
pub mod cdr_processor;

pub use cdr_enricher::CdrEnricher;
pub use cdr_parser::parse_cdr_xml;
pub use cdr_processor::{CdrProcessor, CleanupWorker};
