//! Logging setup and provenance records.

mod logging;
mod provenance;

pub use logging::{init_tracing, LOG_ENV};
pub use provenance::ProvenanceLog;
