//! # Rawflow
//!
//! Cached preprocessing pipelines for continuous MEG/EEG recordings.
//!
//! A pipeline is a tree of named stages rooted at the raw recordings. Each
//! intermediate stage transforms the output of its parent (filtering, ICA,
//! Maxwell filtering, re-referencing) and caches the result on disk. A cache
//! file is reused as long as it is newer than everything it was computed
//! from, so editing a bad-channel list or replacing a recording only
//! recomputes what depends on it.
//!
//! Rawflow provides:
//!
//! - **Declarative definitions**: stages are described as JSON parameters
//! - **Timestamp-driven caching**: no recomputation while inputs are unchanged
//! - **Bad-channel bookkeeping**: per session, with automatic flat-channel detection
//! - **Change management**: snapshot diffs and cleanup of stale ICA files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rawflow::prelude::*;
//!
//! let definition = PipelineDefinition::from_json_file("pipeline.json")?;
//! let config = PipelineConfig::new("/data/experiment").with_sessions(["words"]);
//! let pipeline = assemble(definition, PipelineContext::new(config, processor))?;
//!
//! pipeline.make_ica("ica", "R0001")?;
//! let raw = pipeline.load("ica", "R0001", "words", LoadOptions::default())?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod io;
pub mod observability;
pub mod pipeline;
pub mod processing;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::context::PipelineContext;
    pub use crate::core::{ChannelKind, DataKind, Decomposition, DiffStatus, RawSignal, StageType};
    pub use crate::errors::{
        DefinitionError, InvalidParameter, MissingInputFile, RawflowError, Result, StaleArtifact,
    };
    pub use crate::io::{JsonSignalStore, SignalStore};
    pub use crate::pipeline::{
        assemble, compare_pipelines, reconcile_ica_files, Confirm, Pipeline, PipelineBuilder,
        PipelineDefinition, PipelineDiff, Snapshot, StageDefinition, TerminalPrompt,
    };
    pub use crate::processing::SignalProcessor;
    pub use crate::stages::{CacheState, LoadOptions, RawPipe, Transform};
}
