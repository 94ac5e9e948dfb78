//! Pipeline definitions, assembly and change management.
//!
//! This module provides:
//! - Declarative stage definitions and snapshots
//! - Pipeline builder with validation
//! - Change detection between snapshots
//! - Operator-confirmed cleanup of stale decompositions

mod builder;
mod definition;
mod diff;
mod graph;
mod reconcile;

pub use builder::{validate_definitions, PipelineBuilder};
pub use definition::{
    load_snapshot, save_snapshot, CachedDefinition, PipelineDefinition, Snapshot, StageDefinition,
};
pub use diff::{compare_pipelines, PipelineDiff};
pub use graph::{assemble, Pipeline};
pub use reconcile::{reconcile_ica_files, Choice, Confirm, ReconcileReport, TerminalPrompt, RESOLUTIONS};
