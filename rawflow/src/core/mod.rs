//! Core domain model types for rawflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Continuous recordings and their measurement info
//! - Persisted decomposition models
//! - Stage type tags, diff status and data kinds

mod signal;
mod status;

pub use signal::{ChannelKind, Decomposition, RawSignal, SignalInfo};
pub use status::{DataKind, DiffStatus, StageType};
