//! Test doubles for rawflow pipelines.
//!
//! This module provides:
//! - Synthetic recordings and helpers to place them in an experiment tree
//! - A deterministic [`SignalProcessor`](crate::processing::SignalProcessor)
//!   that counts its calls
//! - A scripted operator prompt

mod fixtures;
mod mocks;

pub use fixtures::{synthetic_signal, touch, write_recording};
pub use mocks::{CountingProcessor, ScriptedPrompt};
