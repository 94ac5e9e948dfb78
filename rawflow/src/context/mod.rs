//! Shared resources of a linked pipeline.
//!
//! Every stage of a pipeline holds the same [`PipelineContext`]: the
//! directory layout, the codec used to read and write recordings, and the
//! signal processor that performs the numeric transforms.

use crate::config::PipelineConfig;
use crate::io::{JsonSignalStore, PathTemplate, SignalStore};
use crate::processing::SignalProcessor;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// The context shared by all stages of one pipeline.
#[derive(Clone)]
pub struct PipelineContext {
    /// Directory layout and defaults.
    pub config: PipelineConfig,
    /// Reader/writer for recordings and artifacts.
    pub store: Arc<dyn SignalStore>,
    /// Numeric transforms.
    pub processor: Arc<dyn SignalProcessor>,
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("root", &self.config.root)
            .field("store", &self.store)
            .field("processor", &self.processor.name())
            .finish()
    }
}

impl PipelineContext {
    /// Creates a context using the JSON store.
    #[must_use]
    pub fn new(config: PipelineConfig, processor: Arc<dyn SignalProcessor>) -> Self {
        Self {
            config,
            store: Arc::new(JsonSignalStore::new()),
            processor,
        }
    }

    /// Sets the signal store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SignalStore>) -> Self {
        self.store = store;
        self
    }

    /// Template of the per-subject raw-data directory.
    #[must_use]
    pub fn raw_dir(&self) -> PathTemplate {
        PathTemplate::new(self.config.raw_dir.clone())
    }

    /// Formats a template for one subject and session.
    #[must_use]
    pub fn format(&self, template: &PathTemplate, subject: &str, session: &str) -> PathBuf {
        let root = self.config.root.to_string_lossy();
        template.format(&[("root", &root), ("subject", subject), ("session", session)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingProcessor;

    #[test]
    fn test_format_uses_root() {
        let ctx = PipelineContext::new(
            PipelineConfig::new("/exp"),
            Arc::new(CountingProcessor::new()),
        );
        let path = ctx.format(&ctx.raw_dir().join("{subject}_{session}-raw.fif"), "R01", "words");
        assert_eq!(path, PathBuf::from("/exp/meg/R01/R01_words-raw.fif"));
    }
}
