//! A linked preprocessing pipeline.

use super::builder::PipelineBuilder;
use super::definition::{PipelineDefinition, Snapshot};
use crate::context::PipelineContext;
use crate::core::{RawSignal, StageType};
use crate::errors::{InvalidParameter, Result};
use crate::stages::{CacheState, CachedPipe, LoadOptions, RawPipe, SOURCE_NAME};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Named stages linked into a tree rooted at the raw source.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: BTreeMap<String, Arc<dyn RawPipe>>,
    context: Arc<PipelineContext>,
}

/// Validates `definition` and links it with `context`.
///
/// # Errors
///
/// Returns a [`crate::errors::DefinitionError`] if the definition is not a
/// valid pipeline.
pub fn assemble(definition: PipelineDefinition, context: PipelineContext) -> Result<Pipeline> {
    PipelineBuilder::new(context).definition(definition)?.build()
}

impl Pipeline {
    pub(crate) fn new(stages: BTreeMap<String, Arc<dyn RawPipe>>, context: Arc<PipelineContext>) -> Self {
        Self { stages, context }
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Stage names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Looks up a stage.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] if no stage has this name.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn RawPipe>> {
        self.stages.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            InvalidParameter::new("raw", format!("{name:?}; must be one of {}", known.join(", "))).into()
        })
    }

    /// The raw source.
    ///
    /// # Errors
    ///
    /// Never fails for pipelines built by [`PipelineBuilder`].
    pub fn source(&self) -> Result<&Arc<dyn RawPipe>> {
        self.get(SOURCE_NAME)
    }

    /// Loads the output of stage `name`.
    ///
    /// # Errors
    ///
    /// Returns any error of [`RawPipe::load`].
    pub fn load(&self, name: &str, subject: &str, session: &str, options: LoadOptions) -> Result<RawSignal> {
        self.get(name)?.load(subject, session, options)
    }

    /// Brings the cache of stage `name` up to date.
    ///
    /// # Errors
    ///
    /// Returns any error of [`RawPipe::cache`].
    pub fn cache(&self, name: &str, subject: &str, session: &str) -> Result<CacheState> {
        self.get(name)?.cache(subject, session)
    }

    /// Fits the decomposition of ICA stage `name` for one subject.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] if `name` is not an ICA stage, and any
    /// error of [`CachedPipe::make_ica`].
    pub fn make_ica(&self, name: &str, subject: &str) -> Result<PathBuf> {
        self.cached(name)?.make_ica(subject)
    }

    /// Looks up an intermediate stage.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] for unknown names and the source.
    pub fn cached(&self, name: &str) -> Result<&CachedPipe> {
        self.get(name)?
            .as_cached()
            .ok_or_else(|| InvalidParameter::new("raw", format!("{name:?} is the raw source")).into())
    }

    /// Names of the ICA stages.
    pub fn ica_stages(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .filter(|(_, stage)| stage.stage_type() == StageType::RawIca)
            .map(|(name, _)| name.as_str())
    }

    /// Parameters of every stage, for change detection.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.stages
            .iter()
            .map(|(name, stage)| (name.clone(), stage.as_dict()))
            .collect()
    }
}
