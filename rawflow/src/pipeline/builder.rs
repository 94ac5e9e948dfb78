//! Pipeline builder with validation.

use super::definition::{PipelineDefinition, StageDefinition};
use super::graph::Pipeline;
use crate::context::PipelineContext;
use crate::errors::{CycleDetectedError, DefinitionError, ErrorInfo, RawflowError, Result};
use crate::stages::{CachedPipe, RawPipe, SourcePipe, Transform, SOURCE_NAME};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Builder for linked, validated pipelines.
///
/// Stages may be added in any order; parents are resolved by name when the
/// pipeline is built.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// Resources shared by the linked stages.
    context: PipelineContext,
    /// The stage definitions.
    stages: BTreeMap<String, StageDefinition>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(context: PipelineContext) -> Self {
        Self {
            context,
            stages: BTreeMap::new(),
        }
    }

    /// Adds a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name was already added.
    pub fn stage(mut self, name: impl Into<String>, definition: StageDefinition) -> Result<Self, DefinitionError> {
        self.add_stage(name, definition)?;
        Ok(self)
    }

    /// Adds a stage in place.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name was already added.
    pub fn add_stage(&mut self, name: impl Into<String>, definition: StageDefinition) -> Result<(), DefinitionError> {
        let name = name.into();
        if self.stages.contains_key(&name) {
            return Err(DefinitionError::new(format!("Raw {name:?} is defined twice"))
                .with_stages(vec![name])
                .with_error_info(
                    ErrorInfo::new("DEFINITION-MALFORMED", "Duplicate stage name")
                        .with_fix_hint("Stage names must be unique within a pipeline."),
                ));
        }
        self.stages.insert(name, definition);
        Ok(())
    }

    /// Adds every stage of a definition.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage name is already taken.
    pub fn definition(mut self, definition: PipelineDefinition) -> Result<Self, DefinitionError> {
        for (name, stage) in definition {
            self.add_stage(name, stage)?;
        }
        Ok(self)
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validates the definitions and links the stages.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] if the definitions do not form a tree
    /// rooted at the raw source.
    pub fn build(self) -> Result<Pipeline> {
        validate_definitions(&self.stages, &self.context.config.sessions)?;

        let context = Arc::new(self.context);
        let mut linked: BTreeMap<String, Arc<dyn RawPipe>> = BTreeMap::new();
        for name in self.stages.keys() {
            link(name, &self.stages, &context, &mut linked)?;
        }
        debug!(stages = linked.len(), "Linked preprocessing pipeline");
        Ok(Pipeline::new(linked, context))
    }
}

/// Links `name` after its ancestors.
///
/// Requires validated definitions, which guarantee termination.
fn link(
    name: &str,
    stages: &BTreeMap<String, StageDefinition>,
    context: &Arc<PipelineContext>,
    linked: &mut BTreeMap<String, Arc<dyn RawPipe>>,
) -> Result<Arc<dyn RawPipe>> {
    if let Some(stage) = linked.get(name) {
        return Ok(stage.clone());
    }
    let definition = stages
        .get(name)
        .ok_or_else(|| RawflowError::Internal(format!("linking unknown stage {name:?}")))?;
    let stage: Arc<dyn RawPipe> = match definition {
        StageDefinition::Source(params) => Arc::new(SourcePipe::new(name, params.clone(), context.clone())?),
        StageDefinition::Cached(def) => {
            let parent = link(&def.source, stages, context, linked)?;
            Arc::new(CachedPipe::new(
                name,
                parent,
                def.transform.clone(),
                def.cache,
                context.clone(),
            ))
        }
    };
    linked.insert(name.to_string(), stage.clone());
    Ok(stage)
}

/// Checks that definitions form a tree rooted at the raw source.
///
/// Verifies that there is exactly one source, called `raw`; that every
/// `source` reference names a defined stage; that ICA stages only train on
/// known `sessions`; and that parent links are acyclic.
///
/// # Errors
///
/// Returns a [`DefinitionError`] for the first violation found.
pub fn validate_definitions(
    stages: &BTreeMap<String, StageDefinition>,
    sessions: &[String],
) -> Result<(), DefinitionError> {
    let sources: Vec<&String> = stages
        .iter()
        .filter(|(_, def)| matches!(def, StageDefinition::Source(_)))
        .map(|(name, _)| name)
        .collect();
    match sources.as_slice() {
        [] => {
            return Err(DefinitionError::new("No RawSource pipe").with_error_info(
                ErrorInfo::new("DEFINITION-NO-SOURCE", "Pipeline has no raw source")
                    .with_fix_hint("Add an entry named 'raw' without a 'source' key."),
            ));
        }
        [name] if name.as_str() != SOURCE_NAME => {
            return Err(DefinitionError::coded(
                "DEFINITION-SOURCE-NAME",
                name.as_str(),
                format!("RawSource with name {name:?}: the raw source must be called 'raw'"),
            ));
        }
        [_] => {}
        many => {
            return Err(DefinitionError::new("More than one RawSource pipe")
                .with_stages(many.iter().map(|s| (*s).clone()).collect())
                .with_error_info(ErrorInfo::new(
                    "DEFINITION-MULTIPLE-SOURCES",
                    "A pipeline reads from exactly one raw source",
                )));
        }
    }

    let known_sessions: HashSet<&str> = sessions.iter().map(String::as_str).collect();
    for (name, definition) in stages {
        let StageDefinition::Cached(def) = definition else {
            continue;
        };
        if !stages.contains_key(&def.source) {
            return Err(DefinitionError::new(format!(
                "{} {name:?} source {:?} does not exist",
                def.transform.stage_type(),
                def.source
            ))
            .with_stages(vec![name.clone(), def.source.clone()])
            .with_error_info(
                ErrorInfo::new("DEFINITION-MISSING-SOURCE", format!("Stage '{}' not found", def.source))
                    .with_fix_hint("Every 'source' has to name another stage of the pipeline.")
                    .with_context_entry("source", def.source.clone()),
            ));
        }
        if let Transform::Ica(params) = &def.transform {
            let missing: Vec<&str> = params
                .sessions
                .iter()
                .map(String::as_str)
                .filter(|s| !known_sessions.contains(s))
                .collect();
            if !missing.is_empty() {
                let missing = missing.join(", ");
                return Err(DefinitionError::new(format!(
                    "RawICA {name:?} lists one or more non-existing sessions: {missing}"
                ))
                .with_stages(vec![name.clone()])
                .with_error_info(
                    ErrorInfo::new("DEFINITION-UNKNOWN-SESSION", "ICA training sessions must be configured")
                        .with_fix_hint("List only sessions from the experiment configuration.")
                        .with_context_entry("sessions", missing),
                ));
            }
        }
    }

    detect_cycles(stages)?;
    Ok(())
}

fn detect_cycles(stages: &BTreeMap<String, StageDefinition>) -> Result<(), CycleDetectedError> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for name in stages.keys() {
        if !visited.contains(name.as_str()) {
            if let Some(cycle) = dfs_cycle(stages, name, &mut visited, &mut rec_stack, &mut path) {
                return Err(CycleDetectedError::new(cycle));
            }
        }
    }
    Ok(())
}

fn dfs_cycle<'a>(
    stages: &'a BTreeMap<String, StageDefinition>,
    node: &'a str,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(parent) = stages.get(node).and_then(StageDefinition::source_name) {
        if !visited.contains(parent) {
            if let Some(cycle) = dfs_cycle(stages, parent, visited, rec_stack, path) {
                return Some(cycle);
            }
        } else if rec_stack.contains(parent) {
            let start = path.iter().position(|n| *n == parent).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|s| (*s).to_string()).collect();
            cycle.push(parent.to_string());
            return Some(cycle);
        }
    }

    path.pop();
    rec_stack.remove(node);
    None
}
