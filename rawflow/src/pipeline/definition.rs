//! Declarative stage definitions and pipeline snapshots.
//!
//! A pipeline is described by a JSON object mapping stage names to
//! parameter objects:
//!
//! ```json
//! {
//!     "raw": {"sysname": "KIT-157"},
//!     "1-40": {"source": "raw", "type": "filter", "args": [1, 40]},
//!     "ica": {"source": "1-40", "type": "ica", "session": ["words", "rest"]}
//! }
//! ```
//!
//! An entry without a `source` key is the raw source; every other entry
//! names its parent in `source` and its transform in `type`.

use crate::core::StageType;
use crate::errors::{DefinitionError, ErrorInfo, RawflowError, Result};
use crate::processing::Reference;
use crate::stages::{
    Connectivity, EllipticParams, FilterParams, IcaParams, MaxwellParams, ReReferenceParams,
    SourceParams, Sysname, Transform,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// `as_dict` output of every stage of a pipeline, by stage name.
pub type Snapshot = BTreeMap<String, serde_json::Value>;

/// Writes a snapshot as a JSON file.
///
/// # Errors
///
/// Returns an IO or serialization error.
pub fn save_snapshot(snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, snapshot)?;
    Ok(())
}

/// Reads a snapshot written by [`save_snapshot`].
///
/// # Errors
///
/// Returns an IO or serialization error.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Snapshot> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Parameters of an intermediate stage before linking.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDefinition {
    /// Name of the parent stage.
    pub source: String,
    /// The transform.
    pub transform: Transform,
    /// Caching override.
    pub cache: Option<bool>,
}

/// One entry of a pipeline definition.
#[derive(Debug, Clone, PartialEq)]
pub enum StageDefinition {
    /// The raw source.
    Source(SourceParams),
    /// A transform of another stage.
    Cached(CachedDefinition),
}

fn malformed(name: &str, message: impl Into<String>) -> RawflowError {
    let message = message.into();
    DefinitionError::coded("DEFINITION-MALFORMED", name, format!("Raw {name:?}: {message}")).into()
}

fn optional_f64(name: &str, value: Option<&serde_json::Value>) -> Result<Option<f64>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| malformed(name, format!("{v} is not a number"))),
    }
}

fn string_list(name: &str, key: &str, value: &serde_json::Value) -> Result<Vec<String>> {
    match value {
        serde_json::Value::String(s) => Ok(vec![s.clone()]),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| malformed(name, format!("{key}={value}: must be str or list of str")))
            })
            .collect(),
        _ => Err(malformed(name, format!("{key}={value}: must be str or list of str"))),
    }
}

fn object(
    name: &str,
    key: &str,
    value: Option<serde_json::Value>,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(serde_json::Map::new()),
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(other) => Err(malformed(name, format!("{key}={other}: must be an object"))),
    }
}

fn args(name: &str, value: Option<serde_json::Value>, max: usize) -> Result<Vec<serde_json::Value>> {
    match value {
        None => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) if items.len() <= max => Ok(items),
        Some(other) => Err(malformed(name, format!("args={other}: expected at most {max} values"))),
    }
}

impl StageDefinition {
    /// A raw source.
    #[must_use]
    pub fn source(params: SourceParams) -> Self {
        Self::Source(params)
    }

    /// A stage applying `transform` to the output of `source`.
    #[must_use]
    pub fn cached(source: impl Into<String>, transform: Transform) -> Self {
        Self::Cached(CachedDefinition {
            source: source.into(),
            transform,
            cache: None,
        })
    }

    /// Overrides caching of an intermediate stage; no effect on the source.
    #[must_use]
    pub fn with_cache(mut self, cache: bool) -> Self {
        if let Self::Cached(def) = &mut self {
            def.cache = Some(cache);
        }
        self
    }

    /// Name of the parent stage, `None` for the source.
    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        match self {
            Self::Source(_) => None,
            Self::Cached(def) => Some(&def.source),
        }
    }

    /// The snapshot type tag.
    #[must_use]
    pub fn stage_type(&self) -> StageType {
        match self {
            Self::Source(_) => StageType::RawSource,
            Self::Cached(def) => def.transform.stage_type(),
        }
    }

    /// Snapshot entry, identical to the linked stage's
    /// [`crate::stages::RawPipe::as_dict`].
    #[must_use]
    pub fn as_dict(&self, name: &str) -> serde_json::Value {
        match self {
            Self::Source(params) => {
                let mut out = serde_json::Map::new();
                out.insert("type".into(), serde_json::json!(StageType::RawSource.tag()));
                out.insert("name".into(), serde_json::json!(name));
                params.dict_entries(&mut out);
                serde_json::Value::Object(out)
            }
            Self::Cached(def) => crate::stages::cached_dict(
                name,
                &def.source,
                &def.transform,
                def.cache.unwrap_or_else(|| def.transform.caches_by_default()),
            ),
        }
    }

    /// Parses one entry of a declarative definition.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] for an unknown `type`, malformed
    /// values and keys the stage type does not use, and
    /// [`crate::errors::InvalidParameter`] for values the stage rejects.
    pub fn from_params(name: &str, params: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut params = params.clone();
        let Some(source) = params.remove("source") else {
            return Self::source_from_params(name, params);
        };
        let source = source
            .as_str()
            .ok_or_else(|| malformed(name, format!("source={source}: must be a stage name")))?
            .to_string();
        let tag = match params.remove("type") {
            Some(serde_json::Value::String(tag)) => tag,
            Some(other) => return Err(malformed(name, format!("type={other}: must be a string"))),
            None => return Err(malformed(name, "missing 'type'")),
        };
        let cache = match params.remove("cache") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Bool(b)) => Some(b),
            Some(other) => return Err(malformed(name, format!("cache={other}: must be true or false"))),
        };

        let transform = match StageType::from_definition_tag(&tag) {
            Some(StageType::RawFilter) => {
                let args = args(name, params.remove("args"), 2)?;
                let l_freq = optional_f64(name, args.first())?;
                let h_freq = optional_f64(name, args.get(1))?;
                let options = object(name, "kwargs", params.remove("kwargs"))?;
                Transform::Filter(FilterParams::new(l_freq, h_freq)?.with_options(options))
            }
            Some(StageType::RawFilterElliptic) => {
                let args = args(name, params.remove("args"), 6)?;
                if args.len() != 6 {
                    return Err(malformed(
                        name,
                        "args must be [low_stop, low_pass, high_pass, high_stop, gpass, gstop]",
                    ));
                }
                let edge = |i: usize| optional_f64(name, args.get(i));
                let gain = |i: usize| -> Result<f64> {
                    optional_f64(name, args.get(i))?
                        .ok_or_else(|| malformed(name, "gpass and gstop are required"))
                };
                Transform::Elliptic(EllipticParams::new(edge(0)?, edge(1)?, edge(2)?, edge(3)?, gain(4)?, gain(5)?)?)
            }
            Some(StageType::RawIca) => {
                let sessions = params
                    .remove("session")
                    .ok_or_else(|| malformed(name, "missing 'session'"))?;
                let sessions = string_list(name, "session", &sessions)?;
                let options = object(name, "kwargs", params.remove("kwargs"))?;
                Transform::Ica(IcaParams::new(sessions)?.with_options(options))
            }
            Some(StageType::RawMaxwell) => {
                Transform::Maxwell(MaxwellParams::new(object(name, "kwargs", params.remove("kwargs"))?))
            }
            Some(StageType::RawReReference) => {
                let reference = match params.remove("reference") {
                    None => Reference::Average,
                    Some(value) => Reference::from_value(&value)?,
                };
                Transform::ReReference(ReReferenceParams::new(reference))
            }
            Some(StageType::RawSource) | None => {
                return Err(DefinitionError::coded(
                    "DEFINITION-UNKNOWN-TYPE",
                    name,
                    format!("Raw {name:?}: unknown type {tag:?}"),
                )
                .into());
            }
        };

        if !params.is_empty() {
            let unused: Vec<&str> = params.keys().map(String::as_str).collect();
            return Err(DefinitionError::coded(
                "DEFINITION-UNUSED-PARAMETERS",
                name,
                format!("Unused parameters in raw definition {name:?}: {}", unused.join(", ")),
            )
            .into());
        }
        Ok(Self::Cached(CachedDefinition {
            source,
            transform,
            cache,
        }))
    }

    fn source_from_params(name: &str, mut params: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut source = SourceParams::default();
        if let Some(filename) = params.remove("filename") {
            source.filename = filename
                .as_str()
                .ok_or_else(|| malformed(name, format!("filename={filename}: must be a string")))?
                .to_string();
        }
        if let Some(sysname) = params.remove("sysname").filter(|v| !v.is_null()) {
            source.sysname = Some(Sysname::from_value(&sysname)?);
        }
        if let Some(montage) = params.remove("montage").filter(|v| !v.is_null()) {
            source.montage = Some(
                montage
                    .as_str()
                    .ok_or_else(|| malformed(name, format!("montage={montage}: must be a string")))?
                    .to_string(),
            );
        }
        if let Some(connectivity) = params.remove("connectivity").filter(|v| !v.is_null()) {
            source.connectivity = Some(Connectivity::from_value(&connectivity)?);
        }
        for (from, to) in object(name, "rename_channels", params.remove("rename_channels"))? {
            let to = to
                .as_str()
                .ok_or_else(|| malformed(name, format!("rename_channels: {to} is not a channel name")))?
                .to_string();
            source.rename_channels.insert(from, to);
        }
        // everything else goes to the reader
        source.reader_options = params;
        Ok(Self::Source(source))
    }
}

/// A complete, unlinked pipeline definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineDefinition {
    stages: BTreeMap<String, StageDefinition>,
}

impl PipelineDefinition {
    /// Creates an empty definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a stage.
    #[must_use]
    pub fn with_stage(mut self, name: impl Into<String>, stage: StageDefinition) -> Self {
        self.stages.insert(name.into(), stage);
        self
    }

    /// Parses a JSON object of stage definitions.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`StageDefinition::from_params`], or a
    /// [`DefinitionError`] if the value is not an object of objects.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let Some(entries) = value.as_object() else {
            let message = "pipeline definition must be an object of stages";
            return Err(DefinitionError::new(message)
                .with_error_info(ErrorInfo::new("DEFINITION-MALFORMED", message))
                .into());
        };
        let mut stages = BTreeMap::new();
        for (name, params) in entries {
            let params = params
                .as_object()
                .ok_or_else(|| malformed(name, "definition must be an object"))?;
            stages.insert(name.clone(), StageDefinition::from_params(name, params)?);
        }
        Ok(Self { stages })
    }

    /// Reads a definition from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an IO or serialization error, or any error of
    /// [`PipelineDefinition::from_value`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        Self::from_value(&value)
    }

    /// The stages by name.
    #[must_use]
    pub fn stages(&self) -> &BTreeMap<String, StageDefinition> {
        &self.stages
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the definition has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Checks the structure of the definition without linking it.
    ///
    /// `sessions` are the sessions ICA stages may train on.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] describing the first problem found.
    pub fn validate(&self, sessions: &[String]) -> Result<(), DefinitionError> {
        super::validate_definitions(&self.stages, sessions)
    }

    /// Snapshot of the definition, equal to that of the linked pipeline.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.stages
            .iter()
            .map(|(name, stage)| (name.clone(), stage.as_dict(name)))
            .collect()
    }
}

impl IntoIterator for PipelineDefinition {
    type Item = (String, StageDefinition);
    type IntoIter = std::collections::btree_map::IntoIter<String, StageDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.into_iter()
    }
}
