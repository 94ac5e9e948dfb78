//! The raw data source and its bad-channel files.

use super::{mark_bad_channels, CacheState, LoadOptions, RawPipe};
use crate::context::PipelineContext;
use crate::core::{DataKind, RawSignal, SignalInfo, StageType};
use crate::errors::{DefinitionError, InvalidParameter, MissingInputFile, Result};
use crate::io::{file_mtime, PathTemplate};
use crate::processing::{flat_channels, normalize_channel_names};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// Name every source stage must have.
pub const SOURCE_NAME: &str = "raw";

const DEFAULT_FILENAME: &str = "{subject}_{session}-raw.fif";

/// Sensor layout name, fixed or chosen per subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sysname {
    /// The same layout for every subject.
    Fixed(String),
    /// `(subject glob pattern, layout)` pairs, first match wins.
    ByPattern(Vec<(String, String)>),
}

impl Sysname {
    /// Parses a string, a `{pattern: name}` object or a list of pairs.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] for any other value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let invalid = || InvalidParameter::new("sysname", format!("{value}"));
        match value {
            serde_json::Value::String(s) => Ok(Self::Fixed(s.clone())),
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())).ok_or_else(invalid))
                .collect::<std::result::Result<_, _>>()
                .map(Self::ByPattern)
                .map_err(Into::into),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| match item.as_array().map(Vec::as_slice) {
                    Some([serde_json::Value::String(p), serde_json::Value::String(n)]) => {
                        Ok((p.clone(), n.clone()))
                    }
                    _ => Err(invalid()),
                })
                .collect::<std::result::Result<_, _>>()
                .map(Self::ByPattern)
                .map_err(Into::into),
            _ => Err(invalid().into()),
        }
    }

    /// JSON representation for snapshots.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Fixed(name) => serde_json::json!(name),
            Self::ByPattern(pairs) => serde_json::json!(pairs),
        }
    }

    fn resolve(&self, subject: &str) -> Option<String> {
        match self {
            Self::Fixed(name) => Some(name.clone()),
            Self::ByPattern(pairs) => pairs
                .iter()
                .find(|(pattern, _)| glob_matches(pattern, subject))
                .map(|(_, name)| name.clone()),
        }
    }
}

/// Shell-style match supporting `*`, `?`, `[seq]` and `[!seq]`.
fn glob_matches(pattern: &str, text: &str) -> bool {
    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => match char_class(&chars[i + 1..]) {
                Some((class, consumed)) => {
                    re.push_str(&class);
                    i += consumed;
                }
                // unterminated, so a literal bracket
                None => re.push_str(r"\["),
            },
            other => re.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }
    re.push('$');
    Regex::new(&re).is_ok_and(|re| re.is_match(text))
}

/// Translates the class following a `[`.
///
/// Returns the regex class and the number of pattern characters it spans,
/// including the closing `]`. A `]` right after the opening bracket is a
/// member of the class.
fn char_class(rest: &[char]) -> Option<(String, usize)> {
    let mut start = usize::from(rest.first() == Some(&'!'));
    if rest.get(start) == Some(&']') {
        start += 1;
    }
    let end = start + rest.get(start..)?.iter().position(|&c| c == ']')?;
    let (negated, members) = match rest[..end].split_first() {
        Some((&'!', members)) => (true, members),
        _ => (false, &rest[..end]),
    };
    let mut class = String::from(if negated { "[^" } else { "[" });
    for &c in members {
        if c == '-' {
            class.push(c);
        } else {
            class.push_str(&regex::escape(&c.to_string()));
        }
    }
    class.push(']');
    Some((class, end + 1))
}

/// Adjacency between sensors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    /// Derive adjacency from grid-like sensor names.
    Grid,
    /// Connections between named sensors.
    Pairs(Vec<(String, String)>),
    /// Connections between sensor indices, `i < j` in each pair.
    Indices(Vec<(usize, usize)>),
}

impl Connectivity {
    /// Parses `"grid"`, a list of name pairs or a list of index pairs.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] for other values or index pairs with
    /// `i >= j`.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let invalid = |msg: &str| InvalidParameter::new("connectivity", format!("{value}: {msg}"));
        match value {
            serde_json::Value::String(s) if s == "grid" => Ok(Self::Grid),
            serde_json::Value::Array(items) => {
                let pairs: Vec<&[serde_json::Value]> = items
                    .iter()
                    .map(|item| match item.as_array() {
                        Some(pair) if pair.len() == 2 => Ok(pair.as_slice()),
                        _ => Err(invalid("each connection needs two sensors")),
                    })
                    .collect::<std::result::Result<_, _>>()?;
                let named: Option<Vec<(String, String)>> = pairs
                    .iter()
                    .map(|p| Some((p[0].as_str()?.to_string(), p[1].as_str()?.to_string())))
                    .collect();
                if let Some(named) = named {
                    return Ok(Self::Pairs(named));
                }
                let mut edges = Vec::with_capacity(pairs.len());
                for p in pairs {
                    let index = |v: &serde_json::Value| v.as_u64().and_then(|i| usize::try_from(i).ok());
                    let (Some(i), Some(j)) = (index(&p[0]), index(&p[1])) else {
                        return Err(invalid("mixed sensor names and indices").into());
                    };
                    if i >= j {
                        return Err(invalid("index pairs must satisfy i < j").into());
                    }
                    edges.push((i, j));
                }
                Ok(Self::Indices(edges))
            }
            _ => Err(invalid("expected 'grid' or a list of connections").into()),
        }
    }

    /// JSON representation for snapshots.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Grid => serde_json::json!("grid"),
            Self::Pairs(pairs) => serde_json::json!(pairs),
            Self::Indices(pairs) => serde_json::json!(pairs),
        }
    }
}

/// Parameters of the raw data source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceParams {
    /// File name template inside the raw directory.
    pub filename: String,
    /// Extra parameters for the raw reader.
    pub reader_options: serde_json::Map<String, serde_json::Value>,
    /// Sensor layout for adjacency.
    pub sysname: Option<Sysname>,
    /// Channels to rename right after reading, `{from: to}`.
    pub rename_channels: BTreeMap<String, String>,
    /// Montage applied after renaming.
    pub montage: Option<String>,
    /// Explicit sensor adjacency.
    pub connectivity: Option<Connectivity>,
}

impl Default for SourceParams {
    fn default() -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_string(),
            reader_options: serde_json::Map::new(),
            sysname: None,
            rename_channels: BTreeMap::new(),
            montage: None,
            connectivity: None,
        }
    }
}

impl SourceParams {
    /// Sets the file name template.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Sets the sensor layout.
    #[must_use]
    pub fn with_sysname(mut self, sysname: Sysname) -> Self {
        self.sysname = Some(sysname);
        self
    }

    /// Sets the sensor adjacency.
    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Snapshot entries for these parameters.
    pub(crate) fn dict_entries(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        out.extend(self.reader_options.clone());
        if self.filename != DEFAULT_FILENAME {
            out.insert("filename".into(), serde_json::json!(self.filename));
        }
        if !self.rename_channels.is_empty() {
            out.insert("rename_channels".into(), serde_json::json!(self.rename_channels));
        }
        if let Some(montage) = &self.montage {
            out.insert("montage".into(), serde_json::json!(montage));
        }
        if let Some(connectivity) = &self.connectivity {
            out.insert("connectivity".into(), connectivity.to_value());
        }
        if let Some(sysname) = &self.sysname {
            out.insert("sysname".into(), sysname.to_value());
        }
    }
}

/// Derives the bad-channel file template from the raw file template.
fn bad_channels_template(raw: &PathTemplate) -> PathTemplate {
    let text = raw.as_str();
    let head = text.strip_suffix("-raw.fif").unwrap_or_else(|| {
        let file_start = text.rfind('/').map_or(0, |i| i + 1);
        text[file_start..]
            .rfind('.')
            .map_or(text, |dot| &text[..file_start + dot])
    });
    PathTemplate::new(format!("{head}-bad_channels.txt"))
}

fn read_bad_channel_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// The unique leaf stage: externally supplied raw recordings.
#[derive(Debug)]
pub struct SourcePipe {
    name: String,
    params: SourceParams,
    path: PathTemplate,
    bads_path: PathTemplate,
    ctx: Arc<PipelineContext>,
}

impl SourcePipe {
    /// Links a source stage.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] unless the stage is called `raw`.
    pub fn new(name: &str, params: SourceParams, ctx: Arc<PipelineContext>) -> Result<Self, DefinitionError> {
        if name != SOURCE_NAME {
            return Err(DefinitionError::coded(
                "DEFINITION-SOURCE-NAME",
                name,
                format!("RawSource with name {name:?}: the raw source must be called 'raw'"),
            ));
        }
        let path = ctx.raw_dir().join(&params.filename);
        let bads_path = bad_channels_template(&path);
        Ok(Self {
            name: name.to_string(),
            params,
            path,
            bads_path,
            ctx,
        })
    }

    /// The source parameters.
    #[must_use]
    pub fn params(&self) -> &SourceParams {
        &self.params
    }

    /// Location of the bad-channel file of one recording.
    #[must_use]
    pub fn bads_path(&self, subject: &str, session: &str) -> PathBuf {
        self.ctx.format(&self.bads_path, subject, session)
    }

    fn existing_raw_file(&self, subject: &str, session: &str) -> Result<PathBuf> {
        let path = self.path(subject, session);
        if path.exists() {
            Ok(path)
        } else {
            Err(MissingInputFile::new(
                path,
                format!("Raw input file for {subject}/{session} does not exist"),
            )
            .into())
        }
    }

    fn write_bad_channel_file(path: &Path, channels: &[String]) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, channels.join("\n"))?;
        Ok(())
    }
}

impl RawPipe for SourcePipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage_type(&self) -> StageType {
        StageType::RawSource
    }

    fn source_name(&self) -> Option<&str> {
        None
    }

    fn as_dict(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        out.insert("type".into(), serde_json::json!(StageType::RawSource.tag()));
        out.insert("name".into(), serde_json::json!(self.name));
        self.params.dict_entries(&mut out);
        serde_json::Value::Object(out)
    }

    fn path(&self, subject: &str, session: &str) -> PathBuf {
        self.ctx.format(&self.path, subject, session)
    }

    fn cache(&self, subject: &str, session: &str) -> Result<CacheState> {
        self.existing_raw_file(subject, session).map(CacheState::Current)
    }

    fn load(&self, subject: &str, session: &str, options: LoadOptions) -> Result<RawSignal> {
        let path = self.existing_raw_file(subject, session)?;
        let mut raw = self
            .ctx
            .store
            .read_raw(&path, &self.params.reader_options, options.preload)?;
        if !self.params.rename_channels.is_empty() {
            raw.rename_channels(&self.params.rename_channels)?;
        }
        if let Some(montage) = &self.params.montage {
            self.ctx.processor.set_montage(&mut raw, montage)?;
        }
        mark_bad_channels(self, raw, subject, session, options.include_bad_channels)
    }

    fn mtime(&self, subject: &str, session: &str, bad_chs: bool) -> Option<SystemTime> {
        let raw = file_mtime(&self.path(subject, session))?;
        if !bad_chs {
            return Some(raw);
        }
        file_mtime(&self.bads_path(subject, session)).map(|bads| raw.max(bads))
    }

    fn get_connectivity(&self, data: DataKind) -> Option<Connectivity> {
        match data {
            DataKind::Eog => None,
            _ => self.params.connectivity.clone(),
        }
    }

    fn get_sysname(&self, info: &SignalInfo, subject: &str, data: DataKind) -> Result<Option<String>> {
        if data == DataKind::Eog {
            return Ok(None);
        }
        if data == DataKind::Mag {
            if let Some(id) = info.kit_system_id {
                return match self.ctx.config.kit_neighbors.get(&id) {
                    Some(name) => Ok(Some(name.clone())),
                    None => Err(InvalidParameter::new(
                        "kit_system_id",
                        format!("Unknown KIT system-ID: {id}; add it to kit_neighbors"),
                    )
                    .into()),
                };
            }
        }
        match &self.params.sysname {
            Some(sysname) => Ok(sysname.resolve(subject)),
            None if self.params.connectivity.is_some() => Ok(None),
            None => Err(InvalidParameter::new(
                "sysname",
                format!(
                    "Unknown sensor configuration for {subject}, data={data}. \
                     Consider setting connectivity or sysname explicitly."
                ),
            )
            .into()),
        }
    }

    fn load_bad_channels(&self, subject: &str, session: &str) -> Result<Vec<String>> {
        let path = self.bads_path(subject, session);
        if !path.exists() {
            // the file has to exist so that its mtime is defined afterwards
            info!(subject, session, "Generating bad_channels file");
            self.make_bad_channels_auto(subject, session, self.ctx.config.flat_threshold, false)?;
            if !path.exists() {
                Self::write_bad_channel_file(&path, &[])?;
            }
        }
        read_bad_channel_file(&path)
    }

    fn make_bad_channels(&self, subject: &str, session: &str, bad_chs: &[String], redo: bool) -> Result<()> {
        let path = self.bads_path(subject, session);
        let old_bads = if path.exists() {
            Some(read_bad_channel_file(&path)?)
        } else {
            None
        };

        let raw = self.load(subject, session, LoadOptions::default().without_bad_channels())?;
        let mut new_bads = normalize_channel_names(bad_chs, raw.ch_names())?;
        if let (Some(old), false) = (&old_bads, redo) {
            new_bads.extend(old.iter().cloned());
        }
        new_bads.sort();
        new_bads.dedup();

        info!(
            subject,
            session,
            old = ?old_bads,
            new = ?new_bads,
            "Bad channels {:?} -> {:?}",
            old_bads,
            new_bads
        );
        Self::write_bad_channel_file(&path, &new_bads)
    }

    fn make_bad_channels_auto(&self, subject: &str, session: &str, flat: Option<f64>, redo: bool) -> Result<()> {
        let Some(flat) = flat.filter(|f| *f > 0.0) else {
            return Ok(());
        };
        let raw = self.load(subject, session, LoadOptions::default().without_bad_channels().preloaded())?;
        let bad_chs = flat_channels(&raw, flat);
        debug!(subject, session, flat, n_flat = bad_chs.len(), "Detected flat channels");
        self.make_bad_channels(subject, session, &bad_chs, redo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::errors::RawflowError;
    use crate::testing::{write_recording, CountingProcessor, synthetic_signal};
    use pretty_assertions::assert_eq;

    fn context(root: &Path) -> Arc<PipelineContext> {
        Arc::new(PipelineContext::new(
            PipelineConfig::new(root),
            Arc::new(CountingProcessor::new()),
        ))
    }

    fn source(root: &Path) -> SourcePipe {
        SourcePipe::new("raw", SourceParams::default(), context(root)).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_source_must_be_called_raw() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourcePipe::new("input", SourceParams::default(), context(dir.path())).unwrap_err();
        assert_eq!(err.code(), Some("DEFINITION-SOURCE-NAME"));
    }

    #[test]
    fn test_bad_channels_template() {
        let t = bad_channels_template(&PathTemplate::new("{root}/meg/{subject}/{subject}_{session}-raw.fif"));
        assert_eq!(t.as_str(), "{root}/meg/{subject}/{subject}_{session}-bad_channels.txt");
        let t = bad_channels_template(&PathTemplate::new("{root}/v1.2/{subject}.cnt"));
        assert_eq!(t.as_str(), "{root}/v1.2/{subject}-bad_channels.txt");
    }

    #[test]
    fn test_cache_missing_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = source(dir.path()).cache("R01", "words").unwrap_err();
        assert!(matches!(err, RawflowError::MissingInputFile(_)));
    }

    #[test]
    fn test_mtime_absent_without_raw() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path());
        assert!(src.mtime("R01", "words", false).is_none());
        write_recording(&src.path("R01", "words"), &synthetic_signal(&["C1"], 10));
        assert!(src.mtime("R01", "words", false).is_some());
        // bad-channel file not created yet
        assert!(src.mtime("R01", "words", true).is_none());
        src.load_bad_channels("R01", "words").unwrap();
        assert!(src.mtime("R01", "words", true).is_some());
    }

    #[test]
    fn test_load_bad_channels_autodetects_flat() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path());
        let mut signal = synthetic_signal(&["C1", "C2", "C3"], 20);
        signal.data.row_mut(1).fill(0.5);
        write_recording(&src.path("R01", "words"), &signal);

        assert_eq!(src.load_bad_channels("R01", "words").unwrap(), names(&["C2"]));
        assert!(src.bads_path("R01", "words").exists());
        let raw = src.load("R01", "words", LoadOptions::default()).unwrap();
        assert_eq!(raw.info.bads, names(&["C2"]));
        let raw = src.load("R01", "words", LoadOptions::default().without_bad_channels()).unwrap();
        assert!(raw.info.bads.is_empty());
    }

    #[test]
    fn test_disabled_detection_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(PipelineContext::new(
            PipelineConfig::new(dir.path()).with_flat_threshold(None),
            Arc::new(CountingProcessor::new()),
        ));
        let src = SourcePipe::new("raw", SourceParams::default(), ctx).unwrap();
        write_recording(&src.path("R01", "words"), &synthetic_signal(&["C1"], 10));

        assert!(src.load_bad_channels("R01", "words").unwrap().is_empty());
        assert!(src.bads_path("R01", "words").exists());
    }

    #[test]
    fn test_make_bad_channels_grows_monotonically() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path());
        write_recording(&src.path("R01", "words"), &synthetic_signal(&["A1", "A2", "A3"], 10));

        src.make_bad_channels("R01", "words", &names(&["A1"]), false).unwrap();
        src.make_bad_channels("R01", "words", &names(&["A2"]), false).unwrap();
        assert_eq!(src.load_bad_channels("R01", "words").unwrap(), names(&["A1", "A2"]));

        src.make_bad_channels("R01", "words", &names(&["A2"]), true).unwrap();
        assert_eq!(src.load_bad_channels("R01", "words").unwrap(), names(&["A2"]));
    }

    #[test]
    fn test_make_bad_channels_normalizes_names() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path());
        write_recording(&src.path("R01", "words"), &synthetic_signal(&["MEG 001", "MEG 002"], 10));

        src.make_bad_channels("R01", "words", &names(&["2"]), false).unwrap();
        assert_eq!(src.load_bad_channels("R01", "words").unwrap(), names(&["MEG 002"]));
        let err = src.make_bad_channels("R01", "words", &names(&["Cz"]), false).unwrap_err();
        assert!(matches!(err, RawflowError::InvalidParameter(_)));
    }

    #[test]
    fn test_bad_channel_file_ignores_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path());
        let path = src.bads_path("R01", "words");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "A1\n\n  \nA3\n").unwrap();
        assert_eq!(src.load_bad_channels("R01", "words").unwrap(), names(&["A1", "A3"]));
    }

    #[test]
    fn test_connectivity_and_sysname() {
        let dir = tempfile::tempdir().unwrap();
        let params = SourceParams::default()
            .with_connectivity(Connectivity::Grid)
            .with_sysname(Sysname::ByPattern(vec![
                ("R0*".into(), "KIT-UMD-3".into()),
                ("*".into(), "KIT-157".into()),
            ]));
        let src = SourcePipe::new("raw", params, context(dir.path())).unwrap();
        let info = synthetic_signal(&["C1"], 2).info;

        assert_eq!(src.get_connectivity(DataKind::Eeg), Some(Connectivity::Grid));
        assert_eq!(src.get_connectivity(DataKind::Eog), None);
        assert_eq!(src.get_sysname(&info, "R01", DataKind::Grad).unwrap().as_deref(), Some("KIT-UMD-3"));
        assert_eq!(src.get_sysname(&info, "S01", DataKind::Grad).unwrap().as_deref(), Some("KIT-157"));
        assert_eq!(src.get_sysname(&info, "S01", DataKind::Eog).unwrap(), None);
    }

    #[test]
    fn test_glob_patterns() {
        assert!(glob_matches("R0*", "R0312"));
        assert!(glob_matches("R0?", "R01"));
        assert!(!glob_matches("R0?", "R012"));
        assert!(glob_matches("R0[0-4]*", "R0312"));
        assert!(!glob_matches("R0[0-4]*", "R0512"));
        assert!(glob_matches("[!R]*", "S01"));
        assert!(!glob_matches("[!R]*", "R01"));
        assert!(glob_matches("[]a]1", "]1"));
        // unterminated classes and regex metacharacters are literal
        assert!(glob_matches("R[01", "R[01"));
        assert!(glob_matches("R.1", "R.1"));
        assert!(!glob_matches("R.1", "RX1"));
    }

    #[test]
    fn test_sysname_from_kit_system_id() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path());
        let mut info = synthetic_signal(&["C1"], 2).info;
        info.kit_system_id = Some(32);
        assert_eq!(src.get_sysname(&info, "R01", DataKind::Mag).unwrap().as_deref(), Some("KIT-157"));
        info.kit_system_id = Some(9999);
        assert!(src.get_sysname(&info, "R01", DataKind::Mag).is_err());
        info.kit_system_id = None;
        // neither sysname nor connectivity configured
        assert!(src.get_sysname(&info, "R01", DataKind::Eeg).is_err());
    }

    #[test]
    fn test_connectivity_parsing() {
        assert_eq!(
            Connectivity::from_value(&serde_json::json!([["OZ", "O1"], ["OZ", "O2"]])).unwrap(),
            Connectivity::Pairs(vec![("OZ".into(), "O1".into()), ("OZ".into(), "O2".into())])
        );
        assert_eq!(
            Connectivity::from_value(&serde_json::json!([[0, 1], [1, 2]])).unwrap(),
            Connectivity::Indices(vec![(0, 1), (1, 2)])
        );
        assert!(Connectivity::from_value(&serde_json::json!([[2, 1]])).is_err());
        assert!(Connectivity::from_value(&serde_json::json!("ring")).is_err());
    }

    #[test]
    fn test_as_dict_lists_non_default_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = SourceParams::default().with_connectivity(Connectivity::Grid);
        params.montage = Some("standard_1020".into());
        let src = SourcePipe::new("raw", params, context(dir.path())).unwrap();
        assert_eq!(
            src.as_dict(),
            serde_json::json!({
                "type": "RawSource",
                "name": "raw",
                "montage": "standard_1020",
                "connectivity": "grid",
            })
        );
    }
}
