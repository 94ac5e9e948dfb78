//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds the directory layout and the tunable defaults of
//! a preprocessing pipeline. Every field has a default, so a configuration
//! only needs to name the experiment root:
//!
//! ```
//! use rawflow::config::PipelineConfig;
//!
//! let cfg = PipelineConfig {
//!     root: "/data/experiment".into(),
//!     sessions: vec!["words".into(), "rest".into()],
//!     ..PipelineConfig::default()
//! };
//! assert_eq!(cfg.flat_threshold, Some(1e-14));
//! ```

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory layout and defaults shared by all stages of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Experiment root, substituted for `{root}` in templates.
    pub root: PathBuf,

    /// Directory holding the raw recordings of one subject.
    ///
    /// Default: `"{root}/meg/{subject}"`.
    pub raw_dir: String,

    /// Location of cached stage outputs.
    ///
    /// Placeholders: `{root}`, `{subject}`, `{session}` and `{raw}` (the
    /// stage name). The companion log shares the path with a `.log`
    /// extension.
    pub cache_path: String,

    /// File name of per-subject ICA artifacts, relative to `raw_dir`.
    ///
    /// Placeholders: `{subject}` and `{raw}` (the ICA stage name).
    pub ica_file: String,

    /// Recording sessions known to the experiment.
    ///
    /// ICA stages may only train on sessions listed here.
    pub sessions: Vec<String>,

    /// Standard-deviation threshold below which a channel counts as flat.
    ///
    /// Used when a bad-channel file has to be created automatically.
    /// `None` (or `0`) disables detection; an empty bad-channel file is
    /// written instead.
    ///
    /// Default: `1e-14`.
    pub flat_threshold: Option<f64>,

    /// Sensor layout names for KIT MEG systems, by system id.
    pub kit_neighbors: BTreeMap<u32, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            raw_dir: "{root}/meg/{subject}".to_string(),
            cache_path: "{root}/eelbrain-cache/raw/{subject}/{subject} {session} {raw}-raw.fif"
                .to_string(),
            ica_file: "{subject} {raw}-ica.fif".to_string(),
            sessions: Vec::new(),
            flat_threshold: Some(1e-14),
            kit_neighbors: default_kit_neighbors(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default layout under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Sets the known sessions.
    #[must_use]
    pub fn with_sessions(mut self, sessions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sessions = sessions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the flat-channel threshold.
    #[must_use]
    pub fn with_flat_threshold(mut self, flat: Option<f64>) -> Self {
        self.flat_threshold = flat;
        self
    }

    /// Reads a configuration from a JSON file; missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or a serialization
    /// error if it is not valid JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn default_kit_neighbors() -> BTreeMap<u32, String> {
    [
        (32, "KIT-157"),
        (33, "KIT-157"),
        (34, "KIT-157"),
        (440, "KIT-208"),
        (441, "KIT-208"),
        (442, "KIT-208"),
        (51, "KIT-UMD-1"),
        (52, "KIT-UMD-2"),
        (53, "KIT-UMD-3"),
        (54, "KIT-UMD-4"),
    ]
    .into_iter()
    .map(|(id, name)| (id, name.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.raw_dir, "{root}/meg/{subject}");
        assert_eq!(cfg.flat_threshold, Some(1e-14));
        assert_eq!(cfg.kit_neighbors.get(&32).map(String::as_str), Some("KIT-157"));
    }

    #[test]
    fn test_builder_methods() {
        let cfg = PipelineConfig::new("/tmp/x")
            .with_sessions(["a", "b"])
            .with_flat_threshold(None);
        assert_eq!(cfg.root, PathBuf::from("/tmp/x"));
        assert_eq!(cfg.sessions, vec!["a", "b"]);
        assert_eq!(cfg.flat_threshold, None);
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"root": "/exp", "sessions": ["s1"]}}"#).unwrap();

        let cfg = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/exp"));
        assert_eq!(cfg.sessions, vec!["s1"]);
        assert_eq!(cfg.ica_file, "{subject} {raw}-ica.fif");
    }
}
