//! Stage type tags, diff status and data-kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The variant of a preprocessing stage.
///
/// The serialized form is the tag used in pipeline snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageType {
    /// Raw data read from disk.
    RawSource,
    /// FIR band-pass filter.
    RawFilter,
    /// Elliptic IIR filter in second-order sections.
    RawFilterElliptic,
    /// Independent component analysis artifact removal.
    #[serde(rename = "RawICA")]
    RawIca,
    /// Maxwell filter (hardware noise compensation).
    RawMaxwell,
    /// EEG re-referencing.
    RawReReference,
}

impl StageType {
    /// Returns the tag written into snapshots.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::RawSource => "RawSource",
            Self::RawFilter => "RawFilter",
            Self::RawFilterElliptic => "RawFilterElliptic",
            Self::RawIca => "RawICA",
            Self::RawMaxwell => "RawMaxwell",
            Self::RawReReference => "RawReReference",
        }
    }

    /// Resolves the `type` key of a declarative definition.
    #[must_use]
    pub fn from_definition_tag(tag: &str) -> Option<Self> {
        match tag {
            "filter" => Some(Self::RawFilter),
            "elliptic_filter" => Some(Self::RawFilterElliptic),
            "ica" => Some(Self::RawIca),
            "maxwell_filter" => Some(Self::RawMaxwell),
            "reference" => Some(Self::RawReReference),
            _ => None,
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Change status of a stage between two pipeline snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    /// Only present in the new snapshot.
    New,
    /// Only present in the old snapshot.
    Removed,
    /// Definition (or an ancestor's definition) changed.
    Changed,
    /// Unchanged, cached files remain valid.
    Good,
}

impl DiffStatus {
    /// Returns true if cached byproducts may be invalid.
    #[must_use]
    pub fn is_bad(self) -> bool {
        !matches!(self, Self::Good)
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Removed => write!(f, "removed"),
            Self::Changed => write!(f, "changed"),
            Self::Good => write!(f, "good"),
        }
    }
}

/// The kind of sensor data a query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// EEG electrodes.
    Eeg,
    /// MEG magnetometers.
    Mag,
    /// MEG gradiometers.
    Grad,
    /// Electro-oculogram.
    Eog,
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eeg" => Ok(Self::Eeg),
            "mag" => Ok(Self::Mag),
            "grad" => Ok(Self::Grad),
            "eog" => Ok(Self::Eog),
            other => Err(format!("unknown data kind {other:?}")),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eeg => write!(f, "eeg"),
            Self::Mag => write!(f, "mag"),
            Self::Grad => write!(f, "grad"),
            Self::Eog => write!(f, "eog"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_type_tags() {
        assert_eq!(StageType::RawIca.tag(), "RawICA");
        assert_eq!(StageType::RawFilter.to_string(), "RawFilter");
        let json = serde_json::to_string(&StageType::RawIca).unwrap();
        assert_eq!(json, r#""RawICA""#);
    }

    #[test]
    fn test_definition_tags() {
        assert_eq!(StageType::from_definition_tag("ica"), Some(StageType::RawIca));
        assert_eq!(
            StageType::from_definition_tag("elliptic_filter"),
            Some(StageType::RawFilterElliptic)
        );
        assert_eq!(StageType::from_definition_tag("RawFilter"), None);
    }

    #[test]
    fn test_diff_status_display() {
        assert_eq!(DiffStatus::New.to_string(), "new");
        assert_eq!(DiffStatus::Removed.to_string(), "removed");
        assert!(DiffStatus::Changed.is_bad());
        assert!(!DiffStatus::Good.is_bad());
    }

    #[test]
    fn test_data_kind_parse() {
        assert_eq!("eog".parse::<DataKind>(), Ok(DataKind::Eog));
        assert!("meg".parse::<DataKind>().is_err());
    }
}
