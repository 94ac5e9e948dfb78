//! Stage trait and implementations.
//!
//! Stages ("raw pipes") are the units of a preprocessing pipeline. The
//! [`SourcePipe`] reads recordings from disk and owns the bad-channel files;
//! every other stage is a [`CachedPipe`] that transforms the output of its
//! parent and memoizes the result on disk.
//!
//! Staleness is decided purely by modification times: a cache file is
//! current as long as it is not older than the newest input that influences
//! it (see [`RawPipe::mtime`]).

mod cached;
mod elliptic;
mod filter;
mod ica;
mod maxwell;
mod reference;
mod source;

pub(crate) use cached::cached_dict;
pub use cached::{CachedPipe, Transform};
pub use elliptic::EllipticParams;
pub use filter::FilterParams;
pub use ica::{ica_path, IcaParams};
pub use maxwell::MaxwellParams;
pub use reference::ReReferenceParams;
pub use source::{Connectivity, SourceParams, SourcePipe, Sysname, SOURCE_NAME};

use crate::core::{DataKind, RawSignal, SignalInfo, StageType};
use crate::errors::Result;
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::SystemTime;

/// Options for [`RawPipe::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Mark the recorded bad channels in the returned info.
    pub include_bad_channels: bool,
    /// Ask the store to read samples into memory right away.
    pub preload: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            include_bad_channels: true,
            preload: false,
        }
    }
}

impl LoadOptions {
    /// Load without marking bad channels.
    #[must_use]
    pub fn without_bad_channels(mut self) -> Self {
        self.include_bad_channels = false;
        self
    }

    /// Load with samples in memory.
    #[must_use]
    pub fn preloaded(mut self) -> Self {
        self.preload = true;
        self
    }
}

/// Outcome of [`RawPipe::cache`].
#[derive(Debug, Clone)]
pub enum CacheState {
    /// The file on disk is up to date; nothing was computed.
    Current(PathBuf),
    /// The output was recomputed (and written, if the stage caches).
    Computed(RawSignal),
}

impl CacheState {
    /// Returns true if the stage output was recomputed.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }
}

/// The contract every preprocessing stage fulfils.
///
/// Bad-channel operations are answered by the source stage; intermediate
/// stages delegate to their parent.
pub trait RawPipe: Send + Sync + Debug {
    /// The stage name, unique within its pipeline.
    fn name(&self) -> &str;

    /// The stage variant.
    fn stage_type(&self) -> StageType;

    /// Name of the parent stage (`None` for the source).
    fn source_name(&self) -> Option<&str>;

    /// Parameter-only description used for change detection.
    fn as_dict(&self) -> serde_json::Value;

    /// Location of the stage output for one subject and session.
    fn path(&self, subject: &str, session: &str) -> PathBuf;

    /// Makes sure the stage output exists on disk and is up to date.
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::MissingInputFile`] if a required input does
    /// not exist, or any error raised while computing the output.
    fn cache(&self, subject: &str, session: &str) -> Result<CacheState>;

    /// Loads the stage output.
    fn load(&self, subject: &str, session: &str, options: LoadOptions) -> Result<RawSignal>;

    /// Modification time of anything influencing the output of
    /// [`RawPipe::load`], or `None` if a required input is missing.
    fn mtime(&self, subject: &str, session: &str, bad_chs: bool) -> Option<SystemTime>;

    /// Sensor adjacency for spatial statistics.
    fn get_connectivity(&self, data: DataKind) -> Option<Connectivity>;

    /// Name of the sensor layout used to derive adjacency.
    fn get_sysname(&self, info: &SignalInfo, subject: &str, data: DataKind) -> Result<Option<String>>;

    /// Reads the bad channels of one recording, creating the file if needed.
    fn load_bad_channels(&self, subject: &str, session: &str) -> Result<Vec<String>>;

    /// Records bad channels, merging with the existing list unless `redo`.
    fn make_bad_channels(&self, subject: &str, session: &str, bad_chs: &[String], redo: bool) -> Result<()>;

    /// Detects flat channels and records them as bad.
    fn make_bad_channels_auto(&self, subject: &str, session: &str, flat: Option<f64>, redo: bool) -> Result<()>;

    /// Downcast to a cached stage.
    fn as_cached(&self) -> Option<&CachedPipe> {
        None
    }
}

/// Sets `info.bads` of a freshly loaded recording.
pub(crate) fn mark_bad_channels(
    pipe: &dyn RawPipe,
    mut raw: RawSignal,
    subject: &str,
    session: &str,
    include: bool,
) -> Result<RawSignal> {
    raw.info.bads = if include {
        pipe.load_bad_channels(subject, session)?
    } else {
        Vec::new()
    };
    Ok(raw)
}
