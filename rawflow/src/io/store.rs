//! Codecs for recordings and decomposition artifacts.

use crate::core::{Decomposition, RawSignal};
use crate::errors::{MissingInputFile, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, warn};

/// Reads and writes recordings and decomposition artifacts.
///
/// The pipeline never interprets file contents itself; every read and
/// write of a recording goes through this port.
pub trait SignalStore: Send + Sync + Debug {
    /// Reads an externally supplied raw recording.
    ///
    /// `options` are the reader parameters of the source stage.
    fn read_raw(
        &self,
        path: &Path,
        options: &serde_json::Map<String, serde_json::Value>,
        preload: bool,
    ) -> Result<RawSignal>;

    /// Reads a recording previously written with [`SignalStore::write`].
    fn read(&self, path: &Path, preload: bool) -> Result<RawSignal>;

    /// Writes a recording, replacing any existing file.
    fn write(&self, path: &Path, signal: &RawSignal) -> Result<()>;

    /// Reads a decomposition artifact.
    fn read_decomposition(&self, path: &Path) -> Result<Decomposition>;

    /// Writes a decomposition artifact, replacing any existing file.
    fn write_decomposition(&self, path: &Path, decomposition: &Decomposition) -> Result<()>;
}

/// Stores everything as JSON documents.
///
/// Raw recordings are expected in the same layout the store writes, which
/// makes it suitable for tests and for data converted ahead of time.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSignalStore;

impl JsonSignalStore {
    /// Creates a new JSON store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MissingInputFile::new(path, format!("{what} does not exist")).into());
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, value)?;
    Ok(())
}

impl SignalStore for JsonSignalStore {
    fn read_raw(
        &self,
        path: &Path,
        options: &serde_json::Map<String, serde_json::Value>,
        _preload: bool,
    ) -> Result<RawSignal> {
        if !options.is_empty() {
            warn!(
                path = %path.display(),
                options = ?options.keys().collect::<Vec<_>>(),
                "JSON store ignores reader options"
            );
        }
        read_json(path, "Raw recording")
    }

    fn read(&self, path: &Path, _preload: bool) -> Result<RawSignal> {
        debug!(path = %path.display(), "Reading cached recording");
        read_json(path, "Cached recording")
    }

    fn write(&self, path: &Path, signal: &RawSignal) -> Result<()> {
        write_json(path, signal)
    }

    fn read_decomposition(&self, path: &Path) -> Result<Decomposition> {
        read_json(path, "ICA file")
    }

    fn write_decomposition(&self, path: &Path, decomposition: &Decomposition) -> Result<()> {
        write_json(path, decomposition)
    }
}
