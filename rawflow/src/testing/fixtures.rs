//! Synthetic recordings for pipeline tests.

use crate::core::{ChannelKind, RawSignal, SignalInfo};
use crate::io::{JsonSignalStore, SignalStore};
use ndarray::Array2;
use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Sampling rate of [`synthetic_signal`] recordings.
pub const SYNTHETIC_SFREQ: f64 = 100.0;

/// An EEG recording with one distinct, non-flat sinusoid per channel.
#[must_use]
pub fn synthetic_signal(ch_names: &[&str], n_times: usize) -> RawSignal {
    let data = Array2::from_shape_fn((ch_names.len(), n_times), |(ch, t)| {
        let freq = (ch + 1) as f64;
        (0.3 * freq * t as f64 + ch as f64).sin()
    });
    RawSignal {
        info: SignalInfo {
            ch_names: ch_names.iter().map(ToString::to_string).collect(),
            ch_kinds: vec![ChannelKind::Eeg; ch_names.len()],
            sfreq: SYNTHETIC_SFREQ,
            highpass: 0.0,
            lowpass: SYNTHETIC_SFREQ / 2.0,
            bads: Vec::new(),
            kit_system_id: None,
        },
        data,
    }
}

/// Writes `signal` where a source stage expects its raw file.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_recording(path: &Path, signal: &RawSignal) {
    if let Some(dir) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            panic!("cannot create {}: {e}", dir.display());
        }
    }
    if let Err(e) = JsonSignalStore::new().write(path, signal) {
        panic!("cannot write recording {}: {e}", path.display());
    }
}

/// Moves the modification time of `path` `secs` seconds into the future.
///
/// # Panics
///
/// Panics if the file does not exist.
pub fn touch(path: &Path, secs: u64) {
    let result = File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now() + Duration::from_secs(secs)));
    if let Err(e) = result {
        panic!("cannot touch {}: {e}", path.display());
    }
}
