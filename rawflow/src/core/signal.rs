//! Continuous recordings and decomposition artifacts.

use crate::errors::{InvalidParameter, Result};
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// The sensor type of a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// MEG magnetometer.
    Mag,
    /// MEG gradiometer.
    Grad,
    /// EEG electrode.
    Eeg,
    /// Electro-oculogram.
    Eog,
    /// MEG reference sensor.
    RefMeg,
    /// Trigger channel.
    Stim,
    /// Anything else.
    Misc,
}

impl ChannelKind {
    /// MEG and EEG sensors, the channels a decomposition is fitted on.
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Mag | Self::Grad | Self::Eeg)
    }
}

/// Measurement info of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInfo {
    /// Channel names, one per data row.
    pub ch_names: Vec<String>,
    /// Channel kinds, parallel to `ch_names`.
    pub ch_kinds: Vec<ChannelKind>,
    /// Sampling frequency in Hz.
    pub sfreq: f64,
    /// Highpass edge already applied to the data, in Hz.
    #[serde(default)]
    pub highpass: f64,
    /// Lowpass edge already applied to the data, in Hz.
    pub lowpass: f64,
    /// Channels marked as bad.
    #[serde(default)]
    pub bads: Vec<String>,
    /// KIT system identifier for KIT MEG recordings.
    #[serde(default)]
    pub kit_system_id: Option<u32>,
}

/// A continuous multichannel recording, `[n_channels, n_times]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    /// Measurement info.
    pub info: SignalInfo,
    /// Samples, one row per channel.
    pub data: Array2<f64>,
}

impl RawSignal {
    /// Creates a recording, checking that info and data agree.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] if the channel lists and the data shape
    /// disagree or the sampling rate is not positive.
    pub fn new(
        ch_names: Vec<String>,
        ch_kinds: Vec<ChannelKind>,
        sfreq: f64,
        data: Array2<f64>,
    ) -> Result<Self> {
        if ch_names.len() != ch_kinds.len() || ch_names.len() != data.nrows() {
            return Err(InvalidParameter::new(
                "signal",
                format!(
                    "{} channel names, {} channel kinds and {} data rows",
                    ch_names.len(),
                    ch_kinds.len(),
                    data.nrows()
                ),
            )
            .into());
        }
        if sfreq <= 0.0 {
            return Err(InvalidParameter::new("sfreq", format!("{sfreq} Hz")).into());
        }
        Ok(Self {
            info: SignalInfo {
                ch_names,
                ch_kinds,
                sfreq,
                highpass: 0.0,
                lowpass: sfreq / 2.0,
                bads: Vec::new(),
                kit_system_id: None,
            },
            data,
        })
    }

    /// Number of channels.
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples per channel.
    #[must_use]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Channel names.
    #[must_use]
    pub fn ch_names(&self) -> &[String] {
        &self.info.ch_names
    }

    /// Indices of channels whose kind satisfies `keep`, optionally skipping bads.
    #[must_use]
    pub fn picks(&self, keep: impl Fn(ChannelKind) -> bool, exclude_bads: bool) -> Vec<usize> {
        let bads: HashSet<&str> = if exclude_bads {
            self.info.bads.iter().map(String::as_str).collect()
        } else {
            HashSet::new()
        };
        self.info
            .ch_kinds
            .iter()
            .zip(&self.info.ch_names)
            .enumerate()
            .filter(|(_, (kind, name))| keep(**kind) && !bads.contains(name.as_str()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Names of good MEG/EEG channels.
    #[must_use]
    pub fn good_data_channels(&self) -> Vec<String> {
        self.picks(ChannelKind::is_data, true)
            .into_iter()
            .map(|i| self.info.ch_names[i].clone())
            .collect()
    }

    /// Renames channels according to a `{from: to}` map.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] if a source name does not exist.
    pub fn rename_channels(&mut self, mapping: &BTreeMap<String, String>) -> Result<()> {
        for (from, to) in mapping {
            let Some(idx) = self.info.ch_names.iter().position(|n| n == from) else {
                return Err(InvalidParameter::new(
                    "rename_channels",
                    format!("channel {from:?} does not exist"),
                )
                .into());
            };
            self.info.ch_names[idx].clone_from(to);
            for bad in &mut self.info.bads {
                if bad == from {
                    bad.clone_from(to);
                }
            }
        }
        Ok(())
    }

    /// Appends another recording with the same channels along the time axis.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] if channels or sampling rate differ.
    pub fn append(&mut self, other: &Self) -> Result<()> {
        if self.info.ch_names != other.info.ch_names {
            return Err(InvalidParameter::new(
                "append",
                "recordings have different channels",
            )
            .into());
        }
        if (self.info.sfreq - other.info.sfreq).abs() > f64::EPSILON {
            return Err(InvalidParameter::new(
                "append",
                format!("sampling rates differ ({} vs {})", self.info.sfreq, other.info.sfreq),
            )
            .into());
        }
        self.data = concatenate(Axis(1), &[self.data.view(), other.data.view()])
            .map_err(|e| InvalidParameter::new("append", e.to_string()))?;
        Ok(())
    }
}

/// A fitted ICA model, persisted once per subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    /// Channels the model was fitted on, in data order.
    pub ch_names: Vec<String>,
    /// Number of retained components.
    pub n_components: usize,
    /// Mixing matrix, `[n_channels, n_components]`.
    pub mixing: Array2<f64>,
    /// Unmixing matrix, `[n_components, n_channels]`.
    pub unmixing: Array2<f64>,
    /// Components marked for removal.
    #[serde(default)]
    pub exclude: Vec<usize>,
    /// Options the model was fitted with.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl Decomposition {
    /// Whether the model was fitted on exactly the good data channels of `raw`.
    #[must_use]
    pub fn matches_channels(&self, raw: &RawSignal) -> bool {
        self.ch_names == raw.good_data_channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn three_channels() -> RawSignal {
        RawSignal::new(
            vec!["C1".into(), "C2".into(), "STI".into()],
            vec![ChannelKind::Eeg, ChannelKind::Eeg, ChannelKind::Stim],
            100.0,
            array![[1.0, 2.0], [3.0, 4.0], [0.0, 1.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = RawSignal::new(
            vec!["C1".into()],
            vec![ChannelKind::Eeg],
            100.0,
            array![[1.0], [2.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_good_data_channels_skip_bads_and_stim() {
        let mut raw = three_channels();
        assert_eq!(raw.good_data_channels(), vec!["C1", "C2"]);
        raw.info.bads = vec!["C2".into()];
        assert_eq!(raw.good_data_channels(), vec!["C1"]);
    }

    #[test]
    fn test_append_concatenates_time() {
        let mut raw = three_channels();
        let other = three_channels();
        raw.append(&other).unwrap();
        assert_eq!(raw.n_times(), 4);
        assert_eq!(raw.data[[1, 3]], 4.0);
    }

    #[test]
    fn test_rename_channels_updates_bads() {
        let mut raw = three_channels();
        raw.info.bads = vec!["C1".into()];
        let mapping = BTreeMap::from([("C1".to_string(), "Fz".to_string())]);
        raw.rename_channels(&mapping).unwrap();
        assert_eq!(raw.ch_names()[0], "Fz");
        assert_eq!(raw.info.bads, vec!["Fz"]);

        let missing = BTreeMap::from([("X".to_string(), "Y".to_string())]);
        assert!(raw.rename_channels(&missing).is_err());
    }

    #[test]
    fn test_decomposition_channel_check() {
        let mut raw = three_channels();
        let ica = Decomposition {
            ch_names: vec!["C1".into(), "C2".into()],
            n_components: 1,
            mixing: Array2::zeros((2, 1)),
            unmixing: Array2::zeros((1, 2)),
            exclude: vec![],
            options: serde_json::Map::new(),
        };
        assert!(ica.matches_channels(&raw));
        raw.info.bads = vec!["C2".into()];
        assert!(!ica.matches_channels(&raw));
    }
}
