//! The external signal-processing port.

use crate::core::{Decomposition, RawSignal};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Second-order sections, one `[b0, b1, b2, a0, a1, a2]` row per section.
pub type SosFilter = Array2<f64>;

/// Which frequencies an IIR filter lets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandType {
    /// Keep frequencies below the pass edge.
    Lowpass,
    /// Keep frequencies above the pass edge.
    Highpass,
    /// Keep frequencies between the pass edges.
    Bandpass,
}

impl fmt::Display for BandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowpass => write!(f, "lowpass"),
            Self::Highpass => write!(f, "highpass"),
            Self::Bandpass => write!(f, "bandpass"),
        }
    }
}

/// Requirements for an elliptic filter, edges normalized to Nyquist.
///
/// `wp`/`ws` hold one edge for low- and highpass filters and two
/// (`[low, high]`) for bandpass filters. The processor derives the minimum
/// order meeting `gpass`/`gstop` and designs the filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EllipticDesign {
    /// Band type.
    pub btype: BandType,
    /// Passband edge(s), fraction of Nyquist.
    pub wp: Vec<f64>,
    /// Stopband edge(s), fraction of Nyquist.
    pub ws: Vec<f64>,
    /// Maximum passband loss in dB.
    pub gpass: f64,
    /// Minimum stopband attenuation in dB.
    pub gstop: f64,
}

/// Numeric operations the pipeline delegates to a signal-processing library.
///
/// Implementations are expected to be pure with respect to their inputs;
/// the pipeline owns all caching and bookkeeping.
pub trait SignalProcessor: Send + Sync + Debug {
    /// Library name, recorded in provenance logs.
    fn name(&self) -> &str;

    /// Library version, recorded in provenance logs.
    fn version(&self) -> String;

    /// Zero-phase FIR filter applied along the time axis of `data`
    /// (`[channels, times]`), in place.
    fn filter(
        &self,
        data: &mut Array2<f64>,
        sfreq: f64,
        l_freq: Option<f64>,
        h_freq: Option<f64>,
        options: &serde_json::Map<String, serde_json::Value>,
    ) -> anyhow::Result<()>;

    /// Minimum-order elliptic design in second-order sections.
    fn elliptic_sos(&self, design: &EllipticDesign) -> anyhow::Result<SosFilter>;

    /// Applies second-order sections to one channel.
    fn sosfilt(&self, sos: &SosFilter, x: ArrayView1<'_, f64>) -> anyhow::Result<Array1<f64>>;

    /// Fits an ICA model on the good MEG/EEG channels of `raw`.
    ///
    /// The returned model's `ch_names` must list exactly those channels.
    fn fit_ica(
        &self,
        raw: &RawSignal,
        options: &serde_json::Map<String, serde_json::Value>,
    ) -> anyhow::Result<Decomposition>;

    /// Removes the excluded components of `ica` from `raw`, in place.
    fn apply_ica(&self, ica: &Decomposition, raw: &mut RawSignal) -> anyhow::Result<()>;

    /// Maxwell filter; bad channels of `raw` are excluded from the expansion.
    fn maxwell_filter(
        &self,
        raw: &RawSignal,
        options: &serde_json::Map<String, serde_json::Value>,
    ) -> anyhow::Result<RawSignal>;

    /// Applies a named sensor montage.
    fn set_montage(&self, raw: &mut RawSignal, montage: &str) -> anyhow::Result<()>;
}
