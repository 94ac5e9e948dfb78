//! FIR filter stage.
//!
//! Edges in increasing order give a band-pass, `l_freq > h_freq` a
//! band-stop filter.

use super::cached::Upstream;
use super::{LoadOptions, RawPipe};
use crate::core::{ChannelKind, RawSignal, SignalInfo};
use crate::errors::{InvalidParameter, Result};
use crate::processing::SignalProcessor;
use ndarray::{Array2, Axis};
use tracing::debug;

/// Band edges and extra options of a FIR filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    /// Highpass edge in Hz.
    pub l_freq: Option<f64>,
    /// Lowpass edge in Hz.
    pub h_freq: Option<f64>,
    /// Options passed through to the filter routine.
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl FilterParams {
    /// Creates filter parameters.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] if neither edge is given, an edge is
    /// not a positive frequency, or both edges are equal.
    #[allow(clippy::float_cmp)]
    pub fn new(l_freq: Option<f64>, h_freq: Option<f64>) -> Result<Self> {
        match (l_freq, h_freq) {
            (None, None) => {
                return Err(InvalidParameter::new("filter", "l_freq and h_freq can not both be None").into());
            }
            (Some(l), Some(h)) if l == h => {
                return Err(InvalidParameter::new("filter", format!("l_freq and h_freq are both {l} Hz")).into());
            }
            _ => {}
        }
        for edge in [l_freq, h_freq].into_iter().flatten() {
            if !edge.is_finite() || edge <= 0.0 {
                return Err(InvalidParameter::new("filter", format!("band edge {edge} Hz")).into());
            }
        }
        Ok(Self {
            l_freq,
            h_freq,
            options: serde_json::Map::new(),
        })
    }

    /// Sets options for the filter routine.
    #[must_use]
    pub fn with_options(mut self, options: serde_json::Map<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    /// Options as passed to the processor, `fir_design` defaulting to `firwin2`.
    #[must_use]
    pub fn effective_options(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut options = self.options.clone();
        if options.get("fir_design").map_or(true, serde_json::Value::is_null) {
            options.insert("fir_design".into(), serde_json::json!("firwin2"));
        }
        options
    }

    /// Filters data that is already loaded, `[channels, times]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::RawflowError::Processor`] if the filter
    /// routine fails.
    pub fn filter_data(&self, processor: &dyn SignalProcessor, data: &mut Array2<f64>, sfreq: f64) -> Result<()> {
        processor.filter(data, sfreq, self.l_freq, self.h_freq, &self.effective_options())?;
        Ok(())
    }

    /// Whether the edges describe a band-stop filter.
    #[must_use]
    pub fn is_band_stop(&self) -> bool {
        matches!((self.l_freq, self.h_freq), (Some(l), Some(h)) if l > h)
    }

    fn update_band(&self, info: &mut SignalInfo) {
        // a band-stop keeps the passband edges
        if self.is_band_stop() {
            return;
        }
        if let Some(l) = self.l_freq {
            info.highpass = info.highpass.max(l);
        }
        if let Some(h) = self.h_freq {
            info.lowpass = info.lowpass.min(h);
        }
    }

    pub(crate) fn make(&self, up: &Upstream<'_>, subject: &str, session: &str) -> Result<RawSignal> {
        let mut raw = up.parent.load(subject, session, LoadOptions::default().preloaded())?;
        debug!(stage = up.name, subject, session, "Filtering raw");

        let picks = raw.picks(ChannelKind::is_data, false);
        let mut block = raw.data.select(Axis(0), &picks);
        self.filter_data(up.ctx.processor.as_ref(), &mut block, raw.info.sfreq)?;
        for (row, &idx) in block.rows().into_iter().zip(&picks) {
            raw.data.row_mut(idx).assign(&row);
        }

        self.update_band(&mut raw.info);
        Ok(raw)
    }

    pub(crate) fn dict_entries(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        out.insert("args".into(), serde_json::json!([self.l_freq, self.h_freq]));
        out.insert("kwargs".into(), serde_json::Value::Object(self.options.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{synthetic_signal, CountingProcessor};

    #[test]
    fn test_edges_validated() {
        assert!(FilterParams::new(None, None).is_err());
        assert!(FilterParams::new(Some(40.0), Some(40.0)).is_err());
        assert!(FilterParams::new(Some(-1.0), None).is_err());
        assert!(FilterParams::new(Some(f64::NAN), None).is_err());
        assert!(FilterParams::new(Some(1.0), None).is_ok());
        assert!(FilterParams::new(None, Some(40.0)).is_ok());
    }

    #[test]
    fn test_band_stop() {
        let params = FilterParams::new(Some(55.0), Some(45.0)).unwrap();
        assert!(params.is_band_stop());
        assert!(!FilterParams::new(Some(1.0), Some(40.0)).unwrap().is_band_stop());

        let mut info = synthetic_signal(&["C1"], 10).info;
        let before = (info.highpass, info.lowpass);
        params.update_band(&mut info);
        assert_eq!((info.highpass, info.lowpass), before);

        FilterParams::new(Some(1.0), Some(40.0)).unwrap().update_band(&mut info);
        assert_eq!(info.lowpass, 40.0);
        assert_eq!(info.highpass, 1.0);
    }

    #[test]
    fn test_fir_design_default() {
        let params = FilterParams::new(Some(1.0), Some(40.0)).unwrap();
        assert_eq!(params.effective_options()["fir_design"], "firwin2");

        let mut options = serde_json::Map::new();
        options.insert("fir_design".into(), serde_json::json!("firwin"));
        let params = params.with_options(options);
        assert_eq!(params.effective_options()["fir_design"], "firwin");
        // the stored options stay as given
        assert_eq!(params.options.len(), 1);
    }

    #[test]
    fn test_dict_keeps_user_options_only() {
        let params = FilterParams::new(None, Some(40.0)).unwrap();
        let mut out = serde_json::Map::new();
        params.dict_entries(&mut out);
        assert_eq!(out["args"], serde_json::json!([null, 40.0]));
        assert_eq!(out["kwargs"], serde_json::json!({}));
    }

    #[test]
    fn test_filter_data_calls_processor() {
        let processor = CountingProcessor::new();
        let params = FilterParams::new(Some(1.0), None).unwrap();
        let mut data = Array2::ones((2, 8));
        params.filter_data(&processor, &mut data, 100.0).unwrap();
        assert_eq!(processor.calls("filter"), 1);
    }
}
