//! Elliptic IIR filter stage.
//!
//! The band type follows from which edges are given: only the high side
//! (`high_pass`, `high_stop`) makes a lowpass, only the low side
//! (`low_stop`, `low_pass`) a highpass, both sides a bandpass.

use super::cached::Upstream;
use super::{LoadOptions, RawPipe};
use crate::core::{ChannelKind, RawSignal};
use crate::errors::{InvalidParameter, Result};
use crate::processing::{BandType, EllipticDesign, SignalProcessor};
use ndarray::Array2;
use tracing::debug;

/// Band edges (Hz) and attenuation (dB) of an elliptic filter.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipticParams {
    /// Upper edge of the low stopband.
    pub low_stop: Option<f64>,
    /// Lower edge of the passband.
    pub low_pass: Option<f64>,
    /// Upper edge of the passband.
    pub high_pass: Option<f64>,
    /// Lower edge of the high stopband.
    pub high_stop: Option<f64>,
    /// Maximum passband loss.
    pub gpass: f64,
    /// Minimum stopband attenuation.
    pub gstop: f64,
}

fn invalid(message: impl Into<String>) -> crate::errors::RawflowError {
    InvalidParameter::new("elliptic filter", message).into()
}

impl EllipticParams {
    /// Creates elliptic filter parameters.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] for edge combinations that describe no
    /// band, a pass edge without its stop edge (or vice versa), and
    /// non-positive attenuation values.
    pub fn new(
        low_stop: Option<f64>,
        low_pass: Option<f64>,
        high_pass: Option<f64>,
        high_stop: Option<f64>,
        gpass: f64,
        gstop: f64,
    ) -> Result<Self> {
        if high_stop.is_none() {
            if low_stop.is_none() {
                return Err(invalid("at least one of low_stop and high_stop is required"));
            }
            if high_pass.is_some() {
                return Err(invalid("high_pass requires high_stop"));
            }
        } else if high_pass.is_none() {
            return Err(invalid("high_stop requires high_pass"));
        }
        if low_stop.is_none() {
            if low_pass.is_some() {
                return Err(invalid("low_pass requires low_stop"));
            }
        } else if low_pass.is_none() {
            return Err(invalid("low_stop requires low_pass"));
        }
        if !(gpass > 0.0 && gstop > gpass) {
            return Err(invalid(format!("gpass={gpass}, gstop={gstop}: need 0 < gpass < gstop")));
        }
        Ok(Self {
            low_stop,
            low_pass,
            high_pass,
            high_stop,
            gpass,
            gstop,
        })
    }

    /// The band type implied by the given edges.
    #[must_use]
    pub const fn band_type(&self) -> BandType {
        if self.low_stop.is_none() {
            BandType::Lowpass
        } else if self.high_stop.is_none() {
            BandType::Highpass
        } else {
            BandType::Bandpass
        }
    }

    /// Design requirements at sampling rate `sfreq`, edges normalized to Nyquist.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] if an edge lies at or above Nyquist.
    pub fn design(&self, sfreq: f64) -> Result<EllipticDesign> {
        let nyq = sfreq / 2.0;
        let norm = |edge: Option<f64>| -> Result<Vec<f64>> {
            match edge {
                Some(f) if f <= 0.0 || f >= nyq => {
                    Err(invalid(format!("edge {f} Hz outside (0, {nyq}) Hz")))
                }
                Some(f) => Ok(vec![f / nyq]),
                None => Ok(Vec::new()),
            }
        };
        let btype = self.band_type();
        let (wp, ws) = match btype {
            BandType::Lowpass => (norm(self.high_pass)?, norm(self.high_stop)?),
            BandType::Highpass => (norm(self.low_pass)?, norm(self.low_stop)?),
            BandType::Bandpass => (
                [norm(self.low_pass)?, norm(self.high_pass)?].concat(),
                [norm(self.low_stop)?, norm(self.high_stop)?].concat(),
            ),
        };
        Ok(EllipticDesign {
            btype,
            wp,
            ws,
            gpass: self.gpass,
            gstop: self.gstop,
        })
    }

    /// Filters every row of already loaded data, `[channels, times]`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] for edges beyond Nyquist and
    /// [`crate::errors::RawflowError::Processor`] if design or filtering fails.
    pub fn filter_data(&self, processor: &dyn SignalProcessor, data: &mut Array2<f64>, sfreq: f64) -> Result<()> {
        let sos = processor.elliptic_sos(&self.design(sfreq)?)?;
        for mut row in data.rows_mut() {
            let filtered = processor.sosfilt(&sos, row.view())?;
            row.assign(&filtered);
        }
        Ok(())
    }

    pub(crate) fn make(&self, up: &Upstream<'_>, subject: &str, session: &str) -> Result<RawSignal> {
        let mut raw = up.parent.load(subject, session, LoadOptions::default().preloaded())?;
        debug!(stage = up.name, subject, session, btype = %self.band_type(), "Filtering raw");

        let processor = up.ctx.processor.as_ref();
        let sos = processor.elliptic_sos(&self.design(raw.info.sfreq)?)?;
        for idx in raw.picks(|kind| matches!(kind, ChannelKind::Eeg | ChannelKind::RefMeg), false) {
            let filtered = processor.sosfilt(&sos, raw.data.row(idx))?;
            raw.data.row_mut(idx).assign(&filtered);
        }

        if let Some(high) = self.high_pass {
            if raw.info.lowpass > high {
                raw.info.lowpass = high;
            }
        }
        if let Some(low) = self.low_pass {
            if raw.info.highpass < low {
                raw.info.highpass = low;
            }
        }
        Ok(raw)
    }

    pub(crate) fn dict_entries(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        out.insert(
            "args".into(),
            serde_json::json!([
                self.low_stop,
                self.low_pass,
                self.high_pass,
                self.high_stop,
                self.gpass,
                self.gstop
            ]),
        );
    }
}
