//! Deterministic collaborators for testing.

use crate::core::{Decomposition, RawSignal};
use crate::errors::{RawflowError, Result};
use crate::pipeline::{Choice, Confirm};
use crate::processing::{EllipticDesign, SignalProcessor, SosFilter};
use anyhow::bail;
use ndarray::{array, Array1, Array2, ArrayView1};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

type Options = serde_json::Map<String, serde_json::Value>;

/// A signal processor with trivial numerics that records every call.
///
/// `filter` removes the mean of each row, elliptic filters and ICA are
/// identities and `maxwell_filter` returns a copy.
#[derive(Debug, Default)]
pub struct CountingProcessor {
    calls: Mutex<HashMap<String, usize>>,
    last_fit_samples: Mutex<Option<usize>>,
    fail: Option<String>,
}

impl CountingProcessor {
    /// Creates a new processor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a processor whose `operation` always fails.
    #[must_use]
    pub fn failing(operation: impl Into<String>) -> Self {
        Self {
            fail: Some(operation.into()),
            ..Self::default()
        }
    }

    /// Returns how often `operation` was called.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().get(operation).copied().unwrap_or(0)
    }

    /// Returns the number of samples the last ICA was fitted on.
    #[must_use]
    pub fn last_fit_samples(&self) -> Option<usize> {
        *self.last_fit_samples.lock()
    }

    fn record(&self, operation: &str) -> anyhow::Result<()> {
        *self.calls.lock().entry(operation.to_string()).or_default() += 1;
        if self.fail.as_deref() == Some(operation) {
            bail!("{operation} failed");
        }
        Ok(())
    }
}

impl SignalProcessor for CountingProcessor {
    fn name(&self) -> &str {
        "counting"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn filter(
        &self,
        data: &mut Array2<f64>,
        _sfreq: f64,
        _l_freq: Option<f64>,
        _h_freq: Option<f64>,
        _options: &Options,
    ) -> anyhow::Result<()> {
        self.record("filter")?;
        for mut row in data.rows_mut() {
            let mean = row.mean().unwrap_or(0.0);
            row.mapv_inplace(|v| v - mean);
        }
        Ok(())
    }

    fn elliptic_sos(&self, _design: &EllipticDesign) -> anyhow::Result<SosFilter> {
        self.record("elliptic_sos")?;
        Ok(array![[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]])
    }

    fn sosfilt(&self, _sos: &SosFilter, x: ArrayView1<'_, f64>) -> anyhow::Result<Array1<f64>> {
        self.record("sosfilt")?;
        Ok(x.to_owned())
    }

    fn fit_ica(&self, raw: &RawSignal, options: &Options) -> anyhow::Result<Decomposition> {
        self.record("fit_ica")?;
        *self.last_fit_samples.lock() = Some(raw.n_times());
        let ch_names = raw.good_data_channels();
        let n = ch_names.len();
        Ok(Decomposition {
            ch_names,
            n_components: n,
            mixing: Array2::eye(n),
            unmixing: Array2::eye(n),
            exclude: Vec::new(),
            options: options.clone(),
        })
    }

    fn apply_ica(&self, _ica: &Decomposition, _raw: &mut RawSignal) -> anyhow::Result<()> {
        self.record("apply_ica")
    }

    fn maxwell_filter(&self, raw: &RawSignal, _options: &Options) -> anyhow::Result<RawSignal> {
        self.record("maxwell_filter")?;
        Ok(raw.clone())
    }

    fn set_montage(&self, _raw: &mut RawSignal, _montage: &str) -> anyhow::Result<()> {
        self.record("set_montage")
    }
}

/// A prompt that replays a fixed list of answers.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    /// Creates a prompt giving `answers` in order.
    #[must_use]
    pub fn new(answers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far.
    #[must_use]
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().clone()
    }
}

impl Confirm for ScriptedPrompt {
    fn ask(&self, question: &str, _choices: &[Choice]) -> Result<String> {
        self.questions.lock().push(question.to_string());
        self.answers
            .lock()
            .pop_front()
            .ok_or_else(|| RawflowError::Aborted("no scripted answer left".into()))
    }
}
