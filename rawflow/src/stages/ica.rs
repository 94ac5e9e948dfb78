//! ICA artifact-removal stage.
//!
//! The decomposition is fitted once per subject across the training
//! sessions and stored next to the raw data. Fitting is an explicit step
//! ([`super::CachedPipe::make_ica`]): components need human review, so
//! loading never fits on its own and fails if no decomposition exists.
//!
//! A decomposition is only valid for the channel set it was fitted on, and
//! that set changes with the bad channels. The stage's mtime therefore
//! includes the bad-channel files of all training sessions, so a cached
//! output is recomputed and the stale decomposition reported after any of
//! them changes.

use super::cached::Upstream;
use super::{LoadOptions, RawPipe};
use crate::config::PipelineConfig;
use crate::core::{Decomposition, RawSignal};
use crate::errors::{InvalidParameter, MissingInputFile, RawflowError, Result, StaleArtifact};
use crate::io::PathTemplate;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// Training sessions and fit options of an ICA stage.
#[derive(Debug, Clone, PartialEq)]
pub struct IcaParams {
    /// Sessions concatenated for fitting, in order.
    pub sessions: Vec<String>,
    /// Options passed to the fit routine.
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl IcaParams {
    /// Creates ICA parameters.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] if no training session is given.
    pub fn new(sessions: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let sessions: Vec<String> = sessions.into_iter().map(Into::into).collect();
        if sessions.is_empty() {
            return Err(InvalidParameter::new("session", "ICA needs at least one training session").into());
        }
        Ok(Self {
            sessions,
            options: serde_json::Map::new(),
        })
    }

    /// Sets options for the fit routine.
    #[must_use]
    pub fn with_options(mut self, options: serde_json::Map<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    /// Fit options with defaults applied.
    ///
    /// Unless given, `max_iter` is 256 and epochs are rejected above
    /// 5 pT (mag), 500 pT/m (grad) and 300 µV (eeg).
    #[must_use]
    pub fn fit_options(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut options = serde_json::Map::new();
        options.insert("max_iter".into(), serde_json::json!(256));
        options.insert(
            "reject".into(),
            serde_json::json!({"mag": 5e-12, "grad": 5e-10, "eeg": 3e-4}),
        );
        options.extend(self.options.clone());
        options
    }

    /// Sorted union of the bad channels of all training sessions.
    pub(crate) fn load_bad_channels(&self, parent: &dyn RawPipe, subject: &str) -> Result<Vec<String>> {
        let mut bad_chs = BTreeSet::new();
        for session in &self.sessions {
            bad_chs.extend(parent.load_bad_channels(subject, session)?);
        }
        Ok(bad_chs.into_iter().collect())
    }

    pub(crate) fn make_ica(&self, up: &Upstream<'_>, subject: &str) -> Result<PathBuf> {
        let path = ica_path(&up.ctx.config, up.name, subject);
        let bad_chs = self.load_bad_channels(up.parent, subject)?;
        let unmarked = LoadOptions::default().without_bad_channels();

        let (first, rest) = self
            .sessions
            .split_first()
            .ok_or_else(|| RawflowError::Internal(format!("ICA {:?} has no sessions", up.name)))?;
        let mut raw = up.parent.load(subject, first, unmarked)?;
        raw.info.bads.clone_from(&bad_chs);

        if path.exists() {
            let ica = up.ctx.store.read_decomposition(&path)?;
            if ica.matches_channels(&raw) {
                debug!(stage = up.name, subject, "ICA is up to date");
                return Ok(path);
            }
            info!(stage = up.name, subject, "ICA outdated due to change in bad channels");
        }

        for session in rest {
            let next = up.parent.load(subject, session, unmarked)?;
            raw.append(&next)?;
        }

        debug!(stage = up.name, subject, sessions = ?self.sessions, "Computing ICA decomposition");
        let ica = up.ctx.processor.fit_ica(&raw, &self.fit_options())?;
        if !ica.matches_channels(&raw) {
            return Err(RawflowError::Internal(format!(
                "ICA fitted on {:?}, expected good channels {:?}",
                ica.ch_names,
                raw.good_data_channels()
            )));
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        up.ctx.store.write_decomposition(&path, &ica)?;
        info!(stage = up.name, subject, path = %path.display(), "Saved ICA");
        Ok(path)
    }

    pub(crate) fn make(&self, up: &Upstream<'_>, subject: &str, session: &str) -> Result<RawSignal> {
        let mut raw = up.parent.load(subject, session, LoadOptions::default().preloaded())?;
        raw.info.bads = self.load_bad_channels(up.parent, subject)?;
        let ica = load_ica(up, subject)?;
        if !ica.matches_channels(&raw) {
            return Err(StaleArtifact {
                stage: up.name.to_string(),
                subject: subject.to_string(),
                current: raw.good_data_channels(),
                fitted: ica.ch_names,
            }
            .into());
        }
        debug!(stage = up.name, subject, session, "Applying ICA");
        up.ctx.processor.apply_ica(&ica, &mut raw)?;
        Ok(raw)
    }

    pub(crate) fn dict_entries(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        out.insert("session".into(), serde_json::json!(self.sessions));
        out.insert("kwargs".into(), serde_json::Value::Object(self.options.clone()));
    }
}

/// Location of the decomposition of ICA stage `name` for one subject.
#[must_use]
pub fn ica_path(config: &PipelineConfig, name: &str, subject: &str) -> PathBuf {
    let root = config.root.to_string_lossy();
    PathTemplate::new(config.raw_dir.clone())
        .join(&config.ica_file)
        .format(&[("root", &root), ("subject", subject), ("raw", name)])
}

pub(crate) fn load_ica(up: &Upstream<'_>, subject: &str) -> Result<Decomposition> {
    let path = ica_path(&up.ctx.config, up.name, subject);
    if !path.exists() {
        return Err(MissingInputFile::new(
            path,
            format!(
                "ICA file does not exist for raw={:?}, subject={subject:?}. \
                 Run make_ica() to create it.",
                up.name
            ),
        )
        .into());
    }
    up.ctx.store.read_decomposition(&path)
}
