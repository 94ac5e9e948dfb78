//! Maxwell filter stage.

use super::cached::Upstream;
use super::{LoadOptions, RawPipe};
use crate::core::RawSignal;
use crate::errors::Result;
use tracing::debug;

/// Options of a Maxwell filter stage.
///
/// The filter excludes bad channels from the expansion, so its cache is
/// invalidated when the bad channels change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaxwellParams {
    /// Options passed through to the Maxwell filter routine.
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl MaxwellParams {
    /// Creates Maxwell filter parameters.
    #[must_use]
    pub fn new(options: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { options }
    }

    pub(crate) fn make(&self, up: &Upstream<'_>, subject: &str, session: &str) -> Result<RawSignal> {
        let raw = up.parent.load(subject, session, LoadOptions::default())?;
        debug!(stage = up.name, subject, session, bads = ?raw.info.bads, "Computing Maxwell filter");
        Ok(up.ctx.processor.maxwell_filter(&raw, &self.options)?)
    }

    pub(crate) fn dict_entries(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        out.insert("kwargs".into(), serde_json::Value::Object(self.options.clone()));
    }
}
