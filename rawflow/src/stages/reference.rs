//! EEG re-referencing stage.

use super::cached::Upstream;
use super::{LoadOptions, RawPipe};
use crate::core::RawSignal;
use crate::errors::Result;
use crate::processing::{apply_reference, Reference};
use tracing::debug;

/// Parameters of a re-referencing stage; not cached unless overridden.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReReferenceParams {
    /// The new reference.
    pub reference: Reference,
}

impl ReReferenceParams {
    /// Creates re-referencing parameters.
    #[must_use]
    pub fn new(reference: Reference) -> Self {
        Self { reference }
    }

    pub(crate) fn make(&self, up: &Upstream<'_>, subject: &str, session: &str) -> Result<RawSignal> {
        let mut raw = up.parent.load(subject, session, LoadOptions::default().preloaded())?;
        debug!(stage = up.name, subject, session, reference = ?self.reference, "Re-referencing raw");
        apply_reference(&mut raw, &self.reference)?;
        Ok(raw)
    }

    pub(crate) fn dict_entries(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        out.insert("reference".into(), self.reference.to_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_entries() {
        let mut out = serde_json::Map::new();
        ReReferenceParams::default().dict_entries(&mut out);
        assert_eq!(out["reference"], "average");

        let params = ReReferenceParams::new(Reference::Channels(vec!["A1".into(), "A2".into()]));
        params.dict_entries(&mut out);
        assert_eq!(out["reference"], serde_json::json!(["A1", "A2"]));
    }
}
