//! Companion `.log` files for cached recordings.

use crate::errors::Result;
use crate::processing::SignalProcessor;
use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

/// How a cache file was produced.
///
/// The digest covers the compact JSON of the stage definition. It is for
/// humans comparing logs; cache freshness only ever looks at mtimes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceLog {
    /// When the file was written.
    pub created: DateTime<Local>,
    /// Processor name and version.
    pub processor: String,
    /// Pretty-printed stage definition.
    pub definition: String,
    /// SHA-256 of the compact definition, hex encoded.
    pub digest: String,
    /// Time spent computing the stage.
    pub duration: Duration,
}

impl ProvenanceLog {
    /// Records a stage computed just now.
    #[must_use]
    pub fn new(definition: &serde_json::Value, processor: &dyn SignalProcessor, duration: Duration) -> Self {
        Self {
            created: Local::now(),
            processor: format!("{} {}", processor.name(), processor.version()),
            definition: format!("{definition:#}"),
            digest: hex::encode(Sha256::digest(definition.to_string().as_bytes())),
            duration,
        }
    }

    /// The log text.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "Created: {}\nBy: {} {}\nProcessor: {}\nDuration: {:.3} s\nDefinition SHA-256: {}\nDefinition:\n{}\n",
            self.created.to_rfc3339(),
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.processor,
            self.duration.as_secs_f64(),
            self.digest,
            self.definition,
        )
    }

    /// Writes the log text to `path`.
    ///
    /// # Errors
    ///
    /// Returns IO errors.
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingProcessor;
    use serde_json::json;

    #[test]
    fn test_render_lists_provenance() {
        let definition = json!({"type": "RawFilter", "name": "1-40", "source": "raw"});
        let log = ProvenanceLog::new(&definition, &CountingProcessor::new(), Duration::from_millis(1500));
        let text = log.render();
        assert!(text.contains("By: rawflow "));
        assert!(text.contains("Processor: counting "));
        assert!(text.contains("Duration: 1.500 s"));
        assert!(text.contains("\"type\": \"RawFilter\""));
        assert_eq!(log.digest.len(), 64);
        assert!(text.contains(&format!("Definition SHA-256: {}\n", log.digest)));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_digest_depends_on_definition_only() {
        let processor = CountingProcessor::new();
        let a = ProvenanceLog::new(&json!({"args": [1.0, 40.0]}), &processor, Duration::ZERO);
        let b = ProvenanceLog::new(&json!({"args": [1.0, 40.0]}), &processor, Duration::from_secs(3));
        let c = ProvenanceLog::new(&json!({"args": [0.5, 40.0]}), &processor, Duration::ZERO);
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
    }

    #[test]
    fn test_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("R01 words 1-40-raw.log");
        ProvenanceLog::new(&json!({}), &CountingProcessor::new(), Duration::ZERO)
            .write(&path)
            .unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("Created: "));
    }
}
