//! Stages that transform their parent's output and memoize it on disk.

use super::elliptic::EllipticParams;
use super::filter::FilterParams;
use super::ica::{self, IcaParams};
use super::maxwell::MaxwellParams;
use super::reference::ReReferenceParams;
use super::{mark_bad_channels, CacheState, Connectivity, LoadOptions, RawPipe};
use crate::context::PipelineContext;
use crate::core::{DataKind, Decomposition, RawSignal, SignalInfo, StageType};
use crate::errors::{InvalidParameter, Result};
use crate::io::{file_mtime, latest, PathTemplate};
use crate::observability::ProvenanceLog;
use ndarray::Array2;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info};

/// The operation a [`CachedPipe`] applies to its parent's output.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// FIR band-pass filter.
    Filter(FilterParams),
    /// Elliptic IIR filter.
    Elliptic(EllipticParams),
    /// ICA artifact removal.
    Ica(IcaParams),
    /// Maxwell filter.
    Maxwell(MaxwellParams),
    /// EEG re-referencing.
    ReReference(ReReferenceParams),
}

impl Transform {
    /// The snapshot type tag of stages applying this transform.
    #[must_use]
    pub const fn stage_type(&self) -> StageType {
        match self {
            Self::Filter(_) => StageType::RawFilter,
            Self::Elliptic(_) => StageType::RawFilterElliptic,
            Self::Ica(_) => StageType::RawIca,
            Self::Maxwell(_) => StageType::RawMaxwell,
            Self::ReReference(_) => StageType::RawReReference,
        }
    }

    /// Whether outputs are written to disk unless overridden.
    #[must_use]
    pub const fn caches_by_default(&self) -> bool {
        !matches!(self, Self::ReReference(_))
    }

    /// Whether a change in bad channels invalidates cached outputs.
    #[must_use]
    pub const fn bad_chs_affect_cache(&self) -> bool {
        matches!(self, Self::Maxwell(_))
    }

    pub(crate) fn dict_entries(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        match self {
            Self::Filter(p) => p.dict_entries(out),
            Self::Elliptic(p) => p.dict_entries(out),
            Self::Ica(p) => p.dict_entries(out),
            Self::Maxwell(p) => p.dict_entries(out),
            Self::ReReference(p) => p.dict_entries(out),
        }
    }
}

/// Snapshot entry shared by linked stages and unlinked definitions.
pub(crate) fn cached_dict(
    name: &str,
    source: &str,
    transform: &Transform,
    cache: bool,
) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    out.insert("type".into(), serde_json::json!(transform.stage_type().tag()));
    out.insert("name".into(), serde_json::json!(name));
    out.insert("source".into(), serde_json::json!(source));
    transform.dict_entries(&mut out);
    if cache != transform.caches_by_default() {
        out.insert("cache".into(), serde_json::json!(cache));
    }
    serde_json::Value::Object(out)
}

/// What a transform sees of the stage it runs in.
pub(crate) struct Upstream<'a> {
    pub name: &'a str,
    pub parent: &'a dyn RawPipe,
    pub ctx: &'a PipelineContext,
}

/// A linked intermediate stage.
#[derive(Debug)]
pub struct CachedPipe {
    name: String,
    parent: Arc<dyn RawPipe>,
    transform: Transform,
    cache_enabled: bool,
    path: PathTemplate,
    ctx: Arc<PipelineContext>,
}

impl CachedPipe {
    /// Links a stage below `parent`.
    ///
    /// `cache` overrides the transform's default caching behaviour.
    #[must_use]
    pub fn new(
        name: &str,
        parent: Arc<dyn RawPipe>,
        transform: Transform,
        cache: Option<bool>,
        ctx: Arc<PipelineContext>,
    ) -> Self {
        let path = PathTemplate::new(ctx.config.cache_path.clone()).partial(&[("raw", name)]);
        Self {
            name: name.to_string(),
            cache_enabled: cache.unwrap_or_else(|| transform.caches_by_default()),
            parent,
            transform,
            path,
            ctx,
        }
    }

    /// The parent stage.
    #[must_use]
    pub fn parent(&self) -> &Arc<dyn RawPipe> {
        &self.parent
    }

    /// The transform applied by this stage.
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Whether outputs are written to disk.
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    fn upstream(&self) -> Upstream<'_> {
        Upstream {
            name: &self.name,
            parent: self.parent.as_ref(),
            ctx: &self.ctx,
        }
    }

    fn make(&self, subject: &str, session: &str) -> Result<RawSignal> {
        let up = self.upstream();
        match &self.transform {
            Transform::Filter(p) => p.make(&up, subject, session),
            Transform::Elliptic(p) => p.make(&up, subject, session),
            Transform::Ica(p) => p.make(&up, subject, session),
            Transform::Maxwell(p) => p.make(&up, subject, session),
            Transform::ReReference(p) => p.make(&up, subject, session),
        }
    }

    fn ica_params(&self) -> Result<&IcaParams> {
        match &self.transform {
            Transform::Ica(params) => Ok(params),
            other => Err(InvalidParameter::new(
                "raw",
                format!("{} {:?} is not an ICA stage", other.stage_type(), self.name),
            )
            .into()),
        }
    }

    /// Location of this ICA stage's per-subject artifact.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] unless the stage applies ICA.
    pub fn ica_path(&self, subject: &str) -> Result<PathBuf> {
        self.ica_params()?;
        Ok(ica::ica_path(&self.ctx.config, &self.name, subject))
    }

    /// Fits (or confirms) the ICA decomposition of one subject.
    ///
    /// This is the only operation that writes decomposition artifacts;
    /// ordinary loading never fits.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] unless the stage applies ICA, and any
    /// error from loading the training sessions or fitting.
    pub fn make_ica(&self, subject: &str) -> Result<PathBuf> {
        self.ica_params()?.make_ica(&self.upstream(), subject)
    }

    /// Reads the ICA decomposition of one subject.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] unless the stage applies ICA, and
    /// [`crate::errors::MissingInputFile`] if it was not fitted yet.
    pub fn load_ica(&self, subject: &str) -> Result<Decomposition> {
        self.ica_params()?;
        ica::load_ica(&self.upstream(), subject)
    }

    /// Applies this stage's filter to already loaded data, `[channels, times]`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] for stages that are not filters.
    pub fn filter_data(&self, data: &mut Array2<f64>, sfreq: f64) -> Result<()> {
        let processor = self.ctx.processor.as_ref();
        match &self.transform {
            Transform::Filter(p) => p.filter_data(processor, data, sfreq),
            Transform::Elliptic(p) => p.filter_data(processor, data, sfreq),
            other => Err(InvalidParameter::new(
                "raw",
                format!("{} {:?} does not filter", other.stage_type(), self.name),
            )
            .into()),
        }
    }

    fn is_fresh(&self, path: &std::path::Path, subject: &str, session: &str) -> bool {
        let inputs = self.mtime(subject, session, self.transform.bad_chs_affect_cache());
        matches!((file_mtime(path), inputs), (Some(cached), Some(inputs)) if cached >= inputs)
    }
}

impl RawPipe for CachedPipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage_type(&self) -> StageType {
        self.transform.stage_type()
    }

    fn source_name(&self) -> Option<&str> {
        Some(self.parent.name())
    }

    fn as_dict(&self) -> serde_json::Value {
        cached_dict(&self.name, self.parent.name(), &self.transform, self.cache_enabled)
    }

    fn path(&self, subject: &str, session: &str) -> PathBuf {
        self.ctx.format(&self.path, subject, session)
    }

    fn cache(&self, subject: &str, session: &str) -> Result<CacheState> {
        if !self.cache_enabled {
            return Ok(CacheState::Computed(self.make(subject, session)?));
        }
        let path = self.path(subject, session);
        if self.is_fresh(&path, subject, session) {
            debug!(stage = %self.name, subject, session, "Cache is up to date");
            return Ok(CacheState::Current(path));
        }

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let started = Instant::now();
        let raw = self.make(subject, session)?;
        self.ctx.store.write(&path, &raw)?;
        ProvenanceLog::new(&self.as_dict(), self.ctx.processor.as_ref(), started.elapsed())
            .write(&path.with_extension("log"))?;
        info!(
            stage = %self.name,
            subject,
            session,
            path = %path.display(),
            "Cached raw"
        );
        Ok(CacheState::Computed(raw))
    }

    fn load(&self, subject: &str, session: &str, options: LoadOptions) -> Result<RawSignal> {
        let raw = match self.cache(subject, session)? {
            CacheState::Computed(raw) => raw,
            CacheState::Current(path) => self.ctx.store.read(&path, options.preload)?,
        };
        mark_bad_channels(self, raw, subject, session, options.include_bad_channels)
    }

    fn mtime(&self, subject: &str, session: &str, bad_chs: bool) -> Option<SystemTime> {
        let inputs = self.parent.mtime(subject, session, bad_chs);
        match &self.transform {
            // the output depends on the bad channels of every training session
            Transform::Ica(params) => params.sessions.iter().fold(
                latest(inputs, file_mtime(&ica::ica_path(&self.ctx.config, &self.name, subject))),
                |mtime, training| latest(mtime, self.parent.mtime(subject, training, true)),
            ),
            _ => inputs,
        }
    }

    fn get_connectivity(&self, data: DataKind) -> Option<Connectivity> {
        self.parent.get_connectivity(data)
    }

    fn get_sysname(&self, info: &SignalInfo, subject: &str, data: DataKind) -> Result<Option<String>> {
        self.parent.get_sysname(info, subject, data)
    }

    fn load_bad_channels(&self, subject: &str, session: &str) -> Result<Vec<String>> {
        match &self.transform {
            Transform::Ica(params) => params.load_bad_channels(self.parent.as_ref(), subject),
            _ => self.parent.load_bad_channels(subject, session),
        }
    }

    fn make_bad_channels(&self, subject: &str, session: &str, bad_chs: &[String], redo: bool) -> Result<()> {
        self.parent.make_bad_channels(subject, session, bad_chs, redo)
    }

    fn make_bad_channels_auto(&self, subject: &str, session: &str, flat: Option<f64>, redo: bool) -> Result<()> {
        self.parent.make_bad_channels_auto(subject, session, flat, redo)
    }

    fn as_cached(&self) -> Option<&CachedPipe> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::errors::RawflowError;
    use crate::processing::Reference;
    use crate::stages::{SourceParams, SourcePipe};
    use crate::testing::{synthetic_signal, write_recording, CountingProcessor};
    use approx::assert_abs_diff_eq;

    struct Fixture {
        _dir: tempfile::TempDir,
        processor: Arc<CountingProcessor>,
        source: Arc<dyn RawPipe>,
        ctx: Arc<PipelineContext>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let processor = Arc::new(CountingProcessor::new());
        let ctx = Arc::new(PipelineContext::new(
            PipelineConfig::new(dir.path()).with_sessions(["words"]),
            processor.clone(),
        ));
        let source: Arc<dyn RawPipe> =
            Arc::new(SourcePipe::new("raw", SourceParams::default(), ctx.clone()).unwrap());
        write_recording(&source.path("R01", "words"), &synthetic_signal(&["C1", "C2"], 40));
        Fixture {
            _dir: dir,
            processor,
            source,
            ctx,
        }
    }

    fn filter_stage(f: &Fixture) -> CachedPipe {
        let params = FilterParams::new(Some(1.0), Some(40.0)).unwrap();
        CachedPipe::new("1-40", f.source.clone(), Transform::Filter(params), None, f.ctx.clone())
    }

    #[test]
    fn test_cache_is_idempotent() {
        let f = fixture();
        let stage = filter_stage(&f);

        assert!(stage.cache("R01", "words").unwrap().is_computed());
        assert!(!stage.cache("R01", "words").unwrap().is_computed());
        assert_eq!(f.processor.calls("filter"), 1);

        let path = stage.path("R01", "words");
        assert!(path.exists());
        assert!(path.with_extension("log").exists());
    }

    #[test]
    fn test_load_reads_cache_and_marks_bads() {
        let f = fixture();
        let stage = filter_stage(&f);
        f.source
            .make_bad_channels("R01", "words", &["C2".to_string()], false)
            .unwrap();

        let first = stage.load("R01", "words", LoadOptions::default()).unwrap();
        let second = stage.load("R01", "words", LoadOptions::default()).unwrap();
        assert_eq!(first.data.dim(), second.data.dim());
        for (a, b) in first.data.iter().zip(second.data.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
        assert_eq!(second.info.bads, vec!["C2"]);
        assert_eq!(f.processor.calls("filter"), 1);
    }

    #[test]
    fn test_uncached_stage_never_writes() {
        let f = fixture();
        let stage = CachedPipe::new(
            "reref",
            f.source.clone(),
            Transform::ReReference(ReReferenceParams::new(Reference::Average)),
            None,
            f.ctx.clone(),
        );
        assert!(!stage.cache_enabled());
        stage.load("R01", "words", LoadOptions::default()).unwrap();
        assert!(stage.cache("R01", "words").unwrap().is_computed());
        assert!(!stage.path("R01", "words").exists());
    }

    #[test]
    fn test_cache_override_in_dict() {
        let f = fixture();
        let params = FilterParams::new(None, Some(40.0)).unwrap();
        let stage = CachedPipe::new("lp", f.source.clone(), Transform::Filter(params), Some(false), f.ctx.clone());
        assert_eq!(stage.as_dict()["cache"], serde_json::json!(false));
        assert!(filter_stage(&f).as_dict().get("cache").is_none());
    }

    #[test]
    fn test_missing_raw_propagates() {
        let f = fixture();
        let stage = filter_stage(&f);
        let err = stage.cache("R02", "words").unwrap_err();
        assert!(matches!(err, RawflowError::MissingInputFile(_)));
        assert!(stage.mtime("R02", "words", false).is_none());
    }

    #[test]
    fn test_non_filter_rejects_filter_data() {
        let f = fixture();
        let stage = CachedPipe::new(
            "mf",
            f.source.clone(),
            Transform::Maxwell(MaxwellParams::default()),
            None,
            f.ctx.clone(),
        );
        let mut data = Array2::zeros((1, 4));
        assert!(stage.filter_data(&mut data, 100.0).is_err());
        assert!(stage.make_ica("R01").is_err());
    }
}
