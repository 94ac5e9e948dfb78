//! Change detection between two pipeline snapshots.
//!
//! A stage is `new` or `removed` if it exists in only one snapshot and
//! `changed` if its parameters differ. Every other stage inherits the
//! status of its parent, so a change propagates down the tree. The raw
//! source is externally managed and always counts as `good`.

use super::definition::Snapshot;
use crate::core::{DiffStatus, StageType};
use crate::errors::{RawflowError, Result};
use crate::stages::SOURCE_NAME;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Result of [`compare_pipelines`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDiff {
    /// Status of every stage found in either snapshot.
    pub stages: BTreeMap<String, DiffStatus>,
    /// Non-good statuses of ICA stages, whose decomposition files may be stale.
    pub decompositions: BTreeMap<String, DiffStatus>,
}

impl PipelineDiff {
    /// Stages whose cached files may be invalid.
    #[must_use]
    pub fn bad_stages(&self) -> BTreeMap<&str, DiffStatus> {
        self.stages
            .iter()
            .filter(|(_, status)| status.is_bad())
            .map(|(name, status)| (name.as_str(), *status))
            .collect()
    }

    /// Whether nothing changed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.stages.values().all(|status| !status.is_bad())
    }
}

fn stage_type(entry: &serde_json::Value) -> Option<&str> {
    entry.get("type").and_then(serde_json::Value::as_str)
}

/// Compares the snapshot of the previous run with the current one.
///
/// # Errors
///
/// Returns [`RawflowError::Internal`] if a stage's parent chain never
/// reaches a stage with a known status, which cannot happen for snapshots
/// of assembled pipelines.
pub fn compare_pipelines(old: &Snapshot, new: &Snapshot) -> Result<PipelineDiff> {
    let mut out: BTreeMap<String, DiffStatus> = BTreeMap::new();
    for name in new.keys().filter(|k| !old.contains_key(*k)) {
        out.insert(name.clone(), DiffStatus::New);
    }
    for name in old.keys().filter(|k| !new.contains_key(*k)) {
        out.insert(name.clone(), DiffStatus::Removed);
    }

    let mut to_check: BTreeSet<&str> = BTreeSet::new();
    for (name, params) in new {
        if out.contains_key(name) {
            continue;
        }
        if name == SOURCE_NAME {
            // raw input is managed outside the pipeline
            out.insert(name.clone(), DiffStatus::Good);
        } else if old.get(name) == Some(params) {
            to_check.insert(name.as_str());
        } else {
            debug!(stage = %name, old = ?old.get(name), new = %params, "Raw changed");
            out.insert(name.clone(), DiffStatus::Changed);
        }
    }

    // secondary changes
    while !to_check.is_empty() {
        let before = to_check.len();
        let resolved: Vec<(&str, DiffStatus)> = to_check
            .iter()
            .filter_map(|name| {
                let parent = new[*name].get("source").and_then(serde_json::Value::as_str)?;
                out.get(parent).map(|status| (*name, *status))
            })
            .collect();
        for (name, status) in resolved {
            out.insert(name.to_string(), status);
            to_check.remove(name);
        }
        if to_check.len() == before {
            return Err(RawflowError::Internal(format!(
                "Queue not decreasing: cannot resolve parents of {}",
                to_check.iter().copied().collect::<Vec<_>>().join(", ")
            )));
        }
    }

    let decompositions = out
        .iter()
        .filter(|(_, status)| status.is_bad())
        .filter(|(name, _)| {
            new.get(*name)
                .or_else(|| old.get(*name))
                .and_then(stage_type)
                .is_some_and(|t| t == StageType::RawIca.tag())
        })
        .map(|(name, status)| (name.clone(), *status))
        .collect();

    Ok(PipelineDiff {
        stages: out,
        decompositions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw() -> serde_json::Value {
        json!({"type": "RawSource", "name": "raw"})
    }

    fn filter(name: &str, source: &str, l: f64) -> serde_json::Value {
        json!({"type": "RawFilter", "name": name, "source": source, "args": [l, 40.0], "kwargs": {}})
    }

    fn ica(name: &str, source: &str) -> serde_json::Value {
        json!({"type": "RawICA", "name": name, "source": source, "session": ["words"], "kwargs": {}})
    }

    fn snapshot(entries: Vec<(&str, serde_json::Value)>) -> Snapshot {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn statuses(diff: &PipelineDiff) -> Vec<(&str, DiffStatus)> {
        diff.stages.iter().map(|(k, v)| (k.as_str(), *v)).collect()
    }

    #[test]
    fn test_identical_snapshots_are_clean() {
        let snap = snapshot(vec![("raw", raw()), ("1-40", filter("1-40", "raw", 1.0)), ("ica", ica("ica", "1-40"))]);
        let diff = compare_pipelines(&snap, &snap).unwrap();
        assert!(diff.is_clean());
        assert!(diff.decompositions.is_empty());
        assert_eq!(diff.stages.len(), 3);
    }

    #[test]
    fn test_change_propagates_to_descendants() {
        let old = snapshot(vec![("raw", raw()), ("1-40", filter("1-40", "raw", 1.0)), ("ica", ica("ica", "1-40"))]);
        let new = snapshot(vec![("raw", raw()), ("1-40", filter("1-40", "raw", 0.5)), ("ica", ica("ica", "1-40"))]);
        let diff = compare_pipelines(&old, &new).unwrap();
        assert_eq!(
            statuses(&diff),
            vec![("1-40", DiffStatus::Changed), ("ica", DiffStatus::Changed), ("raw", DiffStatus::Good)]
        );
        assert_eq!(diff.decompositions, BTreeMap::from([("ica".to_string(), DiffStatus::Changed)]));
    }

    #[test]
    fn test_new_and_removed_stages() {
        let old = snapshot(vec![("raw", raw()), ("a", filter("a", "raw", 1.0)), ("ica-a", ica("ica-a", "a"))]);
        let new = snapshot(vec![("raw", raw()), ("b", filter("b", "raw", 1.0)), ("ica-b", ica("ica-b", "b"))]);
        let diff = compare_pipelines(&old, &new).unwrap();
        assert_eq!(
            diff.bad_stages(),
            BTreeMap::from([
                ("a", DiffStatus::Removed),
                ("b", DiffStatus::New),
                ("ica-a", DiffStatus::Removed),
                ("ica-b", DiffStatus::New),
            ])
        );
        assert_eq!(diff.decompositions.len(), 2);
    }

    #[test]
    fn test_unchanged_child_of_new_parent_is_new() {
        // "ica" keeps its own parameters but its parent was re-created
        let old = snapshot(vec![("raw", raw()), ("ica", ica("ica", "hp"))]);
        let new = snapshot(vec![("raw", raw()), ("hp", filter("hp", "raw", 1.0)), ("ica", ica("ica", "hp"))]);
        let diff = compare_pipelines(&old, &new).unwrap();
        assert_eq!(diff.stages["ica"], DiffStatus::New);
        assert_eq!(diff.decompositions["ica"], DiffStatus::New);
    }

    #[test]
    fn test_raw_parameters_are_not_diffed() {
        let old = snapshot(vec![("raw", raw())]);
        let new = snapshot(vec![("raw", json!({"type": "RawSource", "name": "raw", "montage": "standard_1020"}))]);
        let diff = compare_pipelines(&old, &new).unwrap();
        assert_eq!(diff.stages["raw"], DiffStatus::Good);
    }

    #[test]
    fn test_unresolvable_parent_is_internal_error() {
        let snap = snapshot(vec![("a", filter("a", "b", 1.0)), ("b", filter("b", "a", 1.0))]);
        let err = compare_pipelines(&snap, &snap).unwrap_err();
        assert!(matches!(err, RawflowError::Internal(_)));
    }
}
