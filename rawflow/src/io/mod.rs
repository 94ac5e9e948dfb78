//! Filesystem access: path templates, modification times and signal codecs.

mod store;
mod template;

pub use store::{JsonSignalStore, SignalStore};
pub use template::{PathFields, PathTemplate};

use std::path::Path;
use std::time::SystemTime;

/// Modification time of `path`, or `None` if it does not exist.
#[must_use]
pub fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Latest of two optional timestamps where `None` means "unknown".
///
/// Unknown wins: a chain with any missing input has no modification time.
#[must_use]
pub fn latest(a: Option<SystemTime>, b: Option<SystemTime>) -> Option<SystemTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_file_mtime_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_mtime(&dir.path().join("nope")).is_none());
        let path = dir.path().join("yes");
        std::fs::write(&path, "x").unwrap();
        assert!(file_mtime(&path).is_some());
    }

    #[test]
    fn test_latest() {
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + Duration::from_secs(5);
        assert_eq!(latest(Some(t0), Some(t1)), Some(t1));
        assert_eq!(latest(Some(t1), None), None);
        assert_eq!(latest(None, Some(t0)), None);
    }
}
