//! Operator-confirmed cleanup of decomposition files after definition changes.

use super::diff::PipelineDiff;
use crate::config::PipelineConfig;
use crate::core::DiffStatus;
use crate::errors::{RawflowError, Result};
use crate::stages::ica_path;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// One answer the operator may give.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    /// The answer as typed.
    pub command: &'static str,
    /// What the answer does.
    pub help: &'static str,
}

/// The answers offered for stale decomposition files.
pub const RESOLUTIONS: [Choice; 3] = [
    Choice {
        command: "abort",
        help: "abort to fix the raw definition and try again",
    },
    Choice {
        command: "delete",
        help: "delete the invalid files",
    },
    Choice {
        command: "ignore",
        help: "pretend that the files are valid; you will not be warned again",
    },
];

/// Asks the operator a question.
#[cfg_attr(test, mockall::automock)]
pub trait Confirm {
    /// Presents `question` with `choices` and returns the chosen command.
    ///
    /// # Errors
    ///
    /// Returns an error if no answer can be obtained.
    fn ask(&self, question: &str, choices: &[Choice]) -> Result<String>;
}

/// [`Confirm`] on standard input and output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn ask(&self, question: &str, choices: &[Choice]) -> Result<String> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        writeln!(stdout, "{question}")?;
        for choice in choices {
            writeln!(stdout, "  {:<8} {}", choice.command, choice.help)?;
        }
        loop {
            write!(stdout, "> ")?;
            stdout.flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Err(RawflowError::Aborted("no answer on standard input".into()));
            }
            let answer = line.trim();
            if choices.iter().any(|c| c.command == answer) {
                return Ok(answer.to_string());
            }
            writeln!(stdout, "Please answer one of: {}", commands(choices))?;
        }
    }
}

fn commands(choices: &[Choice]) -> String {
    choices.iter().map(|c| c.command).collect::<Vec<_>>().join(", ")
}

/// What [`reconcile_ica_files`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Files that were removed.
    pub deleted: Vec<PathBuf>,
    /// ICA stages whose files were kept on the operator's request.
    pub ignored: Vec<String>,
}

fn status_message(name: &str, status: DiffStatus) -> Result<String> {
    match status {
        DiffStatus::New => Ok(format!(
            "The definition for raw={name:?} has been added, but ICA-files already exist. \
             These files might not correspond to the new settings and should probably be deleted."
        )),
        DiffStatus::Removed => Ok(format!(
            "The definition for raw={name:?} has been removed. \
             The corresponding ICA files should probably be deleted."
        )),
        DiffStatus::Changed => Ok(format!(
            "The definition for raw={name:?} has changed. \
             The corresponding ICA files should probably be deleted."
        )),
        DiffStatus::Good => Err(RawflowError::Internal(format!("status={status} for raw={name:?}"))),
    }
}

/// Asks the operator what to do with decomposition files of changed ICA
/// stages.
///
/// Stages without existing files for any of `subjects` are skipped
/// silently.
///
/// # Errors
///
/// Returns [`RawflowError::Aborted`] if the operator aborts,
/// [`RawflowError::Internal`] for an unknown answer, and IO errors from
/// deleting files.
pub fn reconcile_ica_files(
    diff: &PipelineDiff,
    config: &PipelineConfig,
    subjects: &[String],
    prompt: &dyn Confirm,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();
    for (name, status) in &diff.decompositions {
        let files: Vec<PathBuf> = subjects
            .iter()
            .map(|subject| ica_path(config, name, subject))
            .filter(|path| path.exists())
            .collect();
        if files.is_empty() {
            continue;
        }

        let question = format!("{} Delete {} files?", status_message(name, *status)?, files.len());
        let answer = prompt.ask(&question, &RESOLUTIONS)?;
        match answer.as_str() {
            "abort" => {
                return Err(RawflowError::Aborted(format!(
                    "User abort; fix the definition of raw={name:?} and try again"
                )));
            }
            "delete" => {
                for path in &files {
                    std::fs::remove_file(path)?;
                }
                info!(stage = %name, n_files = files.len(), "Deleted ICA files");
                report.deleted.extend(files);
            }
            "ignore" => {
                warn!(stage = %name, %status, "Keeping ICA files of changed definition");
                report.ignored.push(name.clone());
            }
            other => {
                return Err(RawflowError::Internal(format!(
                    "command={other:?}, expected one of {}",
                    commands(&RESOLUTIONS)
                )));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::{always, function};
    use std::collections::BTreeMap;

    struct Fixture {
        _dir: tempfile::TempDir,
        config: PipelineConfig,
        subjects: Vec<String>,
        diff: PipelineDiff,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path());
        let subjects = vec!["R01".to_string(), "R02".to_string(), "R03".to_string()];
        for subject in &subjects[..2] {
            let path = ica_path(&config, "ica", subject);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "{}").unwrap();
        }
        let diff = PipelineDiff {
            stages: BTreeMap::from([
                ("raw".to_string(), DiffStatus::Good),
                ("ica".to_string(), DiffStatus::Changed),
                ("old-ica".to_string(), DiffStatus::Removed),
            ]),
            decompositions: BTreeMap::from([
                ("ica".to_string(), DiffStatus::Changed),
                ("old-ica".to_string(), DiffStatus::Removed),
            ]),
        };
        Fixture {
            _dir: dir,
            config,
            subjects,
            diff,
        }
    }

    fn answering(answer: &'static str) -> MockConfirm {
        let mut prompt = MockConfirm::new();
        prompt
            .expect_ask()
            .with(
                function(|q: &str| q.contains("raw=\"ica\" has changed") && q.contains("Delete 2 files?")),
                always(),
            )
            .times(1)
            .returning(move |_, _| Ok(answer.to_string()));
        prompt
    }

    #[test]
    fn test_delete_removes_files() {
        let f = fixture();
        let report = reconcile_ica_files(&f.diff, &f.config, &f.subjects, &answering("delete")).unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert!(report.deleted.iter().all(|p| !p.exists()));
    }

    #[test]
    fn test_ignore_keeps_files() {
        let f = fixture();
        let report = reconcile_ica_files(&f.diff, &f.config, &f.subjects, &answering("ignore")).unwrap();
        assert_eq!(report.ignored, vec!["ica"]);
        assert!(ica_path(&f.config, "ica", "R01").exists());
    }

    #[test]
    fn test_abort_stops() {
        let f = fixture();
        let err = reconcile_ica_files(&f.diff, &f.config, &f.subjects, &answering("abort")).unwrap_err();
        assert!(matches!(err, RawflowError::Aborted(_)));
        assert!(ica_path(&f.config, "ica", "R01").exists());
    }

    #[test]
    fn test_unknown_answer_is_internal_error() {
        let f = fixture();
        let err = reconcile_ica_files(&f.diff, &f.config, &f.subjects, &answering("maybe")).unwrap_err();
        assert!(matches!(err, RawflowError::Internal(_)));
    }

    #[test]
    fn test_stages_without_files_are_not_asked() {
        let f = fixture();
        let mut prompt = MockConfirm::new();
        prompt.expect_ask().never();
        let report = reconcile_ica_files(&f.diff, &f.config, &["R03".to_string()], &prompt).unwrap();
        assert_eq!(report, ReconcileReport::default());
    }

    #[test]
    fn test_status_messages() {
        assert!(status_message("ica", DiffStatus::New).unwrap().contains("has been added"));
        assert!(status_message("ica", DiffStatus::Removed).unwrap().contains("has been removed"));
        assert!(status_message("ica", DiffStatus::Good).is_err());
    }
}
