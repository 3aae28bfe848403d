//! Incremental state file handling and stamp materialization.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, info};

use tddeps_core::DepsError;

/// What happened to the state file after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateOutcome {
    /// New output is byte-identical to the state file.
    Unchanged,
    /// The state file was overwritten with the new output.
    Replaced,
    /// The action ran instead of replacing the state file.
    ActionRun {
        /// Exit code of the action, `None` if killed by a signal.
        status: Option<i32>,
    },
}

impl UpdateOutcome {
    /// Process exit code implied by this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Unchanged | Self::Replaced => 0,
            Self::ActionRun { status } => status.unwrap_or(1),
        }
    }
}

/// A state file and its temporary sibling `<STATE>.tmp`.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
    tmp: PathBuf,
}

impl StateFile {
    /// Track the state file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        Self {
            path,
            tmp: PathBuf::from(tmp),
        }
    }

    /// The state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the new output is written.
    pub fn tmp_path(&self) -> &Path {
        &self.tmp
    }

    /// Open the temporary file for writing, creating parent directories.
    pub fn create_tmp(&self) -> Result<BufWriter<File>, DepsError> {
        if let Some(parent) = self.tmp.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| DepsError::io(parent, e))?;
        }
        let file = File::create(&self.tmp).map_err(|e| DepsError::io(&self.tmp, e))?;
        Ok(BufWriter::new(file))
    }

    /// Whether the temporary output differs from the state file.
    ///
    /// A missing state file counts as changed.
    pub fn is_changed(&self) -> Result<bool, DepsError> {
        let new = fs::read(&self.tmp).map_err(|e| DepsError::io(&self.tmp, e))?;
        match fs::read(&self.path) {
            Ok(old) => Ok(old != new),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(DepsError::io(&self.path, e)),
        }
    }

    /// Compare and act: do nothing when unchanged, otherwise run `action`
    /// if given or copy the temporary output over the state file.
    pub fn commit(&self, action: &[String]) -> Result<UpdateOutcome, DepsError> {
        if !self.is_changed()? {
            info!(state = %self.path.display(), "no update");
            return Ok(UpdateOutcome::Unchanged);
        }

        if let Some((program, args)) = action.split_first() {
            info!(%program, "state changed, running action");
            let status = Command::new(program)
                .args(args)
                .status()
                .map_err(|source| DepsError::ActionSpawn {
                    program: program.clone(),
                    source,
                })?;
            return Ok(UpdateOutcome::ActionRun {
                status: status.code(),
            });
        }

        fs::copy(&self.tmp, &self.path).map_err(|e| DepsError::io(&self.path, e))?;
        info!(state = %self.path.display(), "state updated");
        Ok(UpdateOutcome::Replaced)
    }
}

/// Create or truncate every stamp file. Returns the number touched.
pub fn touch_stamps(paths: &[PathBuf]) -> Result<usize, DepsError> {
    for path in paths {
        File::create(path).map_err(|e| DepsError::io(path, e))?;
    }
    debug!(count = paths.len(), "stamps touched");
    Ok(paths.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tmp(state: &StateFile, content: &str) {
        let mut out = state.create_tmp().unwrap();
        out.write_all(content.as_bytes()).unwrap();
        out.flush().unwrap();
    }

    #[test]
    fn test_tmp_path() {
        let state = StateFile::new("/b/tddeps.cmake");
        assert_eq!(state.tmp_path(), Path::new("/b/tddeps.cmake.tmp"));
    }

    #[test]
    fn test_missing_state_is_replaced() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("deps.cmake"));
        write_tmp(&state, "set(A)\n");

        assert_eq!(state.commit(&[]).unwrap(), UpdateOutcome::Replaced);
        assert_eq!(fs::read_to_string(state.path()).unwrap(), "set(A)\n");
    }

    #[test]
    fn test_identical_output_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("deps.cmake"));
        fs::write(state.path(), "set(A)\n").unwrap();
        write_tmp(&state, "set(A)\n");

        // The action must not run when nothing changed.
        let action = vec!["false".to_string()];
        assert_eq!(state.commit(&action).unwrap(), UpdateOutcome::Unchanged);
        assert_eq!(UpdateOutcome::Unchanged.exit_code(), 0);
    }

    #[test]
    fn test_changed_output_runs_action() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("deps.cmake"));
        fs::write(state.path(), "set(A)\n").unwrap();
        write_tmp(&state, "set(B)\n");

        let marker = temp.path().join("ran");
        let action = vec!["touch".to_string(), marker.display().to_string()];
        let outcome = state.commit(&action).unwrap();
        assert_eq!(outcome, UpdateOutcome::ActionRun { status: Some(0) });
        assert!(marker.exists());
        // The action replaces the copy step.
        assert_eq!(fs::read_to_string(state.path()).unwrap(), "set(A)\n");
    }

    #[test]
    fn test_missing_action_program() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("deps.cmake"));
        write_tmp(&state, "x\n");
        let action = vec!["/nonexistent/tddeps-action".to_string()];
        let err = state.commit(&action).unwrap_err();
        assert!(matches!(err, DepsError::ActionSpawn { .. }));
    }

    #[test]
    fn test_touch_stamps() {
        let temp = TempDir::new().unwrap();
        let stamps = vec![temp.path().join("stamp-a.tmp"), temp.path().join("stamp-b.tmp")];
        assert_eq!(touch_stamps(&stamps).unwrap(), 2);
        assert!(stamps.iter().all(|p| p.exists()));
    }
}
