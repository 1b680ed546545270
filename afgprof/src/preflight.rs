//! Pre-flight checks for afgprof
//!
//! Validates inputs before any parsing or subprocess work starts.
//! Provides clear, actionable error messages when requirements aren't met.

use anyhow::{bail, Result};
use log::warn;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::pipeline::{Backend, RunConfig};

/// Run all pre-flight checks for a run
///
/// # Errors
/// Returns an error describing the first missing input or oracle
pub fn run_preflight_checks(config: &RunConfig) -> Result<()> {
    check_input_dir(&config.input_dir)?;
    check_input_file(&config.maps_path(), "memory map snapshot")?;
    check_input_file(&config.calls_path(), "call log")?;
    check_object_dir(&config.object_dir);
    if config.backend == Backend::Addr2line {
        check_oracle_command(&config.oracle_command)?;
    }
    Ok(())
}

fn check_input_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!(
            "Profile directory not found: {}\n\n\
             Pass the directory the collector wrote `maps` and the call log into.",
            dir.display()
        );
    }
    Ok(())
}

fn check_input_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        bail!(
            "Missing {what}: {}\n\n\
             Was the profiled process shut down cleanly? For pre-aggregated logs use --format counted.",
            path.display()
        );
    }
    Ok(())
}

/// A missing object directory is not fatal: every object is skipped
fn check_object_dir(dir: &Path) {
    if !dir.is_dir() {
        warn!(
            "Object directory {} not found, addresses will not be symbolized (see --objdir)",
            dir.display()
        );
    }
}

/// Locate an executable by path or on `PATH`
#[must_use]
pub fn find_command(command: &str) -> Option<PathBuf> {
    if command.contains('/') {
        let path = PathBuf::from(command);
        return is_executable(&path).then_some(path);
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata().is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

fn check_oracle_command(command: &str) -> Result<()> {
    if find_command(command).is_none() {
        bail!(
            "{command} not found in PATH\n\n\
             Install elfutils, pass another addr2line with --addr2line, or use --backend dwarf."
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CallLogFormat;
    use std::fs;

    fn config(input_dir: &Path, backend: Backend) -> RunConfig {
        RunConfig {
            input_dir: input_dir.to_path_buf(),
            object_dir: input_dir.join("objects"),
            oracle_command: "sh".to_string(),
            concurrency: 1,
            backend,
            format: CallLogFormat::Unmapped,
            demangle: false,
        }
    }

    #[test]
    fn test_find_command_on_path() {
        assert!(find_command("sh").is_some());
        assert!(find_command("afgprof-no-such-command").is_none());
        assert!(find_command("/nonexistent/bin/addr2line").is_none());
    }

    #[test]
    fn test_missing_directory() {
        let result = run_preflight_checks(&config(Path::new("/nonexistent/profile"), Backend::Dwarf));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Profile directory not found"));
    }

    #[test]
    fn test_missing_call_log() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("maps"), "").unwrap();

        let err = run_preflight_checks(&config(dir.path(), Backend::Dwarf)).unwrap_err().to_string();
        assert!(err.contains("Missing call log"));
        assert!(err.contains("unmapped-calls"));
    }

    #[test]
    fn test_missing_oracle_only_matters_for_subprocess_backend() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("maps"), "").unwrap();
        fs::write(dir.path().join("unmapped-calls"), b"").unwrap();

        let mut cfg = config(dir.path(), Backend::Addr2line);
        assert!(run_preflight_checks(&cfg).is_ok());

        cfg.oracle_command = "afgprof-no-such-command".to_string();
        let err = run_preflight_checks(&cfg).unwrap_err().to_string();
        assert!(err.contains("not found in PATH"));

        cfg.backend = Backend::Dwarf;
        assert!(run_preflight_checks(&cfg).is_ok());
    }
}
