//! Fail-fast execution of system utilities.
//!
//! This module is the ONLY sanctioned way to invoke external commands.
//! Two modes:
//!
//! - [`run`] inherits stdio, for interactive tools (`cryptsetup luksFormat`,
//!   `passwd`) and anything whose progress output belongs on the terminal.
//!   A non-zero exit aborts the whole stage.
//! - [`output`] captures stdout for read-only queries (`lsblk`, `blockdev`,
//!   `blkid`). A non-zero exit is an error carrying the command's stderr.
//!
//! There are no retries and no compensating actions: the first failing
//! command terminates the stage, leaving whatever it had already done in
//! place (an opened LUKS container stays open).
//!
//! # Dry-run
//!
//! In dry-run mode mutating commands ([`run`]) are logged and skipped;
//! queries ([`output`]) still execute so previews stay realistic.

use crate::error::{Result, SetupError};
use std::ffi::OsStr;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

static DRY_RUN: AtomicBool = AtomicBool::new(false);

/// Enable dry-run mode for the rest of the process.
pub fn enable_dry_run() {
    DRY_RUN.store(true, Ordering::SeqCst);
}

/// Disable dry-run mode (used by tests).
pub fn disable_dry_run() {
    DRY_RUN.store(false, Ordering::SeqCst);
}

/// Whether dry-run mode is active.
pub fn is_dry_run() -> bool {
    DRY_RUN.load(Ordering::SeqCst)
}

// Tests that touch the global flag serialize on this lock, since the test
// harness runs them in parallel threads.
#[cfg(test)]
pub(crate) fn dry_run_test_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn render<I, S>(program: &str, args: I) -> (String, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<String> = args
        .into_iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect();
    let rendered = format!("{} {}", program, args.join(" "));
    (rendered, args)
}

/// Run a mutating command with inherited stdio, failing fast on non-zero exit.
///
/// `description` is the human-readable step name logged before execution.
pub fn run<I, S>(description: &str, program: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let (rendered, args) = render(program, args);

    if is_dry_run() {
        warn!("dry-run: skipping `{}` ({})", rendered, description);
        return Ok(());
    }

    info!("{}", description);
    debug!("spawning `{}`", rendered);

    let status = Command::new(program)
        .args(&args)
        .status()
        .map_err(|e| SetupError::command(format!("failed to spawn `{}`: {}", rendered, e)))?;

    if !status.success() {
        return Err(SetupError::command(format!(
            "`{}` exited with {}",
            rendered, status
        )));
    }

    Ok(())
}

/// Run a read-only query and return its stdout as a string.
///
/// Executes even in dry-run mode.
pub fn output<I, S>(program: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let (rendered, args) = render(program, args);
    debug!("querying `{}`", rendered);

    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|e| SetupError::command(format!("failed to spawn `{}`: {}", rendered, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SetupError::command(format!(
            "`{}` exited with {}: {}",
            rendered,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Verify that every required system utility is on PATH before any
/// destructive work starts.
pub fn ensure_tools(tools: &[&str]) -> Result<()> {
    for tool in tools {
        which::which(tool)
            .map_err(|_| SetupError::validation(format!("required tool `{}` not found", tool)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_flag() {
        let _guard = dry_run_test_guard();
        disable_dry_run();
        assert!(!is_dry_run());

        enable_dry_run();
        assert!(is_dry_run());
        // Would fail loudly if actually spawned
        let result = run("nonexistent step", "/nonexistent/binary", ["--flag"]);
        assert!(result.is_ok());

        disable_dry_run();
        assert!(!is_dry_run());
    }

    #[test]
    fn test_output_reports_spawn_failure() {
        let result = output("/nonexistent/binary", ["arg"]);
        assert!(result.is_err());
        let msg = result.expect_err("should fail").to_string();
        assert!(msg.contains("/nonexistent/binary"));
    }

    #[test]
    fn test_ensure_tools_missing() {
        let result = ensure_tools(&["definitely-not-a-real-tool-name"]);
        assert!(result.is_err());
    }
}
