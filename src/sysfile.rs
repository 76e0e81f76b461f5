//! Dry-run-aware writes to well-known system configuration paths.
//!
//! The post-chroot stage edits files like `/etc/locale.conf` and
//! `/boot/loader/entries/arch.conf` directly. All such writes go through
//! this module so dry-run mode can log them instead of touching the system.

use crate::error::Result;
use crate::runner::is_dry_run;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write(path: &Path, contents: &str) -> Result<()> {
    if is_dry_run() {
        warn!("dry-run: would write {}", path.display());
        return Ok(());
    }
    info!("writing {}", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Append `contents` to `path`, creating the file if it does not exist.
pub fn append(path: &Path, contents: &str) -> Result<()> {
    if is_dry_run() {
        warn!("dry-run: would append to {}", path.display());
        return Ok(());
    }
    info!("appending to {}", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

/// Create a symlink at `link` pointing to `target`, replacing any existing
/// file (the behavior of `ln -sf`).
pub fn symlink_force(target: &Path, link: &Path) -> Result<()> {
    if is_dry_run() {
        warn!(
            "dry-run: would symlink {} -> {}",
            link.display(),
            target.display()
        );
        return Ok(());
    }
    info!("symlinking {} -> {}", link.display(), target.display());
    if link.symlink_metadata().is_ok() {
        fs::remove_file(link)?;
    }
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

/// Set the permission bits of `path` (e.g. 0o440 for sudoers drop-ins).
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    if is_dry_run() {
        warn!("dry-run: would chmod {:o} {}", mode, path.display());
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}
