//! Handoff state between the pre-chroot and post-chroot stages.
//!
//! The only state persisted across the two stages is a handful of plain
//! text files, one value per file, inside the new root so they are visible
//! both from the live ISO and from inside the chroot:
//!
//! - `target-disk`: path of the selected target disk (all machines)
//! - `efi-partition`: path of the Linux EFI partition (dual-boot only)
//! - `luks-partition`: path of the LUKS partition (dual-boot only)

use crate::error::{Result, SetupError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// State directory relative to the (new) root filesystem.
pub const STATE_DIR: &str = "var/lib/archsetup";

const TARGET_DISK: &str = "target-disk";
const EFI_PARTITION: &str = "efi-partition";
const LUKS_PARTITION: &str = "luks-partition";

/// A directory of single-value handoff files.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// State directory under an arbitrary root (used by tests).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// State directory inside a mounted new root, e.g. `/mnt`.
    pub fn inside_root(mount_point: &Path) -> Self {
        Self::new(mount_point.join(STATE_DIR))
    }

    /// State directory as seen from inside the chroot.
    pub fn in_chroot() -> Self {
        Self::new(Path::new("/").join(STATE_DIR))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn write_value(&self, name: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        debug!("recording {} = {}", name, value);
        fs::write(&path, format!("{}\n", value))?;
        Ok(())
    }

    fn read_value(&self, name: &str) -> Result<String> {
        let path = self.root.join(name);
        let raw = fs::read_to_string(&path).map_err(|_| {
            SetupError::state(format!(
                "missing state file {}, did the pre-chroot stage run?",
                path.display()
            ))
        })?;
        let value = raw.trim();
        if value.is_empty() {
            return Err(SetupError::state(format!(
                "state file {} is empty",
                path.display()
            )));
        }
        Ok(value.to_string())
    }

    pub fn set_target_disk(&self, disk: &Path) -> Result<()> {
        self.write_value(TARGET_DISK, &disk.display().to_string())
    }

    pub fn target_disk(&self) -> Result<PathBuf> {
        self.read_value(TARGET_DISK).map(PathBuf::from)
    }

    pub fn set_efi_partition(&self, device: &Path) -> Result<()> {
        self.write_value(EFI_PARTITION, &device.display().to_string())
    }

    pub fn efi_partition(&self) -> Result<PathBuf> {
        self.read_value(EFI_PARTITION).map(PathBuf::from)
    }

    pub fn set_luks_partition(&self, device: &Path) -> Result<()> {
        self.write_value(LUKS_PARTITION, &device.display().to_string())
    }

    pub fn luks_partition(&self) -> Result<PathBuf> {
        self.read_value(LUKS_PARTITION).map(PathBuf::from)
    }
}
