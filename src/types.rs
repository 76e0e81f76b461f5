//! Type-safe configuration types for archsetup
//!
//! Machine profiles, filesystems and disk layouts as proper Rust enums with
//! compile-time validation and exhaustive matching instead of bare strings.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the fixed machine profiles this tool knows how to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Machine {
    /// Matthias' notebook: full-disk encrypted, KDE desktop
    NbMatthias,
    /// Nee's notebook: full-disk encrypted, GNOME desktop
    NbNee,
    /// Home desktop: full-disk encrypted, KDE desktop
    Pc,
    /// Work notebook: dual-boot alongside Windows, KDE desktop
    NbWsMss,
    /// Work desktop: full-disk encrypted, minimal
    WsPc,
}

/// Boot firmware mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum BootMode {
    #[default]
    #[strum(serialize = "UEFI")]
    Uefi,
    #[strum(serialize = "BIOS")]
    Bios,
}

/// Filesystem type for formatted partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Filesystem {
    #[default]
    #[strum(serialize = "ext4")]
    Ext4,
    /// FAT32 for the EFI System Partition
    #[strum(serialize = "fat32")]
    Fat32,
}

impl Filesystem {
    /// The mkfs program that creates this filesystem.
    pub fn mkfs_program(&self) -> &'static str {
        match self {
            Filesystem::Ext4 => "mkfs.ext4",
            Filesystem::Fat32 => "mkfs.fat",
        }
    }
}

/// How the target disk is carved up for a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum DiskLayout {
    /// Whole disk: GPT with EFI System Partition + LUKS2 container
    /// holding an LVM volume group (swap + root).
    FullDiskEncrypted,
    /// Shrink and move the Windows NTFS partition to free half the disk,
    /// then create the Linux EFI + LUKS partitions in the freed space.
    DualBootWindows,
}

impl DiskLayout {
    /// Whether this layout shares the disk with an existing Windows install.
    pub fn preserves_windows(&self) -> bool {
        matches!(self, DiskLayout::DualBootWindows)
    }
}

/// Desktop environment installed by the post-chroot stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Desktop {
    /// No GUI, base system only
    #[default]
    Minimal,
    Kde,
    Gnome,
}
