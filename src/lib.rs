//! archsetup library
//!
//! Core functionality for the profile-driven Arch Linux installer: machine
//! profiles, storage planning, the dual-boot geometry arithmetic and the
//! two installation stages.

pub mod cli;
pub mod config_file;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod logic;
pub mod profiles;
pub mod runner;
pub mod state;
pub mod sysfile;
pub mod types;

// Re-export the main types for convenience
pub use cli::{Cli, Commands};
pub use config_file::{ResolvedConfig, SetupOverrides};
pub use engine::dualboot::{
    dual_boot_plan, ensure_linux_half_free, find_windows_partition, shrink_geometry,
    DualBootDevices, DualBootGeometry,
};
pub use engine::storage::{
    command_for, full_disk_plan, PartitionBound, StorageOp, StoragePlan,
};
pub use error::{Result, SetupError};
pub use hardware::{parse_lsblk_disks, parse_sgdisk_print, partition_path, DiskInfo, PartitionEntry};
pub use profiles::{BASE_PACKAGES, MachineProfile};
pub use state::StateDir;
pub use types::{BootMode, Desktop, DiskLayout, Filesystem, Machine};
