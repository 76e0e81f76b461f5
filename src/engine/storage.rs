//! Storage plan generation and execution.
//!
//! Translates a machine's disk layout into an ordered sequence of atomic
//! `StorageOp` operations, then maps each operation to exactly one system
//! utility invocation.
//!
//! # Design
//!
//! - **Pure planning**: plan generation does no I/O; `command_for` renders
//!   an operation to `(program, args)` without executing anything
//! - **Ordered**: zap before partition, LuksFormat before LuksOpen,
//!   PV before VG before LV, root mounted before `/boot`
//! - **Fail-fast execution**: the first failing command aborts the stage;
//!   there is no rollback (an opened LUKS container stays open)

use crate::hardware::partition_path;
use crate::runner::{self, is_dry_run};
use crate::types::Filesystem;
use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// LVM volume group holding swap and root.
pub const VG_NAME: &str = "vg0";
/// Device-mapper name of the opened LUKS container.
pub const MAPPER_NAME: &str = "cryptlvm";
/// Size of the EFI System Partition in MiB.
pub const ESP_MIB: u64 = 512;
/// Where the new root is assembled during the pre-chroot stage.
pub const MOUNT_POINT: &str = "/mnt";

/// GPT typecode for an EFI System Partition.
pub const TYPE_EFI: &str = "EF00";
/// GPT typecode for a Linux LUKS partition.
pub const TYPE_LUKS: &str = "8309";
/// GPT typecode for Microsoft basic data (NTFS).
pub const TYPE_NTFS: &str = "0700";

/// A partition boundary in sgdisk's `-n` syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionBound {
    /// `0`: first free sector (as start) or end of the largest free block
    /// (as end).
    Default,
    /// An absolute sector number.
    Sector(u64),
    /// `+<n>M`: relative size in MiB (only meaningful as an end bound).
    RelativeMib(u64),
}

impl fmt::Display for PartitionBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "0"),
            Self::Sector(s) => write!(f, "{}", s),
            Self::RelativeMib(m) => write!(f, "+{}M", m),
        }
    }
}

/// A single atomic storage operation.
///
/// Each variant maps to exactly one external command; see [`command_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// Destroy the partition table and all signatures (`sgdisk --zap-all`)
    ZapDisk { disk: PathBuf },
    /// Write a fresh empty GPT (`sgdisk -o`)
    NewTable { disk: PathBuf },
    /// Create one partition entry (`sgdisk -n/-t/-c`)
    AddPartition {
        disk: PathBuf,
        number: u32,
        first: PartitionBound,
        last: PartitionBound,
        typecode: String,
        label: String,
    },
    /// Delete one partition entry (`sgdisk -d`)
    DeletePartition { disk: PathBuf, number: u32 },
    /// Shrink an NTFS filesystem to a byte size (`ntfsresize`)
    ResizeNtfs { device: PathBuf, new_size_bytes: u64 },
    /// Re-read the partition table (`partprobe`)
    Partprobe { disk: PathBuf },
    /// Wait for device nodes to appear (`udevadm settle`)
    UdevSettle,
    /// Create a LUKS2 container, prompting for the passphrase
    LuksFormat { device: PathBuf },
    /// Open a LUKS container under `/dev/mapper/<name>`
    LuksOpen { device: PathBuf, mapper_name: String },
    /// Create an LVM physical volume
    CreatePv { device: PathBuf },
    /// Create an LVM volume group
    CreateVg { name: String, device: PathBuf },
    /// Create an LVM logical volume (`size` in lvcreate syntax,
    /// e.g. `8G` or `100%FREE`)
    CreateLv { vg: String, name: String, size: String },
    /// Create a filesystem
    MakeFilesystem {
        device: PathBuf,
        filesystem: Filesystem,
        label: String,
    },
    /// Initialize a swap area (`mkswap`)
    MakeSwap { device: PathBuf },
    /// Mount a device
    Mount { device: PathBuf, target: PathBuf },
    /// Activate swap (`swapon`)
    EnableSwap { device: PathBuf },
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZapDisk { disk } => write!(f, "ZapDisk({})", disk.display()),
            Self::NewTable { disk } => write!(f, "NewTable({})", disk.display()),
            Self::AddPartition {
                disk,
                number,
                first,
                last,
                typecode,
                label,
            } => write!(
                f,
                "AddPartition({} #{} {}..{} type={} label={})",
                disk.display(),
                number,
                first,
                last,
                typecode,
                label
            ),
            Self::DeletePartition { disk, number } => {
                write!(f, "DeletePartition({} #{})", disk.display(), number)
            }
            Self::ResizeNtfs {
                device,
                new_size_bytes,
            } => write!(f, "ResizeNtfs({}, {} bytes)", device.display(), new_size_bytes),
            Self::Partprobe { disk } => write!(f, "Partprobe({})", disk.display()),
            Self::UdevSettle => write!(f, "UdevSettle"),
            Self::LuksFormat { device } => write!(f, "LuksFormat({})", device.display()),
            Self::LuksOpen { device, mapper_name } => {
                write!(f, "LuksOpen({} -> /dev/mapper/{})", device.display(), mapper_name)
            }
            Self::CreatePv { device } => write!(f, "CreatePv({})", device.display()),
            Self::CreateVg { name, device } => {
                write!(f, "CreateVg({} on {})", name, device.display())
            }
            Self::CreateLv { vg, name, size } => write!(f, "CreateLv({}/{}, {})", vg, name, size),
            Self::MakeFilesystem {
                device,
                filesystem,
                label,
            } => write!(f, "MakeFilesystem({}, {}, {})", device.display(), filesystem, label),
            Self::MakeSwap { device } => write!(f, "MakeSwap({})", device.display()),
            Self::Mount { device, target } => {
                write!(f, "Mount({} -> {})", device.display(), target.display())
            }
            Self::EnableSwap { device } => write!(f, "EnableSwap({})", device.display()),
        }
    }
}

/// A complete storage plan: an ordered list of operations.
#[derive(Debug, Clone)]
pub struct StoragePlan {
    pub ops: Vec<StorageOp>,
    pub disk: PathBuf,
}

impl StoragePlan {
    /// Whether this plan contains destructive operations.
    pub fn is_destructive(&self) -> bool {
        self.ops.iter().any(|op| {
            matches!(
                op,
                StorageOp::ZapDisk { .. }
                    | StorageOp::NewTable { .. }
                    | StorageOp::DeletePartition { .. }
                    | StorageOp::ResizeNtfs { .. }
                    | StorageOp::LuksFormat { .. }
                    | StorageOp::MakeFilesystem { .. }
                    | StorageOp::MakeSwap { .. }
            )
        })
    }

    /// Human-readable summary for logging and the `plan` subcommand.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Storage plan for {}:", self.disk.display()),
            format!("  Operations ({}):", self.ops.len()),
        ];
        for (i, op) in self.ops.iter().enumerate() {
            lines.push(format!("    {}. {}", i + 1, op));
        }
        lines.join("\n")
    }
}

/// The full-disk encrypted layout: GPT with a 512 MiB ESP and the rest a
/// LUKS2 container holding VG `vg0` with LVs `swap` and `root`.
pub fn full_disk_plan(disk: &Path, swap_gib: u32) -> StoragePlan {
    let esp = partition_path(disk, 1);
    let luks = partition_path(disk, 2);

    let mut ops = vec![
        StorageOp::ZapDisk { disk: disk.to_path_buf() },
        StorageOp::NewTable { disk: disk.to_path_buf() },
        StorageOp::AddPartition {
            disk: disk.to_path_buf(),
            number: 1,
            first: PartitionBound::Default,
            last: PartitionBound::RelativeMib(ESP_MIB),
            typecode: TYPE_EFI.to_string(),
            label: "EFI".to_string(),
        },
        StorageOp::AddPartition {
            disk: disk.to_path_buf(),
            number: 2,
            first: PartitionBound::Default,
            last: PartitionBound::Default,
            typecode: TYPE_LUKS.to_string(),
            label: MAPPER_NAME.to_string(),
        },
        StorageOp::Partprobe { disk: disk.to_path_buf() },
        StorageOp::UdevSettle,
    ];
    ops.extend(encrypted_system_ops(&esp, &luks, swap_gib));

    StoragePlan {
        ops,
        disk: disk.to_path_buf(),
    }
}

/// The LUKS/LVM/filesystem/mount tail shared by both layouts, operating on
/// an already-created LUKS partition.
pub fn encrypted_system_ops(esp: &Path, luks: &Path, swap_gib: u32) -> Vec<StorageOp> {
    let mapper = PathBuf::from(format!("/dev/mapper/{}", MAPPER_NAME));
    let lv_swap = PathBuf::from(format!("/dev/{}/swap", VG_NAME));
    let lv_root = PathBuf::from(format!("/dev/{}/root", VG_NAME));
    let mount_point = PathBuf::from(MOUNT_POINT);

    vec![
        StorageOp::LuksFormat { device: luks.to_path_buf() },
        StorageOp::LuksOpen {
            device: luks.to_path_buf(),
            mapper_name: MAPPER_NAME.to_string(),
        },
        StorageOp::CreatePv { device: mapper.clone() },
        StorageOp::CreateVg {
            name: VG_NAME.to_string(),
            device: mapper,
        },
        StorageOp::CreateLv {
            vg: VG_NAME.to_string(),
            name: "swap".to_string(),
            size: format!("{}G", swap_gib),
        },
        StorageOp::CreateLv {
            vg: VG_NAME.to_string(),
            name: "root".to_string(),
            size: "100%FREE".to_string(),
        },
        StorageOp::MakeFilesystem {
            device: esp.to_path_buf(),
            filesystem: Filesystem::Fat32,
            label: "EFI".to_string(),
        },
        StorageOp::MakeSwap { device: lv_swap.clone() },
        StorageOp::MakeFilesystem {
            device: lv_root.clone(),
            filesystem: Filesystem::Ext4,
            label: "root".to_string(),
        },
        StorageOp::Mount {
            device: lv_root,
            target: mount_point.clone(),
        },
        StorageOp::Mount {
            device: esp.to_path_buf(),
            target: mount_point.join("boot"),
        },
        StorageOp::EnableSwap { device: lv_swap },
    ]
}

/// Render an operation to the exact command it executes.
pub fn command_for(op: &StorageOp) -> (String, Vec<String>) {
    match op {
        StorageOp::ZapDisk { disk } => (
            "sgdisk".into(),
            vec!["--zap-all".into(), disk.display().to_string()],
        ),
        StorageOp::NewTable { disk } => ("sgdisk".into(), vec!["-o".into(), disk.display().to_string()]),
        StorageOp::AddPartition {
            disk,
            number,
            first,
            last,
            typecode,
            label,
        } => (
            "sgdisk".into(),
            vec![
                "-n".into(),
                format!("{}:{}:{}", number, first, last),
                "-t".into(),
                format!("{}:{}", number, typecode),
                "-c".into(),
                format!("{}:{}", number, label),
                disk.display().to_string(),
            ],
        ),
        StorageOp::DeletePartition { disk, number } => (
            "sgdisk".into(),
            vec!["-d".into(), number.to_string(), disk.display().to_string()],
        ),
        StorageOp::ResizeNtfs {
            device,
            new_size_bytes,
        } => (
            "ntfsresize".into(),
            vec![
                "--force".into(),
                "--size".into(),
                new_size_bytes.to_string(),
                device.display().to_string(),
            ],
        ),
        StorageOp::Partprobe { disk } => ("partprobe".into(), vec![disk.display().to_string()]),
        StorageOp::UdevSettle => ("udevadm".into(), vec!["settle".into()]),
        StorageOp::LuksFormat { device } => (
            "cryptsetup".into(),
            vec![
                "luksFormat".into(),
                "--type".into(),
                "luks2".into(),
                device.display().to_string(),
            ],
        ),
        StorageOp::LuksOpen { device, mapper_name } => (
            "cryptsetup".into(),
            vec!["open".into(), device.display().to_string(), mapper_name.clone()],
        ),
        StorageOp::CreatePv { device } => ("pvcreate".into(), vec![device.display().to_string()]),
        StorageOp::CreateVg { name, device } => (
            "vgcreate".into(),
            vec![name.clone(), device.display().to_string()],
        ),
        StorageOp::CreateLv { vg, name, size } => {
            let size_flag = if size.contains('%') { "-l" } else { "-L" };
            (
                "lvcreate".into(),
                vec![
                    size_flag.into(),
                    size.clone(),
                    "-n".into(),
                    name.clone(),
                    vg.clone(),
                ],
            )
        }
        StorageOp::MakeFilesystem {
            device,
            filesystem,
            label,
        } => match filesystem {
            Filesystem::Ext4 => (
                "mkfs.ext4".into(),
                vec!["-L".into(), label.clone(), device.display().to_string()],
            ),
            Filesystem::Fat32 => (
                "mkfs.fat".into(),
                vec![
                    "-F32".into(),
                    "-n".into(),
                    label.clone(),
                    device.display().to_string(),
                ],
            ),
        },
        StorageOp::MakeSwap { device } => (
            "mkswap".into(),
            vec!["-L".into(), "swap".into(), device.display().to_string()],
        ),
        StorageOp::Mount { device, target } => (
            "mount".into(),
            vec![device.display().to_string(), target.display().to_string()],
        ),
        StorageOp::EnableSwap { device } => ("swapon".into(), vec![device.display().to_string()]),
    }
}

/// Execute a plan in order, failing fast on the first error.
pub fn execute_plan(plan: &StoragePlan) -> Result<()> {
    for op in &plan.ops {
        // Mount targets must exist before mount(8) is called
        if let StorageOp::Mount { target, .. } = op {
            if !is_dry_run() {
                fs::create_dir_all(target)
                    .with_context(|| format!("creating mount point {}", target.display()))?;
            }
        }
        let (program, args) = command_for(op);
        runner::run(&op.to_string(), &program, &args)
            .with_context(|| format!("storage operation {} failed", op))?;
    }
    Ok(())
}
