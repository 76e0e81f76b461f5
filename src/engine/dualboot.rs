//! Windows dual-boot geometry: shrink the NTFS partition to the first half
//! of the disk and carve the Linux EFI + LUKS partitions out of the second
//! half.
//!
//! The arithmetic is pure and unit-tested; the destructive work is expressed
//! as ordinary [`StorageOp`]s. The resize is one-shot: abort-on-failure, no
//! rollback, no idempotence. An aborted run leaves the disk in whatever
//! state the last completed command produced.

use crate::engine::storage::{
    encrypted_system_ops, ESP_MIB, PartitionBound, StorageOp, StoragePlan, TYPE_EFI, TYPE_LUKS,
    TYPE_NTFS,
};
use crate::hardware::{partition_path, PartitionEntry};
use anyhow::{bail, ensure, Result};
use std::path::{Path, PathBuf};

/// GPT partitions are aligned on 1 MiB boundaries (2048 sectors at 512 b).
pub const ALIGNMENT_SECTORS: u64 = 2048;

/// The GPT backup header and table occupy the last 33 sectors; the last
/// usable sector is therefore `total - 34`.
const GPT_RESERVED_TAIL: u64 = 34;

/// Refuse to shrink NTFS below this many bytes: a Windows install that
/// small is a sign we misidentified the partition.
const MIN_NTFS_BYTES: u64 = 16 << 30;

/// Resolved sector geometry for the dual-boot conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualBootGeometry {
    /// Logical sector size in bytes
    pub sector_size: u64,
    /// Partition number of the Windows NTFS partition (kept)
    pub ntfs_number: u32,
    /// First sector of the NTFS partition (unchanged)
    pub ntfs_first: u64,
    /// New last sector of the NTFS partition after the shrink
    pub ntfs_last: u64,
    /// New NTFS filesystem size in bytes (what ntfsresize receives)
    pub ntfs_bytes: u64,
    /// Partition number for the new Linux EFI partition
    pub efi_number: u32,
    pub efi_first: u64,
    pub efi_last: u64,
    /// Partition number for the new LUKS partition
    pub luks_number: u32,
    pub luks_first: u64,
    pub luks_last: u64,
}

fn align_up(sector: u64, alignment: u64) -> u64 {
    sector.div_ceil(alignment) * alignment
}

/// Pick the Windows NTFS partition out of a GPT: the last partition with
/// typecode 0700 (Windows keeps its recovery partition behind the data
/// partition on some layouts; the data partition is the largest).
pub fn find_windows_partition(table: &[PartitionEntry]) -> Option<&PartitionEntry> {
    table
        .iter()
        .filter(|p| p.typecode == TYPE_NTFS)
        .max_by_key(|p| p.last_sector - p.first_sector)
}

/// Compute the shrink/move geometry so that Linux gets exactly the second
/// half of the disk, 1 MiB aligned.
///
/// # Errors
///
/// Fails when the NTFS partition does not start in the first half of the
/// disk, when the shrunk filesystem would be implausibly small, or when the
/// freed space cannot hold the EFI + LUKS partitions.
pub fn shrink_geometry(
    sector_size: u64,
    total_sectors: u64,
    ntfs: &PartitionEntry,
    next_free_number: u32,
) -> Result<DualBootGeometry> {
    ensure!(sector_size > 0, "sector size must be non-zero");
    ensure!(
        total_sectors > GPT_RESERVED_TAIL,
        "disk too small for a GPT"
    );

    // Linux owns everything from the aligned midpoint to the last usable
    // sector.
    let linux_first = align_up(total_sectors / 2, ALIGNMENT_SECTORS);
    let last_usable = total_sectors - GPT_RESERVED_TAIL;

    if ntfs.first_sector >= linux_first {
        bail!(
            "NTFS partition #{} starts at sector {}, not in the first half of the disk",
            ntfs.number,
            ntfs.first_sector
        );
    }
    if ntfs.last_sector <= linux_first {
        bail!(
            "NTFS partition #{} already ends at sector {}, nothing to shrink",
            ntfs.number,
            ntfs.last_sector
        );
    }

    let ntfs_last = linux_first - 1;
    let ntfs_bytes = (ntfs_last - ntfs.first_sector + 1) * sector_size;
    if ntfs_bytes < MIN_NTFS_BYTES {
        bail!(
            "shrunk NTFS would be only {} bytes, refusing: partition #{} is probably not the Windows data partition",
            ntfs_bytes,
            ntfs.number
        );
    }

    let esp_sectors = ESP_MIB * 1024 * 1024 / sector_size;
    let efi_first = linux_first;
    let efi_last = efi_first + esp_sectors - 1;

    let luks_first = align_up(efi_last + 1, ALIGNMENT_SECTORS);
    let luks_last = last_usable;
    ensure!(
        luks_last > luks_first + esp_sectors,
        "freed space too small to hold the Linux system"
    );

    Ok(DualBootGeometry {
        sector_size,
        ntfs_number: ntfs.number,
        ntfs_first: ntfs.first_sector,
        ntfs_last,
        ntfs_bytes,
        efi_number: next_free_number,
        efi_first,
        efi_last,
        luks_number: next_free_number + 1,
        luks_first,
        luks_last,
    })
}

/// Verify that no partition other than the NTFS one being shrunk occupies
/// the sector range the geometry hands to Linux.
///
/// OEM layouts often keep a recovery partition behind the data partition at
/// the disk tail. Repartitioning over it would fail only after the NTFS
/// filesystem had already been shrunk and its entry rewritten, so this is
/// checked before any destructive operation runs.
pub fn ensure_linux_half_free(
    table: &[PartitionEntry],
    geometry: &DualBootGeometry,
) -> Result<()> {
    for part in table {
        if part.number == geometry.ntfs_number {
            continue;
        }
        if part.first_sector <= geometry.luks_last && part.last_sector >= geometry.efi_first {
            bail!(
                "partition #{} ({}) occupies sectors {}..{}, inside the area planned for Linux ({}..{})",
                part.number,
                part.name,
                part.first_sector,
                part.last_sector,
                geometry.efi_first,
                geometry.luks_last
            );
        }
    }
    Ok(())
}

/// The devices a dual-boot plan creates, recorded in the handoff state for
/// the post-chroot stage.
#[derive(Debug, Clone)]
pub struct DualBootDevices {
    pub efi_partition: PathBuf,
    pub luks_partition: PathBuf,
}

/// Build the complete dual-boot storage plan from a resolved geometry:
/// shrink the filesystem, rewrite the NTFS partition entry with the new
/// end, create the Linux partitions, then the usual LUKS/LVM chain.
pub fn dual_boot_plan(
    disk: &Path,
    geometry: &DualBootGeometry,
    ntfs_name: &str,
    swap_gib: u32,
) -> (StoragePlan, DualBootDevices) {
    let ntfs_device = partition_path(disk, geometry.ntfs_number);
    let efi_device = partition_path(disk, geometry.efi_number);
    let luks_device = partition_path(disk, geometry.luks_number);

    let mut ops = vec![
        StorageOp::ResizeNtfs {
            device: ntfs_device,
            new_size_bytes: geometry.ntfs_bytes,
        },
        StorageOp::DeletePartition {
            disk: disk.to_path_buf(),
            number: geometry.ntfs_number,
        },
        StorageOp::AddPartition {
            disk: disk.to_path_buf(),
            number: geometry.ntfs_number,
            first: PartitionBound::Sector(geometry.ntfs_first),
            last: PartitionBound::Sector(geometry.ntfs_last),
            typecode: TYPE_NTFS.to_string(),
            label: ntfs_name.to_string(),
        },
        StorageOp::AddPartition {
            disk: disk.to_path_buf(),
            number: geometry.efi_number,
            first: PartitionBound::Sector(geometry.efi_first),
            last: PartitionBound::Sector(geometry.efi_last),
            typecode: TYPE_EFI.to_string(),
            label: "Linux EFI".to_string(),
        },
        StorageOp::AddPartition {
            disk: disk.to_path_buf(),
            number: geometry.luks_number,
            first: PartitionBound::Sector(geometry.luks_first),
            last: PartitionBound::Sector(geometry.luks_last),
            typecode: TYPE_LUKS.to_string(),
            label: "Linux LUKS".to_string(),
        },
        StorageOp::Partprobe { disk: disk.to_path_buf() },
        StorageOp::UdevSettle,
    ];
    ops.extend(encrypted_system_ops(&efi_device, &luks_device, swap_gib));

    (
        StoragePlan {
            ops,
            disk: disk.to_path_buf(),
        },
        DualBootDevices {
            efi_partition: efi_device,
            luks_partition: luks_device,
        },
    )
}
