//! Block device discovery and queries.
//!
//! Thin wrappers around `lsblk`, `blockdev`, `sgdisk -p` and `blkid` plus
//! the pure parsers for their output. Queries run even in dry-run mode so
//! previews stay realistic.

use crate::error::{Result, SetupError};
use crate::runner::output;
use crate::types::BootMode;
use nix::sys::stat::{stat, SFlag};
use std::path::{Path, PathBuf};

/// A candidate installation disk as reported by lsblk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInfo {
    /// Device path, e.g. `/dev/nvme0n1`
    pub path: PathBuf,
    /// Human-readable size, e.g. `476.9G`
    pub size: String,
}

/// One row of a GPT partition table as printed by `sgdisk -p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    pub number: u32,
    pub first_sector: u64,
    pub last_sector: u64,
    /// GPT typecode as sgdisk prints it, e.g. `0700`, `EF00`, `8309`
    pub typecode: String,
    pub name: String,
}

/// Enumerate writable whole disks (`lsblk -d`), excluding loop and rom
/// devices and read-only media.
pub fn list_candidate_disks() -> Result<Vec<DiskInfo>> {
    let raw = output("lsblk", ["-d", "-n", "-o", "NAME,SIZE,TYPE,RO"])?;
    Ok(parse_lsblk_disks(&raw))
}

/// Pure parser for `lsblk -d -n -o NAME,SIZE,TYPE,RO` output.
pub fn parse_lsblk_disks(raw: &str) -> Vec<DiskInfo> {
    raw.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [name, size, "disk", "0"] => Some(DiskInfo {
                    path: PathBuf::from(format!("/dev/{}", name)),
                    size: (*size).to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

/// Logical sector size of a disk in bytes (`blockdev --getss`).
pub fn sector_size(disk: &Path) -> Result<u64> {
    let raw = output("blockdev", ["--getss".to_string(), disk.display().to_string()])?;
    raw.trim()
        .parse()
        .map_err(|_| SetupError::command(format!("unparseable sector size: {}", raw.trim())))
}

/// Total size of a disk in bytes (`blockdev --getsize64`).
pub fn size_in_bytes(disk: &Path) -> Result<u64> {
    let raw = output(
        "blockdev",
        ["--getsize64".to_string(), disk.display().to_string()],
    )?;
    raw.trim()
        .parse()
        .map_err(|_| SetupError::command(format!("unparseable disk size: {}", raw.trim())))
}

/// Read the GPT partition table of a disk (`sgdisk -p`).
pub fn partition_table(disk: &Path) -> Result<Vec<PartitionEntry>> {
    let raw = output("sgdisk", ["-p".to_string(), disk.display().to_string()])?;
    Ok(parse_sgdisk_print(&raw))
}

/// Pure parser for the partition rows of `sgdisk -p` output.
///
/// Rows look like:
/// ```text
///    2         1050624       500118158   238.0 GiB   0700  Basic data partition
/// ```
pub fn parse_sgdisk_print(raw: &str) -> Vec<PartitionEntry> {
    raw.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }
            let number: u32 = fields[0].parse().ok()?;
            let first_sector: u64 = fields[1].parse().ok()?;
            let last_sector: u64 = fields[2].parse().ok()?;
            // fields[3..5] are the human-readable size ("238.0 GiB")
            let typecode = fields[5].to_string();
            let name = fields[6..].join(" ");
            Some(PartitionEntry {
                number,
                first_sector,
                last_sector,
                typecode,
                name,
            })
        })
        .collect()
}

/// Filesystem/LUKS UUID of a device (`blkid -s UUID -o value`).
pub fn device_uuid(device: &Path) -> Result<String> {
    let raw = output(
        "blkid",
        [
            "-s".to_string(),
            "UUID".to_string(),
            "-o".to_string(),
            "value".to_string(),
            device.display().to_string(),
        ],
    )?;
    let uuid = raw.trim();
    if uuid.is_empty() {
        return Err(SetupError::command(format!(
            "blkid reported no UUID for {}",
            device.display()
        )));
    }
    Ok(uuid.to_string())
}

/// Derive a partition device path from a disk path and partition number.
///
/// Handles both `/dev/sda` -> `/dev/sda1` and `/dev/nvme0n1` -> `/dev/nvme0n1p1`.
pub fn partition_path(disk: &Path, number: u32) -> PathBuf {
    let disk_str = disk.display().to_string();
    if disk_str.ends_with(|c: char| c.is_ascii_digit()) {
        PathBuf::from(format!("{}p{}", disk_str, number))
    } else {
        PathBuf::from(format!("{}{}", disk_str, number))
    }
}

/// Whether `path` names an existing block device.
pub fn is_block_device(path: &Path) -> bool {
    match stat(path) {
        Ok(st) => st.st_mode & SFlag::S_IFMT.bits() == SFlag::S_IFBLK.bits(),
        Err(_) => false,
    }
}

/// Firmware mode of the running system.
pub fn firmware_mode() -> BootMode {
    if Path::new("/sys/firmware/efi").exists() {
        BootMode::Uefi
    } else {
        BootMode::Bios
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LSBLK_SAMPLE: &str = "\
nvme0n1  476.9G disk  0
sda        3.7G disk  0
sdb       14.9G disk  1
loop0       55M loop  1
sr0       1024M rom   0
";

    #[test]
    fn test_parse_lsblk_filters_disks() {
        let disks = parse_lsblk_disks(LSBLK_SAMPLE);
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].path, PathBuf::from("/dev/nvme0n1"));
        assert_eq!(disks[0].size, "476.9G");
        assert_eq!(disks[1].path, PathBuf::from("/dev/sda"));
    }

    #[test]
    fn test_parse_lsblk_empty_input() {
        assert!(parse_lsblk_disks("").is_empty());
    }

    const SGDISK_SAMPLE: &str = "\
Disk /dev/sda: 1000215216 sectors, 476.9 GiB
Logical sector size: 512 bytes
Disk identifier (GUID): 12345678-ABCD-ABCD-ABCD-123456789ABC
Partition table holds up to 128 entries
First usable sector is 34, last usable sector is 1000215182
Partitions will be aligned on 2048-sector boundaries
Total free space is 2014 sectors (1007.0 KiB)

Number  Start (sector)    End (sector)  Size       Code  Name
   1            2048          206847   100.0 MiB   EF00  EFI system partition
   2          206848          239615   16.0 MiB    0C01  Microsoft reserved ...
   3          239616       999161855   476.3 GiB   0700  Basic data partition
";

    #[test]
    fn test_parse_sgdisk_print() {
        let entries = parse_sgdisk_print(SGDISK_SAMPLE);
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].number, 1);
        assert_eq!(entries[0].first_sector, 2048);
        assert_eq!(entries[0].last_sector, 206847);
        assert_eq!(entries[0].typecode, "EF00");
        assert_eq!(entries[0].name, "EFI system partition");

        assert_eq!(entries[2].typecode, "0700");
        assert_eq!(entries[2].last_sector, 999161855);
    }

    #[test]
    fn test_parse_sgdisk_ignores_header() {
        // Header lines must not be mistaken for partition rows
        let entries = parse_sgdisk_print("Number  Start (sector)    End (sector)  Size  Code  Name\n");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_partition_path_sd() {
        assert_eq!(
            partition_path(Path::new("/dev/sda"), 2),
            PathBuf::from("/dev/sda2")
        );
    }

    #[test]
    fn test_partition_path_nvme() {
        assert_eq!(
            partition_path(Path::new("/dev/nvme0n1"), 2),
            PathBuf::from("/dev/nvme0n1p2")
        );
    }

    #[test]
    fn test_is_block_device_on_regular_file() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        assert!(!is_block_device(file.path()));
        assert!(!is_block_device(Path::new("/nonexistent/device")));
    }
}
