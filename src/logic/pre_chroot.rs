//! Pre-chroot stage: disk setup and base system bootstrap.
//!
//! Runs as root from the Arch live ISO. Sequence:
//!
//! 1. resolve the machine profile (plus optional overrides)
//! 2. verify tools and UEFI firmware
//! 3. prompt for the target disk and confirm the destructive plan
//! 4. execute the storage plan (full-disk or dual-boot)
//! 5. `pacstrap` the base system, append the generated fstab
//! 6. record handoff state inside the new root
//!
//! Fail-fast throughout: the first failing command aborts the stage with
//! no cleanup. An opened LUKS container stays open.

use crate::config_file::ResolvedConfig;
use crate::engine::dualboot::{
    dual_boot_plan, ensure_linux_half_free, find_windows_partition, shrink_geometry,
    DualBootDevices,
};
use crate::engine::storage::{execute_plan, full_disk_plan, MOUNT_POINT, StoragePlan};
use crate::hardware;
use crate::runner::{self, is_dry_run};
use crate::state::StateDir;
use crate::sysfile;
use crate::types::{BootMode, DiskLayout, Machine};
use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Input};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Utilities the pre-chroot stage shells out to.
const REQUIRED_TOOLS: &[&str] = &[
    "sgdisk",
    "partprobe",
    "udevadm",
    "cryptsetup",
    "pvcreate",
    "vgcreate",
    "lvcreate",
    "mkfs.fat",
    "mkfs.ext4",
    "mkswap",
    "swapon",
    "mount",
    "pacstrap",
    "genfstab",
];

/// Additionally needed for the dual-boot layout.
const DUAL_BOOT_TOOLS: &[&str] = &["ntfsresize"];

/// Inputs to the pre-chroot stage.
#[derive(Debug, Clone)]
pub struct PreChrootOptions {
    pub machine: Machine,
    /// Skip the interactive prompt and use this disk.
    pub disk: Option<PathBuf>,
    pub config: ResolvedConfig,
}

pub fn run(opts: PreChrootOptions) -> Result<()> {
    let config = &opts.config;
    let profile = &config.profile;

    info!(
        "pre-chroot stage for {} ({} layout)",
        opts.machine, profile.layout
    );

    runner::ensure_tools(REQUIRED_TOOLS)?;
    if profile.layout == DiskLayout::DualBootWindows {
        runner::ensure_tools(DUAL_BOOT_TOOLS)?;
    }

    if hardware::firmware_mode() != BootMode::Uefi {
        if is_dry_run() {
            warn!("dry-run: not booted in UEFI mode, continuing anyway");
        } else {
            bail!("system is booted in BIOS mode, but systemd-boot requires UEFI");
        }
    }

    let disk = match &opts.disk {
        Some(disk) => {
            validate_disk(disk)?;
            disk.clone()
        }
        None => prompt_for_disk()?,
    };

    let (plan, dual_boot) = build_plan(&disk, config)?;
    println!("{}", plan.summary());

    if !is_dry_run() {
        confirm_destruction(&disk, profile.layout)?;
    }

    execute_plan(&plan).context("disk setup failed")?;

    bootstrap_base_system(config)?;
    append_fstab()?;
    record_state(&disk, dual_boot.as_ref())?;

    info!("pre-chroot stage complete");
    println!();
    println!("Next steps:");
    println!("  arch-chroot {}", MOUNT_POINT);
    println!("  archsetup post-chroot --machine {}", opts.machine);
    Ok(())
}

/// Build the storage plan for the profile's layout. For dual-boot this
/// queries the live partition table and computes the shrink geometry.
pub fn build_plan(
    disk: &Path,
    config: &ResolvedConfig,
) -> Result<(StoragePlan, Option<DualBootDevices>)> {
    match config.profile.layout {
        DiskLayout::FullDiskEncrypted => Ok((full_disk_plan(disk, config.swap_gib), None)),
        DiskLayout::DualBootWindows => {
            let sector_size = hardware::sector_size(disk)?;
            let total_bytes = hardware::size_in_bytes(disk)?;
            let total_sectors = total_bytes / sector_size;

            let table = hardware::partition_table(disk)?;
            let ntfs = find_windows_partition(&table)
                .with_context(|| format!("no NTFS partition found on {}", disk.display()))?;
            let next_free = table.iter().map(|p| p.number).max().unwrap_or(0) + 1;

            let geometry = shrink_geometry(sector_size, total_sectors, ntfs, next_free)
                .context("cannot shrink the Windows partition")?;
            ensure_linux_half_free(&table, &geometry)
                .context("the second half of the disk is not free")?;
            info!(
                "Windows NTFS partition #{} shrinks to {} bytes; Linux starts at sector {}",
                geometry.ntfs_number, geometry.ntfs_bytes, geometry.efi_first
            );

            let (plan, devices) = dual_boot_plan(disk, &geometry, &ntfs.name, config.swap_gib);
            Ok((plan, Some(devices)))
        }
    }
}

fn prompt_for_disk() -> Result<PathBuf> {
    let disks = hardware::list_candidate_disks()?;
    if disks.is_empty() {
        bail!("no candidate disks found");
    }

    println!("Available disks:");
    for disk in &disks {
        println!("  {:<16} {}", disk.path.display(), disk.size);
    }

    let answer: String = Input::new()
        .with_prompt("Target disk")
        .default(disks[0].path.display().to_string())
        .interact_text()
        .context("reading target disk")?;

    let disk = PathBuf::from(answer.trim());
    validate_disk(&disk)?;
    Ok(disk)
}

fn validate_disk(disk: &Path) -> Result<()> {
    if !hardware::is_block_device(disk) {
        if is_dry_run() {
            warn!("dry-run: {} is not a block device, continuing anyway", disk.display());
            return Ok(());
        }
        bail!("{} is not a block device", disk.display());
    }
    Ok(())
}

fn confirm_destruction(disk: &Path, layout: DiskLayout) -> Result<()> {
    let prompt = match layout {
        DiskLayout::FullDiskEncrypted => {
            format!("This will DESTROY ALL DATA on {}. Continue?", disk.display())
        }
        DiskLayout::DualBootWindows => format!(
            "This will SHRINK the Windows partition on {} and destroy the freed half. Continue?",
            disk.display()
        ),
    };

    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("reading confirmation")?;

    if !confirmed {
        bail!("aborted by user");
    }
    Ok(())
}

fn bootstrap_base_system(config: &ResolvedConfig) -> Result<()> {
    let mut packages: Vec<&str> = crate::profiles::BASE_PACKAGES.to_vec();
    packages.push(config.profile.microcode);

    let mut args: Vec<String> = vec!["-K".to_string(), MOUNT_POINT.to_string()];
    args.extend(packages.iter().map(|p| p.to_string()));

    runner::run("Bootstrapping base system", "pacstrap", &args)
        .context("pacstrap failed")?;
    Ok(())
}

fn append_fstab() -> Result<()> {
    if is_dry_run() {
        warn!("dry-run: skipping fstab generation");
        return Ok(());
    }
    let fstab = runner::output("genfstab", ["-U", MOUNT_POINT]).context("genfstab failed")?;
    sysfile::append(&Path::new(MOUNT_POINT).join("etc/fstab"), &fstab)?;
    Ok(())
}

fn record_state(disk: &Path, dual_boot: Option<&DualBootDevices>) -> Result<()> {
    if is_dry_run() {
        warn!("dry-run: skipping handoff state");
        return Ok(());
    }
    let state = StateDir::inside_root(Path::new(MOUNT_POINT));
    state.set_target_disk(disk)?;
    if let Some(devices) = dual_boot {
        state.set_efi_partition(&devices.efi_partition)?;
        state.set_luks_partition(&devices.luks_partition)?;
    }
    Ok(())
}
