//! Post-chroot stage: system configuration inside the new root.
//!
//! Runs as root inside `arch-chroot /mnt`. Sequence: timezone, locale and
//! console, hostname, initramfs with the `encrypt lvm2` hooks, root and
//! user accounts, sudoers, pacman.conf, machine packages, systemd-boot,
//! services. Same fail-fast policy as the pre-chroot stage.

use crate::config_file::ResolvedConfig;
use crate::engine::storage::{MAPPER_NAME, VG_NAME};
use crate::hardware;
use crate::runner::{self, is_dry_run};
use crate::state::StateDir;
use crate::sysfile;
use crate::types::{Desktop, DiskLayout, Machine};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Utilities the post-chroot stage shells out to.
const REQUIRED_TOOLS: &[&str] = &[
    "hwclock",
    "locale-gen",
    "mkinitcpio",
    "passwd",
    "useradd",
    "pacman",
    "bootctl",
    "blkid",
    "systemctl",
];

/// mkinitcpio hook order for an encrypted LVM root: `encrypt` and `lvm2`
/// must run after `block` and before `filesystems`.
const MKINITCPIO_HOOKS: &str = "HOOKS=(base udev autodetect modconf kms keyboard keymap consolefont block encrypt lvm2 filesystems fsck)";

/// Inputs to the post-chroot stage.
#[derive(Debug, Clone)]
pub struct PostChrootOptions {
    pub machine: Machine,
    pub config: ResolvedConfig,
}

pub fn run(opts: PostChrootOptions) -> Result<()> {
    let config = &opts.config;

    info!("post-chroot stage for {}", opts.machine);
    runner::ensure_tools(REQUIRED_TOOLS)?;

    let luks_partition = locate_luks_partition(config)?;

    configure_clock(config)?;
    configure_locale(config)?;
    configure_hostname(config)?;
    configure_initramfs()?;
    configure_users(config)?;
    configure_pacman(config)?;
    install_packages(config)?;
    install_bootloader(config, &luks_partition)?;
    configure_services(config)?;

    info!("post-chroot stage complete");
    println!();
    println!("Done. Exit the chroot, umount -R /mnt and reboot.");
    Ok(())
}

/// The LUKS partition the boot entry must unlock: recorded in the handoff
/// state for dual-boot, derived from the target disk otherwise. In dry-run
/// mode missing state falls back to a placeholder device so the stage can
/// be previewed on a machine that never ran the pre-chroot stage.
fn locate_luks_partition(config: &ResolvedConfig) -> Result<PathBuf> {
    let state = StateDir::in_chroot();
    let located = match config.profile.layout {
        DiskLayout::DualBootWindows => state.luks_partition(),
        DiskLayout::FullDiskEncrypted => state
            .target_disk()
            .map(|disk| hardware::partition_path(&disk, 2)),
    };
    match located {
        Ok(device) => Ok(device),
        Err(_) if is_dry_run() => {
            warn!("dry-run: no handoff state, using a placeholder LUKS device");
            Ok(PathBuf::from("/dev/mapper/placeholder"))
        }
        Err(e) => Err(e).context("handoff state missing"),
    }
}

fn configure_clock(config: &ResolvedConfig) -> Result<()> {
    let zoneinfo = Path::new("/usr/share/zoneinfo").join(&config.timezone);
    sysfile::symlink_force(&zoneinfo, Path::new("/etc/localtime"))?;
    runner::run("Syncing hardware clock", "hwclock", ["--systohc"])?;
    Ok(())
}

fn configure_locale(config: &ResolvedConfig) -> Result<()> {
    sysfile::write(
        Path::new("/etc/locale.gen"),
        &format!("{} UTF-8\n", config.locale),
    )?;
    runner::run("Generating locales", "locale-gen", [] as [&str; 0])?;
    sysfile::write(
        Path::new("/etc/locale.conf"),
        &format!("LANG={}\n", config.locale),
    )?;
    sysfile::write(
        Path::new("/etc/vconsole.conf"),
        &format!("KEYMAP={}\n", config.keymap),
    )?;
    Ok(())
}

fn configure_hostname(config: &ResolvedConfig) -> Result<()> {
    sysfile::write(Path::new("/etc/hostname"), &format!("{}\n", config.hostname))?;
    sysfile::write(Path::new("/etc/hosts"), &hosts_file(&config.hostname))?;
    Ok(())
}

/// Render /etc/hosts for a hostname.
pub fn hosts_file(hostname: &str) -> String {
    format!(
        "127.0.0.1\tlocalhost\n::1\t\tlocalhost\n127.0.1.1\t{}\n",
        hostname
    )
}

fn configure_initramfs() -> Result<()> {
    let conf = format!(
        "MODULES=()\nBINARIES=()\nFILES=()\n{}\n",
        MKINITCPIO_HOOKS
    );
    sysfile::write(Path::new("/etc/mkinitcpio.conf"), &conf)?;
    runner::run("Generating initramfs", "mkinitcpio", ["-P"])?;
    Ok(())
}

fn configure_users(config: &ResolvedConfig) -> Result<()> {
    info!("Set the root password");
    runner::run("Setting root password", "passwd", [] as [&str; 0])?;

    runner::run(
        "Creating user",
        "useradd",
        ["-m", "-G", "wheel", "-s", "/bin/bash", &config.username],
    )?;
    info!("Set the password for {}", config.username);
    runner::run("Setting user password", "passwd", [config.username.as_str()])?;

    let sudoers = Path::new("/etc/sudoers.d/10-wheel");
    sysfile::write(sudoers, "%wheel ALL=(ALL:ALL) ALL\n")?;
    sysfile::set_mode(sudoers, 0o440)?;
    Ok(())
}

fn configure_pacman(config: &ResolvedConfig) -> Result<()> {
    let path = Path::new("/etc/pacman.conf");
    if is_dry_run() {
        warn!("dry-run: would patch {}", path.display());
        return Ok(());
    }
    let current = std::fs::read_to_string(path).context("reading pacman.conf")?;
    let multilib = config.profile.desktop != Desktop::Minimal;
    let patched = patch_pacman_conf(&current, multilib);
    sysfile::write(path, &patched)?;
    Ok(())
}

/// Enable Color and ParallelDownloads, and optionally the [multilib]
/// repository, in pacman.conf content.
pub fn patch_pacman_conf(content: &str, multilib: bool) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(content.lines().count());
    let mut in_multilib = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed == "#Color" {
            lines.push("Color".to_string());
            continue;
        }
        if trimmed.starts_with("#ParallelDownloads") {
            lines.push("ParallelDownloads = 5".to_string());
            continue;
        }
        if multilib {
            if trimmed == "#[multilib]" {
                in_multilib = true;
                lines.push("[multilib]".to_string());
                continue;
            }
            if in_multilib && trimmed.starts_with("#Include") {
                in_multilib = false;
                lines.push(trimmed.trim_start_matches('#').to_string());
                continue;
            }
        }
        lines.push(line.to_string());
    }

    let mut result = lines.join("\n");
    result.push('\n');
    result
}

fn install_packages(config: &ResolvedConfig) -> Result<()> {
    let packages = config.post_install_packages();
    if packages.is_empty() {
        return Ok(());
    }
    let mut args: Vec<String> = vec![
        "-S".to_string(),
        "--needed".to_string(),
        "--noconfirm".to_string(),
    ];
    args.extend(packages);
    runner::run("Installing machine packages", "pacman", &args)?;
    Ok(())
}

fn install_bootloader(config: &ResolvedConfig, luks_partition: &Path) -> Result<()> {
    runner::run("Installing systemd-boot", "bootctl", ["install"])?;

    sysfile::write(
        Path::new("/boot/loader/loader.conf"),
        "default arch.conf\ntimeout 3\nconsole-mode max\neditor no\n",
    )?;

    let uuid = if is_dry_run() {
        warn!("dry-run: using placeholder LUKS UUID");
        "00000000-0000-0000-0000-000000000000".to_string()
    } else {
        hardware::device_uuid(luks_partition).context("reading LUKS partition UUID")?
    };

    sysfile::write(
        Path::new("/boot/loader/entries/arch.conf"),
        &boot_entry(&uuid, config.profile.microcode),
    )?;
    Ok(())
}

/// Render the systemd-boot entry unlocking the LUKS container and booting
/// from the LVM root.
pub fn boot_entry(luks_uuid: &str, microcode: &str) -> String {
    format!(
        "title   Arch Linux\n\
         linux   /vmlinuz-linux\n\
         initrd  /{}.img\n\
         initrd  /initramfs-linux.img\n\
         options cryptdevice=UUID={}:{} root=/dev/{}/root rw\n",
        microcode, luks_uuid, MAPPER_NAME, VG_NAME
    )
}

fn configure_services(config: &ResolvedConfig) -> Result<()> {
    for service in config.profile.enable_services {
        runner::run(
            &format!("Enabling {}", service),
            "systemctl",
            ["enable", service],
        )?;
    }
    for service in config.profile.disable_services {
        runner::run(
            &format!("Disabling {}", service),
            "systemctl",
            ["disable", service],
        )?;
    }
    Ok(())
}
