//! Machine profile catalog.
//!
//! One profile per physical machine this tool installs. Package lists live
//! in Rust rather than external data files: typos fail tests, updates
//! happen in one place, and the resolver can be verified without touching
//! a disk.

use crate::types::{Desktop, DiskLayout, Machine};

/// Packages every machine gets via pacstrap.
pub const BASE_PACKAGES: &[&str] = &[
    "base",
    "linux",
    "linux-firmware",
    "lvm2",
    "cryptsetup",
    "efibootmgr",
    "networkmanager",
    "sudo",
    "vim",
];

/// Static description of one machine.
#[derive(Debug, Clone, Copy)]
pub struct MachineProfile {
    pub machine: Machine,
    pub hostname: &'static str,
    pub username: &'static str,
    pub locale: &'static str,
    pub keymap: &'static str,
    pub timezone: &'static str,
    /// CPU microcode package (`intel-ucode` or `amd-ucode`)
    pub microcode: &'static str,
    /// Swap LV size in GiB
    pub swap_gib: u32,
    pub layout: DiskLayout,
    pub desktop: Desktop,
    /// Machine-specific packages installed by the post-chroot stage
    pub extra_packages: &'static [&'static str],
    pub enable_services: &'static [&'static str],
    pub disable_services: &'static [&'static str],
}

impl Machine {
    /// The static profile for this machine.
    pub fn profile(self) -> MachineProfile {
        match self {
            Machine::NbMatthias => MachineProfile {
                machine: self,
                hostname: "nb-matthias",
                username: "matthias",
                locale: "de_DE.UTF-8",
                keymap: "de-latin1",
                timezone: "Europe/Berlin",
                microcode: "intel-ucode",
                swap_gib: 8,
                layout: DiskLayout::FullDiskEncrypted,
                desktop: Desktop::Kde,
                extra_packages: &["firefox", "tlp", "bluez", "bluez-utils"],
                enable_services: &["NetworkManager", "sddm", "tlp", "bluetooth", "fstrim.timer"],
                disable_services: &[],
            },
            Machine::NbNee => MachineProfile {
                machine: self,
                hostname: "nb-nee",
                username: "nee",
                locale: "de_DE.UTF-8",
                keymap: "de-latin1",
                timezone: "Europe/Berlin",
                microcode: "intel-ucode",
                swap_gib: 8,
                layout: DiskLayout::FullDiskEncrypted,
                desktop: Desktop::Gnome,
                extra_packages: &["firefox", "tlp"],
                enable_services: &["NetworkManager", "gdm", "tlp", "fstrim.timer"],
                disable_services: &[],
            },
            Machine::Pc => MachineProfile {
                machine: self,
                hostname: "pc",
                username: "matthias",
                locale: "de_DE.UTF-8",
                keymap: "de-latin1",
                timezone: "Europe/Berlin",
                microcode: "amd-ucode",
                swap_gib: 16,
                layout: DiskLayout::FullDiskEncrypted,
                desktop: Desktop::Kde,
                extra_packages: &["firefox", "steam", "pipewire", "pipewire-pulse"],
                enable_services: &["NetworkManager", "sddm", "fstrim.timer"],
                disable_services: &[],
            },
            Machine::NbWsMss => MachineProfile {
                machine: self,
                hostname: "nb-ws-mss",
                username: "mss",
                locale: "de_DE.UTF-8",
                keymap: "de-latin1",
                timezone: "Europe/Berlin",
                microcode: "intel-ucode",
                swap_gib: 8,
                layout: DiskLayout::DualBootWindows,
                desktop: Desktop::Kde,
                extra_packages: &["firefox", "ntfs-3g", "tlp"],
                enable_services: &["NetworkManager", "sddm", "tlp", "fstrim.timer"],
                disable_services: &[],
            },
            Machine::WsPc => MachineProfile {
                machine: self,
                hostname: "ws-pc",
                username: "mss",
                locale: "de_DE.UTF-8",
                keymap: "de-latin1",
                timezone: "Europe/Berlin",
                microcode: "intel-ucode",
                swap_gib: 16,
                layout: DiskLayout::FullDiskEncrypted,
                desktop: Desktop::Minimal,
                extra_packages: &["openssh", "git"],
                enable_services: &["NetworkManager", "sshd", "fstrim.timer"],
                disable_services: &[],
            },
        }
    }
}

impl Desktop {
    /// Desktop environment packages, including the display manager.
    pub fn packages(&self) -> &'static [&'static str] {
        match self {
            Desktop::Minimal => &[],
            Desktop::Kde => &[
                "plasma-meta",
                "konsole",
                "dolphin",
                "ark",
                "sddm",
            ],
            Desktop::Gnome => &["gnome", "gnome-tweaks", "gdm", "file-roller"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_machine_has_a_profile() {
        for machine in Machine::iter() {
            let profile = machine.profile();
            assert_eq!(profile.machine, machine);
            assert!(!profile.hostname.is_empty());
            assert!(!profile.username.is_empty());
            assert!(profile.swap_gib > 0);
        }
    }

    #[test]
    fn test_hostnames_are_unique() {
        let hostnames: HashSet<_> = Machine::iter().map(|m| m.profile().hostname).collect();
        assert_eq!(hostnames.len(), Machine::iter().count());
    }

    #[test]
    fn test_hostname_matches_machine_name() {
        for machine in Machine::iter() {
            assert_eq!(machine.profile().hostname, machine.to_string());
        }
    }

    #[test]
    fn test_only_nb_ws_mss_dual_boots() {
        for machine in Machine::iter() {
            let dual = machine.profile().layout == DiskLayout::DualBootWindows;
            assert_eq!(dual, machine == Machine::NbWsMss);
        }
    }

    #[test]
    fn test_dual_boot_machine_gets_ntfs_tools() {
        let profile = Machine::NbWsMss.profile();
        assert!(profile.extra_packages.contains(&"ntfs-3g"));
    }

    #[test]
    fn test_base_packages_contain_storage_stack() {
        assert!(BASE_PACKAGES.contains(&"lvm2"));
        assert!(BASE_PACKAGES.contains(&"cryptsetup"));
    }

    #[test]
    fn test_desktop_machines_enable_display_manager() {
        for machine in Machine::iter() {
            let profile = machine.profile();
            match profile.desktop {
                Desktop::Kde => assert!(profile.enable_services.contains(&"sddm")),
                Desktop::Gnome => assert!(profile.enable_services.contains(&"gdm")),
                Desktop::Minimal => {}
            }
        }
    }

    #[test]
    fn test_desktop_packages_include_display_manager() {
        assert!(Desktop::Kde.packages().contains(&"sddm"));
        assert!(Desktop::Gnome.packages().contains(&"gdm"));
        assert!(Desktop::Minimal.packages().is_empty());
    }
}
