//! Profile catalog and override resolution through the public API.

use archsetup::{
    BASE_PACKAGES, Desktop, DiskLayout, Machine, ResolvedConfig, SetupOverrides,
};
use std::io::Write;
use strum::IntoEnumIterator;

#[test]
fn machine_names_parse_back() {
    for machine in Machine::iter() {
        let parsed: Machine = machine.to_string().parse().expect("round trip");
        assert_eq!(parsed, machine);
    }
}

#[test]
fn profiles_resolve_without_overrides() {
    for machine in Machine::iter() {
        let config = ResolvedConfig::new(machine.profile(), None);
        assert_eq!(config.hostname, machine.to_string());
        assert!(config.swap_gib > 0);
        assert!(config.locale.contains('.'));
    }
}

#[test]
fn override_file_changes_only_named_fields() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, r#"{{"username": "admin", "swap_gib": 32}}"#).expect("write");

    let overrides = SetupOverrides::load_from_file(file.path()).expect("load");
    let config = ResolvedConfig::new(Machine::WsPc.profile(), Some(overrides));

    assert_eq!(config.username, "admin");
    assert_eq!(config.swap_gib, 32);
    // Untouched fields keep the profile values
    assert_eq!(config.hostname, "ws-pc");
    assert_eq!(config.timezone, "Europe/Berlin");
}

#[test]
fn invalid_override_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, r#"{{"hostname": "no spaces allowed"}}"#).expect("write");
    assert!(SetupOverrides::load_from_file(file.path()).is_err());
}

#[test]
fn minimal_machine_installs_no_desktop() {
    let config = ResolvedConfig::new(Machine::WsPc.profile(), None);
    assert_eq!(config.profile.desktop, Desktop::Minimal);

    let packages = config.post_install_packages();
    assert!(!packages.iter().any(|p| p == "plasma-meta" || p == "gnome"));
    assert!(packages.contains(&"openssh".to_string()));
}

#[test]
fn dual_boot_profile_is_the_work_notebook() {
    for machine in Machine::iter() {
        let profile = machine.profile();
        if profile.layout == DiskLayout::DualBootWindows {
            assert_eq!(machine, Machine::NbWsMss);
            assert!(profile.extra_packages.contains(&"ntfs-3g"));
        }
    }
}

#[test]
fn base_packages_cover_boot_and_network() {
    for required in ["base", "linux", "cryptsetup", "lvm2", "networkmanager"] {
        assert!(BASE_PACKAGES.contains(&required), "missing {}", required);
    }
}
