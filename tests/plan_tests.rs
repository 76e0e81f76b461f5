//! End-to-end storage plan tests through the public API: profile in,
//! ordered command list out.

use archsetup::engine::storage::{MAPPER_NAME, TYPE_EFI, TYPE_LUKS, TYPE_NTFS, VG_NAME};
use archsetup::{
    command_for, dual_boot_plan, ensure_linux_half_free, full_disk_plan, shrink_geometry, Machine,
    PartitionEntry, StorageOp,
};
use std::path::{Path, PathBuf};

fn windows_entry() -> PartitionEntry {
    PartitionEntry {
        number: 3,
        first_sector: 239_616,
        last_sector: 999_161_855,
        typecode: TYPE_NTFS.to_string(),
        name: "Basic data partition".to_string(),
    }
}

const TOTAL_SECTORS: u64 = 1_000_215_216;

#[test]
fn full_disk_plan_renders_to_known_programs() {
    let plan = full_disk_plan(Path::new("/dev/sda"), Machine::Pc.profile().swap_gib);

    let allowed = [
        "sgdisk", "partprobe", "udevadm", "cryptsetup", "pvcreate", "vgcreate", "lvcreate",
        "mkfs.fat", "mkfs.ext4", "mkswap", "mount", "swapon",
    ];
    for op in &plan.ops {
        let (program, args) = command_for(op);
        assert!(
            allowed.contains(&program.as_str()),
            "unexpected program {} for {}",
            program,
            op
        );
        assert!(!args.is_empty() || program == "udevadm");
    }
}

#[test]
fn full_disk_plan_creates_esp_then_luks() {
    let plan = full_disk_plan(Path::new("/dev/sda"), 8);

    let typecodes: Vec<&str> = plan
        .ops
        .iter()
        .filter_map(|op| match op {
            StorageOp::AddPartition { typecode, .. } => Some(typecode.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(typecodes, vec![TYPE_EFI, TYPE_LUKS]);
}

#[test]
fn full_disk_plan_settles_before_luks_format() {
    let plan = full_disk_plan(Path::new("/dev/sda"), 8);

    let settle = plan
        .ops
        .iter()
        .position(|op| matches!(op, StorageOp::UdevSettle))
        .expect("udev settle");
    let format = plan
        .ops
        .iter()
        .position(|op| matches!(op, StorageOp::LuksFormat { .. }))
        .expect("luks format");
    assert!(settle < format);
}

#[test]
fn full_disk_plan_uses_profile_swap_size() {
    let profile = Machine::Pc.profile();
    let plan = full_disk_plan(Path::new("/dev/sda"), profile.swap_gib);

    let expected = format!("{}G", profile.swap_gib);
    assert!(plan.ops.iter().any(|op| matches!(
        op,
        StorageOp::CreateLv { vg, name, size }
            if vg == VG_NAME && name == "swap" && *size == expected
    )));
}

#[test]
fn dual_boot_plan_preserves_windows_entry() {
    let ntfs = windows_entry();
    let geo = shrink_geometry(512, TOTAL_SECTORS, &ntfs, 4).expect("geometry");
    let (plan, _) = dual_boot_plan(Path::new("/dev/sda"), &geo, &ntfs.name, 8);

    // The shrunk NTFS partition keeps its number, start sector and name
    assert!(plan.ops.iter().any(|op| matches!(
        op,
        StorageOp::AddPartition { number, label, typecode, .. }
            if *number == ntfs.number && label == &ntfs.name && typecode == TYPE_NTFS
    )));
    // and the disk is never wiped
    assert!(!plan
        .ops
        .iter()
        .any(|op| matches!(op, StorageOp::ZapDisk { .. } | StorageOp::NewTable { .. })));
}

#[test]
fn dual_boot_plan_resize_matches_geometry() {
    let ntfs = windows_entry();
    let geo = shrink_geometry(512, TOTAL_SECTORS, &ntfs, 4).expect("geometry");
    let (plan, _) = dual_boot_plan(Path::new("/dev/sda"), &geo, &ntfs.name, 8);

    let (program, args) = command_for(&plan.ops[0]);
    assert_eq!(program, "ntfsresize");
    assert_eq!(args[2], geo.ntfs_bytes.to_string());
    assert_eq!(args[3], "/dev/sda3");
}

#[test]
fn dual_boot_devices_point_at_new_partitions() {
    let ntfs = windows_entry();
    let geo = shrink_geometry(512, TOTAL_SECTORS, &ntfs, 4).expect("geometry");
    let (_, devices) = dual_boot_plan(Path::new("/dev/nvme0n1"), &geo, &ntfs.name, 8);

    assert_eq!(devices.efi_partition, PathBuf::from("/dev/nvme0n1p4"));
    assert_eq!(devices.luks_partition, PathBuf::from("/dev/nvme0n1p5"));
}

#[test]
fn occupied_second_half_is_refused_before_any_destructive_op() {
    // OEM disk: data partition, then a recovery partition at the tail.
    // The shrink itself would succeed, so the free-space check is the only
    // thing standing between this layout and an unbootable Windows.
    let ntfs = PartitionEntry {
        last_sector: 998_000_000,
        ..windows_entry()
    };
    let recovery = PartitionEntry {
        number: 4,
        first_sector: 998_002_048,
        last_sector: 1_000_200_000,
        typecode: TYPE_NTFS.to_string(),
        name: "Recovery".to_string(),
    };
    let table = vec![ntfs.clone(), recovery];

    let geo = shrink_geometry(512, TOTAL_SECTORS, &ntfs, 5).expect("geometry");
    assert!(ensure_linux_half_free(&table, &geo).is_err());
}

#[test]
fn both_layouts_share_the_encrypted_tail() {
    let full = full_disk_plan(Path::new("/dev/sda"), 8);

    let ntfs = windows_entry();
    let geo = shrink_geometry(512, TOTAL_SECTORS, &ntfs, 4).expect("geometry");
    let (dual, _) = dual_boot_plan(Path::new("/dev/sda"), &geo, &ntfs.name, 8);

    let tail = |plan: &archsetup::StoragePlan| -> Vec<String> {
        plan.ops
            .iter()
            .skip_while(|op| !matches!(op, StorageOp::LuksOpen { .. }))
            .filter_map(|op| match op {
                StorageOp::LuksOpen { mapper_name, .. } => Some(format!("open:{}", mapper_name)),
                StorageOp::CreateVg { name, .. } => Some(format!("vg:{}", name)),
                StorageOp::CreateLv { name, .. } => Some(format!("lv:{}", name)),
                _ => None,
            })
            .collect()
    };
    assert_eq!(tail(&full), tail(&dual));
    assert_eq!(tail(&full)[0], format!("open:{}", MAPPER_NAME));
}
