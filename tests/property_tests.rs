//! Property tests for the dual-boot sector arithmetic.

use archsetup::engine::dualboot::ALIGNMENT_SECTORS;
use archsetup::engine::storage::{TYPE_EFI, TYPE_LUKS, TYPE_NTFS};
use archsetup::{dual_boot_plan, shrink_geometry, PartitionBound, PartitionEntry, StorageOp};
use proptest::prelude::*;
use std::path::Path;

fn ntfs_entry(first: u64, last: u64) -> PartitionEntry {
    PartitionEntry {
        number: 3,
        first_sector: first,
        last_sector: last,
        typecode: TYPE_NTFS.to_string(),
        name: "Basic data partition".to_string(),
    }
}

proptest! {
    /// Whenever a geometry is produced, the three partitions are ordered,
    /// non-overlapping, aligned and inside the usable GPT area.
    #[test]
    fn geometry_is_ordered_and_aligned(
        sector_size in prop_oneof![Just(512u64), Just(4096u64)],
        total_sectors in 200_000_000u64..4_000_000_000,
        ntfs_first in 2_048u64..50_000_000,
        tail_gap in 34u64..100_000,
    ) {
        let ntfs_last = total_sectors - tail_gap;
        prop_assume!(ntfs_first < ntfs_last);
        let ntfs = ntfs_entry(ntfs_first, ntfs_last);

        if let Ok(geo) = shrink_geometry(sector_size, total_sectors, &ntfs, 4) {
            prop_assert_eq!(geo.ntfs_first, ntfs_first);
            prop_assert!(geo.ntfs_last < geo.efi_first);
            prop_assert!(geo.efi_first <= geo.efi_last);
            prop_assert!(geo.efi_last < geo.luks_first);
            prop_assert!(geo.luks_first <= geo.luks_last);
            prop_assert!(geo.luks_last <= total_sectors - 34);

            prop_assert_eq!(geo.efi_first % ALIGNMENT_SECTORS, 0);
            prop_assert_eq!(geo.luks_first % ALIGNMENT_SECTORS, 0);

            // The resize target matches the new partition entry exactly
            prop_assert_eq!(
                geo.ntfs_bytes,
                (geo.ntfs_last - geo.ntfs_first + 1) * sector_size
            );
            // and never goes below the 16 GiB sanity floor
            prop_assert!(geo.ntfs_bytes >= 16 << 30);
        }
    }

    /// Linux never gets more than the second half: the NTFS end only moves
    /// down to the aligned midpoint, never below the old start.
    #[test]
    fn shrink_never_moves_the_start(
        total_sectors in 200_000_000u64..4_000_000_000,
        ntfs_first in 2_048u64..50_000_000,
    ) {
        let ntfs = ntfs_entry(ntfs_first, total_sectors - 34);
        if let Ok(geo) = shrink_geometry(512, total_sectors, &ntfs, 4) {
            prop_assert!(geo.ntfs_last > geo.ntfs_first);
            prop_assert!(geo.ntfs_last < ntfs.last_sector);
            // New end sits just below the aligned midpoint
            prop_assert!(geo.ntfs_last >= total_sectors / 2 - 1);
            prop_assert!(geo.ntfs_last < total_sectors / 2 + ALIGNMENT_SECTORS);
        }
    }

    /// An NTFS partition that starts in the second half is always rejected.
    #[test]
    fn ntfs_in_second_half_is_rejected(
        total_sectors in 200_000_000u64..4_000_000_000,
        offset in 0u64..10_000_000,
    ) {
        let first = total_sectors / 2 + ALIGNMENT_SECTORS + offset;
        prop_assume!(first < total_sectors - 1_000);
        let ntfs = ntfs_entry(first, total_sectors - 34);
        prop_assert!(shrink_geometry(512, total_sectors, &ntfs, 4).is_err());
    }

    /// Every generated plan recreates the NTFS entry with exactly the
    /// computed sectors and adds the two Linux partitions with the right
    /// typecodes.
    #[test]
    fn plan_sectors_match_geometry(
        total_sectors in 200_000_000u64..4_000_000_000,
        ntfs_first in 2_048u64..50_000_000,
        swap_gib in 1u32..64,
    ) {
        let ntfs = ntfs_entry(ntfs_first, total_sectors - 34);
        if let Ok(geo) = shrink_geometry(512, total_sectors, &ntfs, 4) {
            let (plan, _) = dual_boot_plan(Path::new("/dev/sda"), &geo, &ntfs.name, swap_gib);

            let mut adds = plan.ops.iter().filter_map(|op| match op {
                StorageOp::AddPartition { number, first, last, typecode, .. } => {
                    Some((*number, *first, *last, typecode.as_str()))
                }
                _ => None,
            });

            prop_assert_eq!(
                adds.next(),
                Some((
                    3,
                    PartitionBound::Sector(geo.ntfs_first),
                    PartitionBound::Sector(geo.ntfs_last),
                    TYPE_NTFS
                ))
            );
            prop_assert_eq!(
                adds.next(),
                Some((
                    geo.efi_number,
                    PartitionBound::Sector(geo.efi_first),
                    PartitionBound::Sector(geo.efi_last),
                    TYPE_EFI
                ))
            );
            prop_assert_eq!(
                adds.next(),
                Some((
                    geo.luks_number,
                    PartitionBound::Sector(geo.luks_first),
                    PartitionBound::Sector(geo.luks_last),
                    TYPE_LUKS
                ))
            );
            prop_assert_eq!(adds.next(), None);
        }
    }
}
