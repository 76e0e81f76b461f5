use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::Machine;

/// archsetup - profile-driven Arch Linux installation
#[derive(Parser)]
#[command(name = "archsetup")]
#[command(about = "Installs Arch Linux onto one of a fixed set of machines")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: log destructive commands instead of executing them.
    ///
    /// Read-only queries (lsblk, blockdev, sgdisk -p) still run so the
    /// preview is realistic.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Disk setup and base system bootstrap (run from the live ISO)
    PreChroot {
        /// Machine profile to install
        #[arg(short, long)]
        machine: Machine,

        /// Target disk; prompts interactively when omitted
        #[arg(short, long)]
        disk: Option<PathBuf>,

        /// JSON file overriding profile defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// System configuration (run inside arch-chroot /mnt)
    PostChroot {
        /// Machine profile to configure
        #[arg(short, long)]
        machine: Machine,

        /// JSON file overriding profile defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the storage plan for a machine without executing it
    Plan {
        /// Machine profile to plan for
        #[arg(short, long)]
        machine: Machine,

        /// Target disk the plan is computed against
        #[arg(short, long)]
        disk: PathBuf,
    },
    /// List the known machine profiles
    ListMachines,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
