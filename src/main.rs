//! archsetup - main entry point
//!
//! Parses the CLI, resolves the machine profile and dispatches to the
//! requested stage. Fail-fast: the first error aborts with a colored
//! message and exit code 1.

use anyhow::Result;
use archsetup::cli::{Cli, Commands};
use archsetup::config_file::{ResolvedConfig, SetupOverrides};
use archsetup::logic::{post_chroot, pre_chroot};
use archsetup::types::Machine;
use archsetup::{runner, DiskLayout};
use std::path::{Path, PathBuf};
use std::process::exit;
use strum::IntoEnumIterator;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn resolve_config(machine: Machine, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let overrides = match config_path {
        Some(path) => Some(SetupOverrides::load_from_file(path)?),
        None => None,
    };
    Ok(ResolvedConfig::new(machine.profile(), overrides))
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::PreChroot {
            machine,
            disk,
            config,
        } => {
            let config = resolve_config(machine, config.as_deref())?;
            pre_chroot::run(pre_chroot::PreChrootOptions {
                machine,
                disk,
                config,
            })
        }
        Commands::PostChroot { machine, config } => {
            let config = resolve_config(machine, config.as_deref())?;
            post_chroot::run(post_chroot::PostChrootOptions { machine, config })
        }
        Commands::Plan { machine, disk } => {
            let config = resolve_config(machine, None)?;
            print_plan(&config, &disk)
        }
        Commands::ListMachines => {
            list_machines();
            Ok(())
        }
    }
}

fn print_plan(config: &ResolvedConfig, disk: &PathBuf) -> Result<()> {
    let (plan, _) = pre_chroot::build_plan(disk, config)?;
    println!("{}", plan.summary());
    Ok(())
}

fn list_machines() {
    for machine in Machine::iter() {
        let profile = machine.profile();
        let layout = match profile.layout {
            DiskLayout::FullDiskEncrypted => "full-disk encrypted",
            DiskLayout::DualBootWindows => "dual-boot with Windows",
        };
        println!(
            "{:<14} {:<10} {:<8} {}",
            machine, profile.username, profile.desktop, layout
        );
    }
}

fn main() {
    init_logging();

    let cli = Cli::parse_args();
    if cli.dry_run {
        runner::enable_dry_run();
        debug!("dry-run mode enabled");
    }

    if let Err(error) = dispatch(cli) {
        // Bold red prefix, then the full context chain
        eprintln!("\x1b[1;31merror:\x1b[0m {:#}", error);
        exit(1);
    }
}
