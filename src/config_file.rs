//! Optional JSON overrides for a machine profile.
//!
//! The static profile catalog covers the normal case; `--config <file>`
//! overrides individual values (hostname, username, locale, swap size,
//! extra packages) without editing the source. Bad values fail validation
//! before anything touches a disk.

use crate::error::{Result, SetupError};
use crate::profiles::MachineProfile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// User-supplied overrides; every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupOverrides {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub locale: Option<String>,
    pub keymap: Option<String>,
    pub timezone: Option<String>,
    pub swap_gib: Option<u32>,
    /// Installed in addition to the profile's package set
    #[serde(default)]
    pub extra_packages: Vec<String>,
}

impl SetupOverrides {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            SetupError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let overrides: SetupOverrides = serde_json::from_str(&raw)?;
        overrides.validate()?;
        Ok(overrides)
    }

    /// Reject values that would produce a broken system.
    pub fn validate(&self) -> Result<()> {
        if let Some(hostname) = &self.hostname {
            validate_hostname(hostname)?;
        }
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(swap) = self.swap_gib {
            if swap == 0 {
                return Err(SetupError::validation("swap_gib must be at least 1"));
            }
        }
        if let Some(locale) = &self.locale {
            if !locale.contains('.') {
                return Err(SetupError::validation(format!(
                    "locale '{}' should include a charset, e.g. de_DE.UTF-8",
                    locale
                )));
            }
        }
        Ok(())
    }
}

fn validate_hostname(hostname: &str) -> Result<()> {
    let valid = !hostname.is_empty()
        && hostname.len() <= 63
        && !hostname.starts_with('-')
        && !hostname.ends_with('-')
        && hostname
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(SetupError::validation(format!(
            "invalid hostname '{}'",
            hostname
        )))
    }
}

fn validate_username(username: &str) -> Result<()> {
    let mut chars = username.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && username.len() <= 32
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SetupError::validation(format!(
            "invalid username '{}'",
            username
        )))
    }
}

/// A machine profile with overrides applied; what the stages actually
/// consume.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub profile: MachineProfile,
    pub hostname: String,
    pub username: String,
    pub locale: String,
    pub keymap: String,
    pub timezone: String,
    pub swap_gib: u32,
    pub extra_packages: Vec<String>,
}

impl ResolvedConfig {
    pub fn new(profile: MachineProfile, overrides: Option<SetupOverrides>) -> Self {
        let overrides = overrides.unwrap_or_default();
        let mut extra_packages: Vec<String> = profile
            .extra_packages
            .iter()
            .map(|s| s.to_string())
            .collect();
        extra_packages.extend(overrides.extra_packages);

        Self {
            hostname: overrides.hostname.unwrap_or_else(|| profile.hostname.to_string()),
            username: overrides.username.unwrap_or_else(|| profile.username.to_string()),
            locale: overrides.locale.unwrap_or_else(|| profile.locale.to_string()),
            keymap: overrides.keymap.unwrap_or_else(|| profile.keymap.to_string()),
            timezone: overrides
                .timezone
                .unwrap_or_else(|| profile.timezone.to_string()),
            swap_gib: overrides.swap_gib.unwrap_or(profile.swap_gib),
            extra_packages,
            profile,
        }
    }

    /// Everything the post-chroot stage installs with pacman: machine
    /// extras plus the desktop environment.
    pub fn post_install_packages(&self) -> Vec<String> {
        let mut packages: Vec<String> = self.extra_packages.clone();
        packages.extend(
            self.profile
                .desktop
                .packages()
                .iter()
                .map(|s| s.to_string()),
        );
        packages
    }
}
