// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where servlink should look for its configuration file.

use std::path::PathBuf;

/// Environment variable that overrides configuration file lookup.
pub const CONFIG_ENV: &str = "SERVLINK_CONFIG";

/// System-wide configuration file path.
pub const SYSTEM_CONFIG: &str = "/etc/servlink/config.toml";

/// Determine absolute path to configuration file.
///
/// Lookup order:
///
/// 1. `$SERVLINK_CONFIG` if set.
/// 2. `$XDG_CONFIG_HOME/servlink/config.toml` if that file exists.
/// 3. `/etc/servlink/config.toml`.
///
/// Does not check if the path returned actually exists. Servlink falls back
/// to its defaults when it does not.
///
/// # Errors
///
/// - Return [`NoConfigDir`] if `$SERVLINK_CONFIG` is set but empty.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        if path.is_empty() {
            return Err(NoConfigDir);
        }

        return Ok(PathBuf::from(path));
    }

    let user = dirs::config_dir().map(|path| path.join("servlink").join("config.toml"));
    match user {
        Some(path) if path.exists() => Ok(path),
        _ => Ok(PathBuf::from(SYSTEM_CONFIG)),
    }
}

/// No usable configuration file location.
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine configuration file path, {CONFIG_ENV} is set but empty")]
pub struct NoConfigDir;

/// Friendly result alias :3
pub type Result<T, E = NoConfigDir> = std::result::Result<T, E>;
