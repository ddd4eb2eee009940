// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that servlink reads to find
//! its resource root, target directory, and directory policy. Every key is
//! optional. Anything left out falls back to the compiled-in defaults, so a
//! missing configuration file simply means "use the defaults".

use crate::filter::PatternSet;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Servlink configuration layout.
///
/// # General Layout
///
/// The configuration is split into three sections: paths, policy, and
/// filter. The paths section locates the resource root and the target
/// directory of aliases. The policy section describes the ownership and
/// permission bits the target directory must carry before any alias is
/// touched. The filter section lists glob patterns of names to ignore.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Location of resources and aliases.
    pub paths: PathSettings,

    /// Target directory ownership policy.
    pub policy: DirectoryPolicy,

    /// Name filters.
    pub filter: FilterSettings,
}

impl Config {
    /// Load configuration from file.
    ///
    /// Falls back to default configuration if the file does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if configuration file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if configuration is malformed.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => {
                debug!("load configuration from {:?}", path.display());
                data.parse()
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no configuration at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            }),
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        config.paths.resource_root = expand_path(&config.paths.resource_root)?;
        config.paths.target_dir = expand_path(&config.paths.target_dir)?;
        config.paths.lock_file = config
            .paths
            .lock_file
            .as_deref()
            .map(expand_path)
            .transpose()?;

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Resource and alias locations.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory whose immediate children are resource directories.
    pub resource_root: PathBuf,

    /// Flat directory of aliases pointing into the resource root.
    pub target_dir: PathBuf,

    /// Path of descriptor file relative to each resource directory.
    pub descriptor: PathBuf,

    /// Lock file used to serialize runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_file: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            resource_root: PathBuf::from("/var/lib/pterodactyl/volumes"),
            target_dir: PathBuf::from("/srv/servers"),
            descriptor: PathBuf::from(".alias"),
            lock_file: None,
        }
    }
}

/// Ownership and permission policy of target directory.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryPolicy {
    /// Group that must own the target directory, by name or numeric gid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Permission bits of the target directory.
    pub mode: ModeBits,
}

impl Default for DirectoryPolicy {
    fn default() -> Self {
        Self {
            group: Some("pterodactyl".into()),
            mode: ModeBits::default(),
        }
    }
}

/// Name filters for scanning and orphan collection.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Resource identifiers to ignore while scanning.
    pub exclude: PatternSet,

    /// Target directory entries never collected as orphans.
    pub preserve: PatternSet,
}

/// Permission bits written as an octal string, e.g., "2775".
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModeBits(u32);

impl ModeBits {
    /// Construct new permission bits.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::InvalidMode`] if bits exceed `0o7777`.
    pub fn new(bits: u32) -> Result<Self> {
        if bits > 0o7777 {
            return Err(ConfigError::InvalidMode(format!("{bits:o}")));
        }

        Ok(Self(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl Default for ModeBits {
    /// Group-writable with set-group-ID, so new aliases inherit the group.
    fn default() -> Self {
        Self(0o2775)
    }
}

impl FromStr for ModeBits {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let digits = data.trim();
        let digits = digits.strip_prefix("0o").unwrap_or(digits);
        let bits = u32::from_str_radix(digits, 8)
            .map_err(|_| ConfigError::InvalidMode(data.to_string()))?;

        Self::new(bits)
    }
}

impl TryFrom<String> for ModeBits {
    type Error = ConfigError;

    fn try_from(data: String) -> Result<Self, Self::Error> {
        data.parse()
    }
}

impl From<ModeBits> for String {
    fn from(mode: ModeBits) -> Self {
        mode.to_string()
    }
}

impl Display for ModeBits {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{:04o}", self.0)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Permission bits are not a valid octal mode.
    #[error("invalid permission bits {0:?}, expected octal mode up to 7777")]
    InvalidMode(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
