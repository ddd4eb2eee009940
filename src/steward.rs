// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Target directory preparation.
//!
//! Before any alias is created, the target directory must exist and carry
//! the configured group ownership and permission bits. The set-group-ID bit
//! makes every alias created afterwards inherit the directory's group.
//!
//! Preparation is idempotent. Running it against a directory that already
//! satisfies the policy changes nothing. Failures here are fatal: creating
//! aliases under the wrong ownership is worse than not creating them.

use crate::{config::DirectoryPolicy, reconcile::RunMode};

use nix::unistd::{chown, Gid, Group};
use std::{
    fs::{metadata, set_permissions, Permissions},
    io::ErrorKind,
    os::unix::fs::{MetadataExt, PermissionsExt},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Changes made, or that would be made, to the target directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Adjustments {
    /// Target directory was missing.
    pub created: bool,

    /// Group ownership did not match policy.
    pub regrouped: bool,

    /// Permission bits did not match policy.
    pub remoded: bool,
}

impl Adjustments {
    /// Check if target directory already satisfied policy.
    pub fn is_noop(&self) -> bool {
        !(self.created || self.regrouped || self.remoded)
    }
}

/// Ensure target directory exists and satisfies directory policy.
///
/// In [`RunMode::DryRun`] the adjustments are computed and reported, but
/// nothing is applied.
///
/// # Errors
///
/// - Return [`StewardError::UnknownGroup`] if policy group does not exist.
/// - Return [`StewardError::NotADirectory`] if target path is not a directory.
/// - Return [`StewardError::Create`] if target directory cannot be created.
/// - Return [`StewardError::Chown`] if group ownership cannot be changed.
/// - Return [`StewardError::Chmod`] if permission bits cannot be changed.
#[instrument(skip(target, policy), level = "debug")]
pub fn prepare(target: &Path, policy: &DirectoryPolicy, mode: RunMode) -> Result<Adjustments> {
    let gid = policy.group.as_deref().map(resolve_gid).transpose()?;
    let wanted = policy.mode.bits();
    let mut adjustments = Adjustments::default();

    match metadata(target) {
        Ok(found) if !found.is_dir() => {
            return Err(StewardError::NotADirectory {
                path: target.to_path_buf(),
            })
        }
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {
            adjustments.created = true;
            if mode.is_dry_run() {
                info!("would create target directory {:?}", target.display());
                adjustments.regrouped = gid.is_some();
                adjustments.remoded = true;
                return Ok(adjustments);
            }

            info!("create target directory {:?}", target.display());
            mkdirp::mkdirp(target).map_err(|err| StewardError::Create {
                source: err,
                path: target.to_path_buf(),
            })?;
        }
        Err(err) => {
            return Err(StewardError::Inspect {
                source: err,
                path: target.to_path_buf(),
            })
        }
    }

    let found = metadata(target).map_err(|err| StewardError::Inspect {
        source: err,
        path: target.to_path_buf(),
    })?;

    if let Some(gid) = gid {
        if found.gid() != gid.as_raw() {
            adjustments.regrouped = true;
            if mode.is_dry_run() {
                info!("would change group of {:?} to {gid}", target.display());
            } else {
                info!("change group of {:?} to {gid}", target.display());
                chown(target, None, Some(gid)).map_err(|err| StewardError::Chown {
                    source: err,
                    path: target.to_path_buf(),
                })?;
            }
        }
    }

    // INVARIANT: Apply mode after ownership, chown may clear special bits.
    let current = metadata(target)
        .map_err(|err| StewardError::Inspect {
            source: err,
            path: target.to_path_buf(),
        })?
        .mode()
        & 0o7777;
    if current != wanted {
        adjustments.remoded = true;
        if mode.is_dry_run() {
            info!(
                "would change mode of {:?} from {current:04o} to {wanted:04o}",
                target.display()
            );
        } else {
            info!(
                "change mode of {:?} from {current:04o} to {wanted:04o}",
                target.display()
            );
            set_permissions(target, Permissions::from_mode(wanted)).map_err(|err| {
                StewardError::Chmod {
                    source: err,
                    path: target.to_path_buf(),
                }
            })?;
        }
    }

    if adjustments.is_noop() {
        debug!("target directory {:?} satisfies policy", target.display());
    }

    Ok(adjustments)
}

/// Resolve group name, or numeric gid, to a group id.
///
/// # Errors
///
/// - Return [`StewardError::GroupLookup`] if group database lookup fails.
/// - Return [`StewardError::UnknownGroup`] if group does not exist.
pub fn resolve_gid(group: &str) -> Result<Gid> {
    if let Ok(raw) = group.parse::<u32>() {
        return Ok(Gid::from_raw(raw));
    }

    Group::from_name(group)
        .map_err(|err| StewardError::GroupLookup {
            source: err,
            group: group.to_string(),
        })?
        .map(|found| found.gid)
        .ok_or_else(|| StewardError::UnknownGroup(group.to_string()))
}

/// Target directory preparation error types.
#[derive(Debug, thiserror::Error)]
pub enum StewardError {
    /// Group database lookup failed.
    #[error("failed to look up group {group:?}")]
    GroupLookup {
        #[source]
        source: nix::Error,
        group: String,
    },

    /// Policy names group that does not exist.
    #[error("group {0:?} does not exist")]
    UnknownGroup(String),

    /// Target path exists but is not a directory.
    #[error("target path {:?} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Target directory metadata cannot be read.
    #[error("failed to inspect target directory {:?}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Target directory cannot be created.
    #[error("failed to create target directory {:?}", path.display())]
    Create {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Group ownership cannot be changed.
    #[error("failed to change group of target directory {:?}", path.display())]
    Chown {
        #[source]
        source: nix::Error,
        path: PathBuf,
    },

    /// Permission bits cannot be changed.
    #[error("failed to change mode of target directory {:?}", path.display())]
    Chmod {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = StewardError> = std::result::Result<T, E>;
