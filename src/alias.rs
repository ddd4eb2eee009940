// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Alias inspection and mutation.
//!
//! An __alias__ is a symbolic link in the target directory, named by the
//! human-readable alias of a resource, pointing at that resource's
//! directory. An alias is valid for a declared entry if and only if its name
//! is the declared alias, and the final component of its fully resolved
//! target is the declared identifier.
//!
//! All alias mutation goes through the [`AliasFs`] trait, so the
//! reconciliation engine never calls into the filesystem directly for
//! destructive work.

use crate::scan::DeclaredEntry;

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{canonicalize, read_dir, remove_dir_all, remove_file, symlink_metadata},
    io::{self, ErrorKind},
    path::Path,
};
use tracing::warn;

/// Classification of an alias against its declared entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasState {
    /// Nothing occupies the alias name.
    Absent,

    /// Alias resolves to the declared identifier.
    Valid,

    /// Something occupies the alias name, but it is wrong.
    Stale(Staleness),
}

/// Reason an occupied alias name is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// Symbolic link resolves to another identifier.
    Foreign(String),

    /// Symbolic link cannot be resolved.
    Dangling,

    /// Entry is not a symbolic link at all.
    Occupied,
}

impl Display for Staleness {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Foreign(identifier) => write!(fmt, "points at {identifier:?}"),
            Self::Dangling => fmt.write_str("dangling"),
            Self::Occupied => fmt.write_str("not a symbolic link"),
        }
    }
}

/// Entry physically present in the target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEntry {
    /// Symbolic link, with the final component of its resolved target.
    Link { resolved: Option<String> },

    /// Anything that is not a symbolic link.
    Occupied,
}

/// Classify alias of declared entry inside target directory.
///
/// Symbolic links are followed to their final real path, and only the last
/// component of that path is compared against the declared identifier.
///
/// # Errors
///
/// - Return [`io::Error`] if alias metadata cannot be read for any reason
///   other than it not existing.
pub fn classify(target_dir: &Path, entry: &DeclaredEntry) -> io::Result<AliasState> {
    let state = match inspect(&target_dir.join(&entry.alias))? {
        None => AliasState::Absent,
        Some(ObservedEntry::Link {
            resolved: Some(identifier),
        }) if identifier == entry.identifier => AliasState::Valid,
        Some(ObservedEntry::Link {
            resolved: Some(identifier),
        }) => AliasState::Stale(Staleness::Foreign(identifier)),
        Some(ObservedEntry::Link { resolved: None }) => AliasState::Stale(Staleness::Dangling),
        Some(ObservedEntry::Occupied) => AliasState::Stale(Staleness::Occupied),
    };

    Ok(state)
}

/// Inspect single entry without following it.
///
/// Returns `None` if nothing exists at the path.
///
/// # Errors
///
/// - Return [`io::Error`] if metadata cannot be read.
pub fn inspect(path: &Path) -> io::Result<Option<ObservedEntry>> {
    let metadata = match symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    if !metadata.file_type().is_symlink() {
        return Ok(Some(ObservedEntry::Occupied));
    }

    let resolved = canonicalize(path)
        .ok()
        .and_then(|real| real.file_name().map(|name| name.to_string_lossy().into_owned()));

    Ok(Some(ObservedEntry::Link { resolved }))
}

/// Observe every entry of the target directory.
///
/// A missing target directory is observed as empty. Names that are not
/// valid unicode cannot match any alias, so they are left out with a warning.
/// Entries whose metadata cannot be read are left out with a warning too,
/// which keeps them safe from orphan collection.
///
/// # Errors
///
/// - Return [`io::Error`] if target directory cannot be listed.
pub fn observe(target_dir: &Path) -> io::Result<BTreeMap<String, ObservedEntry>> {
    let entries = match read_dir(target_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err),
    };

    let mut observed = BTreeMap::new();
    for entry in entries {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            warn!("ignore non-unicode entry {:?}", entry.path().display());
            continue;
        };

        if let Some(observation) = observe_entry(&entry.path()) {
            observed.insert(name, observation);
        }
    }

    Ok(observed)
}

// INVARIANT: Entry may vanish between listing and inspection.
fn observe_entry(path: &Path) -> Option<ObservedEntry> {
    match inspect(path) {
        Ok(observation) => observation,
        Err(err) => {
            warn!("ignore uninspectable entry {:?}: {err}", path.display());
            None
        }
    }
}

/// Alias mutation layer.
pub trait AliasFs {
    /// Create symbolic link at `link` pointing at `resource_dir`.
    fn create_alias(&self, link: &Path, resource_dir: &Path) -> io::Result<()>;

    /// Remove whatever occupies `path`, without following it.
    fn remove_entry(&self, path: &Path) -> io::Result<()>;
}

/// Alias mutation through real symbolic links.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkFs;

impl AliasFs for SymlinkFs {
    fn create_alias(&self, link: &Path, resource_dir: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(resource_dir, link)
    }

    fn remove_entry(&self, path: &Path) -> io::Result<()> {
        if symlink_metadata(path)?.is_dir() {
            remove_dir_all(path)
        } else {
            remove_file(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        fs::{create_dir, create_dir_all, write},
        os::unix::fs::symlink,
        path::PathBuf,
    };

    struct Layout {
        _scratch: tempfile::TempDir,
        root: PathBuf,
        target: PathBuf,
    }

    impl Layout {
        fn new() -> anyhow::Result<Self> {
            let scratch = tempfile::tempdir()?;
            let root = scratch.path().join("volumes");
            let target = scratch.path().join("servers");
            create_dir_all(root.join("id-1"))?;
            create_dir_all(root.join("id-2"))?;
            create_dir(&target)?;

            Ok(Self {
                _scratch: scratch,
                root,
                target,
            })
        }

        fn entry(&self, identifier: &str, alias: &str) -> DeclaredEntry {
            DeclaredEntry {
                identifier: identifier.into(),
                alias: alias.into(),
                resource_dir: self.root.join(identifier),
            }
        }
    }

    #[test]
    fn classify_absent_alias() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        let result = classify(&layout.target, &layout.entry("id-1", "alpha"))?;
        assert_eq!(result, AliasState::Absent);

        Ok(())
    }

    #[test]
    fn classify_valid_alias() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        symlink(layout.root.join("id-1"), layout.target.join("alpha"))?;
        let result = classify(&layout.target, &layout.entry("id-1", "alpha"))?;
        assert_eq!(result, AliasState::Valid);

        Ok(())
    }

    #[test]
    fn classify_follows_link_chains() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        symlink(layout.root.join("id-1"), layout.root.join("hop"))?;
        symlink(layout.root.join("hop"), layout.target.join("alpha"))?;
        let result = classify(&layout.target, &layout.entry("id-1", "alpha"))?;
        assert_eq!(result, AliasState::Valid);

        Ok(())
    }

    #[test]
    fn classify_foreign_alias_as_stale() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        symlink(layout.root.join("id-2"), layout.target.join("alpha"))?;
        let result = classify(&layout.target, &layout.entry("id-1", "alpha"))?;
        assert_eq!(result, AliasState::Stale(Staleness::Foreign("id-2".into())));

        Ok(())
    }

    #[test]
    fn classify_dangling_alias_as_stale() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        symlink(layout.root.join("gone"), layout.target.join("alpha"))?;
        let result = classify(&layout.target, &layout.entry("id-1", "alpha"))?;
        assert_eq!(result, AliasState::Stale(Staleness::Dangling));

        Ok(())
    }

    #[test]
    fn classify_non_link_as_stale() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        create_dir(layout.target.join("alpha"))?;
        write(layout.target.join("beta"), "id-2")?;
        let alpha = classify(&layout.target, &layout.entry("id-1", "alpha"))?;
        let beta = classify(&layout.target, &layout.entry("id-2", "beta"))?;
        assert_eq!(alpha, AliasState::Stale(Staleness::Occupied));
        assert_eq!(beta, AliasState::Stale(Staleness::Occupied));

        Ok(())
    }

    #[test]
    fn observe_lists_target_entries() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        symlink(layout.root.join("id-1"), layout.target.join("alpha"))?;
        symlink(layout.root.join("gone"), layout.target.join("ghost"))?;
        write(layout.target.join("notes.txt"), "hello")?;

        let result = observe(&layout.target)?;
        let expect = BTreeMap::from([
            (
                "alpha".to_string(),
                ObservedEntry::Link {
                    resolved: Some("id-1".into()),
                },
            ),
            ("ghost".to_string(), ObservedEntry::Link { resolved: None }),
            ("notes.txt".to_string(), ObservedEntry::Occupied),
        ]);
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn observe_missing_target_as_empty() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        let result = observe(&layout.target.join("missing"))?;
        assert!(result.is_empty());

        Ok(())
    }

    #[test]
    fn observe_entry_leaves_out_uninspectable_entries() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        symlink(layout.root.join("id-1"), layout.target.join("alpha"))?;

        assert!(observe_entry(&layout.target.join("a".repeat(300))).is_none());
        assert_eq!(
            observe_entry(&layout.target.join("alpha")),
            Some(ObservedEntry::Link {
                resolved: Some("id-1".into()),
            })
        );

        Ok(())
    }

    #[test]
    fn symlink_fs_removes_links_without_following() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        write(layout.root.join("id-1").join("world.dat"), "precious")?;
        let fs = SymlinkFs;
        fs.create_alias(&layout.target.join("alpha"), &layout.root.join("id-1"))?;
        fs.remove_entry(&layout.target.join("alpha"))?;

        assert!(inspect(&layout.target.join("alpha"))?.is_none());
        assert!(layout.root.join("id-1").join("world.dat").exists());

        Ok(())
    }

    #[test]
    fn symlink_fs_removes_occupying_directory() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        create_dir_all(layout.target.join("alpha").join("nested"))?;
        write(layout.target.join("alpha").join("nested").join("file"), "x")?;
        SymlinkFs.remove_entry(&layout.target.join("alpha"))?;
        assert!(inspect(&layout.target.join("alpha"))?.is_none());

        Ok(())
    }
}
