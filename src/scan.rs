// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Resource scanning.
//!
//! A __resource__ is a directory directly beneath the resource root whose
//! name is an opaque, stable identifier (a server UUID). Each resource carries
//! a __descriptor__ file at a fixed relative path. The trimmed contents of
//! the descriptor are the human-readable alias the resource wants to be known
//! by in the target directory.
//!
//! Scanning produces one [`ScanItem`] per resource directory. Resources that
//! cannot declare a usable alias are not errors: they come out as
//! [`ScanItem::Skipped`] so the caller can report them and move on.
//!
//! Descriptors are read once per scan. A descriptor changed while a run is in
//! progress is picked up by the next run, never by the current one.

use crate::filter::PatternSet;

use ignore::{Walk, WalkBuilder};
use std::{
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Alias declared by one resource at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredEntry {
    /// Name of the resource directory.
    pub identifier: String,

    /// Normalized alias from the descriptor file.
    pub alias: String,

    /// Absolute path to the resource directory.
    pub resource_dir: PathBuf,
}

/// Result of scanning one resource directory.
#[derive(Debug)]
pub enum ScanItem {
    /// Resource declared a usable alias.
    Declared(DeclaredEntry),

    /// Resource was skipped, nothing will be done for it.
    Skipped {
        identifier: String,
        reason: SkipReason,
    },
}

/// Walk resource root for declared aliases.
#[derive(Debug, Clone)]
pub struct ResourceScanner {
    root: PathBuf,
    descriptor: PathBuf,
    exclude: PatternSet,
}

impl ResourceScanner {
    /// Construct new resource scanner.
    pub fn new(root: impl Into<PathBuf>, descriptor: impl Into<PathBuf>, exclude: PatternSet) -> Self {
        Self {
            root: root.into(),
            descriptor: descriptor.into(),
            exclude,
        }
    }

    /// Lazily scan resource root.
    ///
    /// Every call starts a fresh walk, nothing is cached between scans.
    /// Resource directories are visited in file name order.
    pub fn scan(&self) -> Scan<'_> {
        let walk = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .max_depth(Some(1))
            .sort_by_file_name(|lhs, rhs| lhs.cmp(rhs))
            .build();

        Scan {
            scanner: self,
            walk,
        }
    }

    fn read_entry(&self, identifier: &str, resource_dir: &Path) -> ScanItem {
        let skipped = |reason| ScanItem::Skipped {
            identifier: identifier.to_string(),
            reason,
        };

        let path = resource_dir.join(&self.descriptor);
        let contents = match read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return skipped(SkipReason::MissingDescriptor { path })
            }
            Err(err) => {
                return skipped(SkipReason::UnreadableDescriptor { source: err, path })
            }
        };

        match normalize_alias(&contents) {
            Ok(alias) => ScanItem::Declared(DeclaredEntry {
                identifier: identifier.to_string(),
                alias,
                resource_dir: resource_dir.to_path_buf(),
            }),
            Err(InvalidAlias::Empty) => skipped(SkipReason::EmptyAlias { path }),
            Err(InvalidAlias::Malformed(alias)) => skipped(SkipReason::MalformedAlias { alias, path }),
        }
    }
}

/// Lazy sequence of scanned resources.
pub struct Scan<'scanner> {
    scanner: &'scanner ResourceScanner,
    walk: Walk,
}

impl Iterator for Scan<'_> {
    type Item = ScanItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = error_path(&err, &self.scanner.root);
                    let reason = if path == self.scanner.root {
                        SkipReason::UnlistableRoot(err)
                    } else {
                        SkipReason::Walk(err)
                    };
                    return Some(ScanItem::Skipped {
                        identifier: file_name_lossy(&path),
                        reason,
                    });
                }
            };

            // INVARIANT: Resource root itself is never a resource.
            if entry.depth() == 0 {
                if entry.file_type().is_some_and(|kind| kind.is_dir()) {
                    continue;
                }

                return Some(ScanItem::Skipped {
                    identifier: file_name_lossy(entry.path()),
                    reason: SkipReason::RootNotADirectory {
                        path: entry.path().to_path_buf(),
                    },
                });
            }

            if !entry.file_type().is_some_and(|kind| kind.is_dir()) {
                debug!("ignore non-directory {:?}", entry.path().display());
                continue;
            }

            let Some(identifier) = entry.file_name().to_str() else {
                return Some(ScanItem::Skipped {
                    identifier: file_name_lossy(entry.path()),
                    reason: SkipReason::NonUnicodeIdentifier,
                });
            };

            if self.scanner.exclude.matches(identifier) {
                debug!("exclude resource {identifier:?}");
                continue;
            }

            return Some(self.scanner.read_entry(identifier, entry.path()));
        }
    }
}

/// Normalize raw descriptor contents into an alias.
///
/// Surrounding whitespace is trimmed. The result must be usable as a single
/// file name inside the target directory.
///
/// # Errors
///
/// - Return [`InvalidAlias::Empty`] if nothing is left after trimming.
/// - Return [`InvalidAlias::Malformed`] if alias cannot be a file name.
pub fn normalize_alias(raw: &str) -> Result<String, InvalidAlias> {
    let alias = raw.trim();
    if alias.is_empty() {
        return Err(InvalidAlias::Empty);
    }

    if alias == "." || alias == ".." || alias.contains(['/', '\0']) {
        return Err(InvalidAlias::Malformed(alias.to_string()));
    }

    Ok(alias.to_string())
}

fn error_path(err: &ignore::Error, root: &Path) -> PathBuf {
    match err {
        ignore::Error::WithPath { path, .. } => path.clone(),
        ignore::Error::Loop { child, .. } => child.clone(),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err, root)
        }
        _ => root.to_path_buf(),
    }
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Alias normalization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAlias {
    #[error("alias is empty")]
    Empty,

    #[error("alias {0:?} is not a valid file name")]
    Malformed(String),
}

/// Reasons a resource was skipped during scanning.
#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    /// Resource has no descriptor file.
    #[error("descriptor {:?} is missing", path.display())]
    MissingDescriptor { path: PathBuf },

    /// Descriptor exists but cannot be read.
    #[error("descriptor {:?} cannot be read: {source}", path.display())]
    UnreadableDescriptor {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Descriptor is blank after trimming.
    #[error("descriptor {:?} declares an empty alias", path.display())]
    EmptyAlias { path: PathBuf },

    /// Descriptor declares something that cannot be a file name.
    #[error("descriptor {:?} declares malformed alias {alias:?}", path.display())]
    MalformedAlias { alias: String, path: PathBuf },

    /// Resource directory name is not valid unicode.
    #[error("resource identifier is not valid unicode")]
    NonUnicodeIdentifier,

    /// Resource root entry cannot be walked.
    #[error("cannot walk resource: {0}")]
    Walk(#[source] ignore::Error),

    /// Resource root itself cannot be listed.
    #[error("cannot list resource root: {0}")]
    UnlistableRoot(#[source] ignore::Error),

    /// Resource root is not a directory.
    #[error("resource root {:?} is not a directory", path.display())]
    RootNotADirectory { path: PathBuf },
}

impl SkipReason {
    /// Check if the scan could not see the resource root at all.
    pub fn is_root_failure(&self) -> bool {
        matches!(self, Self::UnlistableRoot(_) | Self::RootNotADirectory { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs::{create_dir_all, write};

    fn resource(root: &Path, identifier: &str, descriptor: Option<&str>) -> anyhow::Result<()> {
        let dir = root.join(identifier);
        create_dir_all(&dir)?;
        if let Some(contents) = descriptor {
            write(dir.join(".alias"), contents)?;
        }

        Ok(())
    }

    fn summarize(items: impl IntoIterator<Item = ScanItem>) -> Vec<(String, Result<String, String>)> {
        items
            .into_iter()
            .map(|item| match item {
                ScanItem::Declared(entry) => (entry.identifier, Ok(entry.alias)),
                ScanItem::Skipped { identifier, reason } => (identifier, Err(reason.to_string())),
            })
            .collect()
    }

    #[test_case("alpha", Ok("alpha".into()); "plain")]
    #[test_case("  Survival World \n", Ok("Survival World".into()); "trim surrounding whitespace")]
    #[test_case(" \t\n", Err(InvalidAlias::Empty); "blank")]
    #[test_case("", Err(InvalidAlias::Empty); "empty")]
    #[test_case("a/b", Err(InvalidAlias::Malformed("a/b".into())); "path separator")]
    #[test_case("..", Err(InvalidAlias::Malformed("..".into())); "parent directory")]
    #[test_case(".", Err(InvalidAlias::Malformed(".".into())); "current directory")]
    #[test]
    fn normalize_alias_cases(raw: &str, expect: Result<String, InvalidAlias>) {
        pretty_assertions::assert_eq!(normalize_alias(raw), expect);
    }

    #[test]
    fn scan_declares_and_skips() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        resource(root.path(), "id-1", Some("alpha\n"))?;
        resource(root.path(), "id-2", None)?;
        resource(root.path(), "id-3", Some("   "))?;
        resource(root.path(), "id-4", Some("../escape"))?;
        write(root.path().join("stray-file"), "not a resource")?;

        let scanner = ResourceScanner::new(root.path(), ".alias", PatternSet::default());
        let result = summarize(scanner.scan());

        assert_eq!(result.len(), 4);
        assert_eq!(result[0], ("id-1".to_string(), Ok("alpha".to_string())));
        assert_eq!(result[1].0, "id-2");
        assert!(matches!(&result[1].1, Err(msg) if msg.contains("missing")));
        assert_eq!(result[2].0, "id-3");
        assert!(matches!(&result[2].1, Err(msg) if msg.contains("empty alias")));
        assert_eq!(result[3].0, "id-4");
        assert!(matches!(&result[3].1, Err(msg) if msg.contains("malformed")));

        Ok(())
    }

    #[test]
    fn scan_honors_exclude_patterns() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        resource(root.path(), "id-1", Some("alpha"))?;
        resource(root.path(), "id-1.bak", Some("alpha"))?;
        resource(root.path(), ".trash", Some("junk"))?;

        let scanner = ResourceScanner::new(root.path(), ".alias", PatternSet::new(["*.bak", ".*"])?);
        let result = summarize(scanner.scan());
        assert_eq!(result, vec![("id-1".to_string(), Ok("alpha".to_string()))]);

        Ok(())
    }

    #[test]
    fn scan_flags_file_root_as_root_failure() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let root = scratch.path().join("volumes");
        write(&root, "not a directory")?;

        let scanner = ResourceScanner::new(&root, ".alias", PatternSet::default());
        let items = scanner.scan().collect::<Vec<_>>();
        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            ScanItem::Skipped { reason, .. } if reason.is_root_failure()
        ));

        Ok(())
    }

    #[test]
    fn scan_is_restartable() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        resource(root.path(), "id-1", Some("alpha"))?;
        let scanner = ResourceScanner::new(root.path(), ".alias", PatternSet::default());
        assert_eq!(summarize(scanner.scan()).len(), 1);

        write(root.path().join("id-1").join(".alias"), "alpha2")?;
        resource(root.path(), "id-2", Some("beta"))?;
        let result = summarize(scanner.scan());
        assert_eq!(
            result,
            vec![
                ("id-1".to_string(), Ok("alpha2".to_string())),
                ("id-2".to_string(), Ok("beta".to_string())),
            ]
        );

        Ok(())
    }

    #[test]
    fn scan_reads_nested_descriptor_path() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("id-1").join("meta");
        create_dir_all(&dir)?;
        write(dir.join("name"), "nested\n")?;

        let scanner = ResourceScanner::new(root.path(), "meta/name", PatternSet::default());
        let result = summarize(scanner.scan());
        assert_eq!(result, vec![("id-1".to_string(), Ok("nested".to_string()))]);

        Ok(())
    }
}
