// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use servlink::{
    alias::{observe, AliasFs, ObservedEntry, SymlinkFs},
    config::{Config, DirectoryPolicy, ModeBits},
    reconcile::{report::Report, Reconciler, RunMode},
};
use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs::{create_dir_all, remove_dir_all, write},
    io,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

pub(crate) const DESCRIPTOR: &str = ".alias";

/// Scratch resource root and target directory.
pub(crate) struct ServerFixture {
    _scratch: TempDir,
    root: PathBuf,
    target: PathBuf,
}

impl ServerFixture {
    pub(crate) fn new() -> Result<Self> {
        let scratch = tempfile::tempdir()?;
        let root = scratch.path().join("volumes");
        let target = scratch.path().join("servers");

        // INVARIANT: Only the resource root exists up front.
        create_dir_all(&root)?;

        Ok(Self {
            _scratch: scratch,
            root,
            target,
        })
    }

    pub(crate) fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub(crate) fn target(&self) -> &Path {
        self.target.as_path()
    }

    pub(crate) fn config(&self) -> Result<Config> {
        let mut config = Config::default();
        config.paths.resource_root = self.root.clone();
        config.paths.target_dir = self.target.clone();
        config.paths.descriptor = DESCRIPTOR.into();
        config.policy = DirectoryPolicy {
            group: None,
            mode: ModeBits::new(0o755)?,
        };

        Ok(config)
    }

    /// Create server volume, or rename an existing one.
    pub(crate) fn name_server(&self, identifier: &str, name: &str) -> Result<()> {
        let dir = self.root.join(identifier);
        create_dir_all(&dir)?;
        write(dir.join(DESCRIPTOR), format!("{name}\n"))?;

        Ok(())
    }

    pub(crate) fn delete_server(&self, identifier: &str) -> Result<()> {
        remove_dir_all(self.root.join(identifier))?;

        Ok(())
    }

    pub(crate) fn link(&self, alias: &str, identifier: &str) -> Result<()> {
        create_dir_all(&self.target)?;
        symlink(self.root.join(identifier), self.target.join(alias))?;

        Ok(())
    }

    /// Observed target directory, alias name to resolved identifier.
    pub(crate) fn snapshot(&self) -> Result<BTreeMap<String, ObservedEntry>> {
        Ok(observe(&self.target)?)
    }

    pub(crate) fn resolves(&self, alias: &str) -> Result<Option<String>> {
        Ok(match self.snapshot()?.remove(alias) {
            Some(ObservedEntry::Link { resolved }) => resolved,
            _ => None,
        })
    }

    pub(crate) fn reconcile(&self, mode: RunMode) -> Result<Report> {
        Ok(Reconciler::new(self.config()?).run(mode)?)
    }

    pub(crate) fn reconcile_with<F: AliasFs>(&self, fs: F, mode: RunMode) -> Result<Report> {
        Ok(Reconciler::with_fs(self.config()?, fs).run(mode)?)
    }
}

/// Alias layer that refuses to create one alias name.
pub(crate) struct DenyAlias(pub(crate) &'static str);

impl AliasFs for DenyAlias {
    fn create_alias(&self, link: &Path, resource_dir: &Path) -> io::Result<()> {
        if link.file_name() == Some(OsStr::new(self.0)) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }

        SymlinkFs.create_alias(link, resource_dir)
    }

    fn remove_entry(&self, path: &Path) -> io::Result<()> {
        SymlinkFs.remove_entry(path)
    }
}
