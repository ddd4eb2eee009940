// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Alias reconciliation.
//!
//! Servlink keeps a flat __target directory__ of human-readable aliases, each
//! a symbolic link into the __resource root__ where resource directories are
//! named by opaque identifiers. The human-readable name of a resource can
//! change at any time, while its identifier never does.
//!
//! # Reconciliation Pass
//!
//! A single pass works like a small declarative controller:
//!
//! 1. Check that the resource root exists.
//! 2. Prepare the target directory according to the directory policy.
//! 3. Scan the resource root for declared aliases.
//! 4. Observe the target directory, and draft a complete [`Plan`].
//! 5. Apply the plan: declared entries first, orphan removals last.
//!
//! Only a failure in the first two steps, or an unreadable target directory,
//! stops the pass. A failure to create or remove one alias is recorded in
//! the [`Report`] and the pass moves on to the next action. Nothing is
//! retried. The next pass converges whatever this one left behind, because
//! running a pass twice against unchanged declared state mutates nothing the
//! second time.
//!
//! # Concurrency
//!
//! Two passes over the same target directory have no isolation from one
//! another. Callers that may overlap runs must serialize them, e.g., through
//! [`RunLock`](crate::lock::RunLock).

pub mod orphan;
pub mod plan;
pub mod report;

use crate::{
    alias::{observe, AliasFs, SymlinkFs},
    config::Config,
    reconcile::{
        plan::{Action, Plan},
        report::{Outcome, Report},
    },
    scan::ResourceScanner,
    steward::{self, StewardError},
};

use std::{
    fs::{canonicalize, read_dir},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Whether a run mutates the filesystem.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Apply every planned mutation.
    #[default]
    Live,

    /// Compute and report the plan, mutate nothing.
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Alias reconciler.
///
/// Holds the configuration of a reconciliation pass, and the [`AliasFs`]
/// through which every alias mutation goes.
#[derive(Debug)]
pub struct Reconciler<F = SymlinkFs>
where
    F: AliasFs,
{
    config: Config,
    fs: F,
}

impl Reconciler<SymlinkFs> {
    /// Construct new reconciler over real symbolic links.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            fs: SymlinkFs,
        }
    }
}

impl<F> Reconciler<F>
where
    F: AliasFs,
{
    /// Construct new reconciler with custom alias mutation layer.
    pub fn with_fs(config: Config, fs: F) -> Self {
        Self { config, fs }
    }

    /// Run full reconciliation pass.
    ///
    /// # Errors
    ///
    /// - Return [`RunError::MissingResourceRoot`] if resource root cannot be
    ///   resolved.
    /// - Return [`RunError::ResourceRootNotADirectory`] or
    ///   [`RunError::UnlistableResourceRoot`] if resource root is unusable.
    /// - Return [`RunError::Steward`] if target directory cannot be prepared.
    /// - Return [`RunError::ObserveTarget`] if target directory cannot be
    ///   listed.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&self, mode: RunMode) -> Result<Report> {
        let root = self.resource_root()?;
        let adjustments = steward::prepare(&self.config.paths.target_dir, &self.config.policy, mode)?;
        debug!("target directory adjustments: {adjustments:?}");

        let plan = self.draft(&root)?;
        let report = self.apply(&plan, mode);
        report.summarize();

        Ok(report)
    }

    /// Draft reconciliation plan without preparing or mutating anything.
    ///
    /// # Errors
    ///
    /// - Return [`RunError::MissingResourceRoot`] if resource root cannot be
    ///   resolved.
    /// - Return [`RunError::ResourceRootNotADirectory`] or
    ///   [`RunError::UnlistableResourceRoot`] if resource root is unusable.
    /// - Return [`RunError::ObserveTarget`] if target directory cannot be
    ///   listed.
    pub fn plan(&self) -> Result<Plan> {
        let root = self.resource_root()?;
        self.draft(&root)
    }

    /// Apply plan, recording every action in a report.
    ///
    /// Mutation failures are recorded and never stop the remaining actions.
    pub fn apply(&self, plan: &Plan, mode: RunMode) -> Report {
        let mut report = Report::new(mode);
        for action in plan.actions() {
            let outcome = if !action.is_mutation() {
                Outcome::Noop
            } else if mode.is_dry_run() {
                Outcome::Planned
            } else {
                match self.execute(action) {
                    Ok(()) => Outcome::Applied,
                    Err(err) => Outcome::Failed(err.to_string()),
                }
            };

            report.record(action, outcome);
        }

        report
    }

    fn resource_root(&self) -> Result<PathBuf> {
        let root = &self.config.paths.resource_root;
        let resolved = canonicalize(root).map_err(|err| RunError::MissingResourceRoot {
            source: err,
            path: root.clone(),
        })?;

        // INVARIANT: Resource root must be a listable directory, otherwise
        // every alias would look like an orphan.
        if !resolved.is_dir() {
            return Err(RunError::ResourceRootNotADirectory { path: resolved });
        }

        read_dir(&resolved).map_err(|err| RunError::UnlistableResourceRoot {
            source: err,
            path: resolved.clone(),
        })?;

        Ok(resolved)
    }

    fn draft(&self, root: &Path) -> Result<Plan> {
        let target = &self.config.paths.target_dir;
        info!(
            "reconcile aliases of {:?} into {:?}",
            root.display(),
            target.display()
        );

        let scanner = ResourceScanner::new(
            root,
            &self.config.paths.descriptor,
            self.config.filter.exclude.clone(),
        );
        let observed = observe(target).map_err(|err| RunError::ObserveTarget {
            source: err,
            path: target.clone(),
        })?;

        Ok(Plan::draft(
            scanner.scan(),
            target,
            &observed,
            &self.config.filter.preserve,
        ))
    }

    fn execute(&self, action: &Action) -> io::Result<()> {
        let target = &self.config.paths.target_dir;
        match action {
            Action::Create { entry } => self
                .fs
                .create_alias(&target.join(&entry.alias), &entry.resource_dir),
            Action::Rename { entry, previous } => {
                // INVARIANT: New alias exists before old alias goes away.
                self.fs
                    .create_alias(&target.join(&entry.alias), &entry.resource_dir)?;
                self.fs.remove_entry(&target.join(previous)).map_err(|err| {
                    io::Error::new(
                        err.kind(),
                        format!("previous alias {previous:?} could not be removed: {err}"),
                    )
                })
            }
            Action::Repoint { entry, .. } => {
                let link = target.join(&entry.alias);
                self.fs.remove_entry(&link)?;
                self.fs.create_alias(&link, &entry.resource_dir)
            }
            Action::RemoveOrphan { alias, .. } => self.fs.remove_entry(&target.join(alias)),
            _ => Ok(()),
        }
    }
}

/// Fatal reconciliation errors.
///
/// Anything that goes wrong with a single resource or alias is recorded in
/// the [`Report`] instead.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Resource root does not exist, or cannot be resolved.
    #[error("resource root {:?} is missing", path.display())]
    MissingResourceRoot {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Resource root resolves to something other than a directory.
    #[error("resource root {:?} is not a directory", path.display())]
    ResourceRootNotADirectory { path: PathBuf },

    /// Resource root exists, but cannot be listed.
    #[error("failed to list resource root {:?}", path.display())]
    UnlistableResourceRoot {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Target directory cannot be prepared.
    #[error(transparent)]
    Steward(#[from] StewardError),

    /// Target directory cannot be listed.
    #[error("failed to list target directory {:?}", path.display())]
    ObserveTarget {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RunError> = std::result::Result<T, E>;
