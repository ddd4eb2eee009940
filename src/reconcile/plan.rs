// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconciliation planning.
//!
//! A [`Plan`] is computed in full before anything in the target directory is
//! touched. It is a pure function of the scanned declared state and the
//! observed target state, which is what lets a dry run report exactly what a
//! live run would do.

use crate::{
    alias::{classify, AliasState, ObservedEntry, Staleness},
    filter::PatternSet,
    reconcile::orphan,
    scan::{DeclaredEntry, ScanItem, SkipReason},
};

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter, Result as FmtResult},
    io,
    path::Path,
};
use tracing::error;

/// Single typed step of a reconciliation plan.
#[derive(Debug)]
pub enum Action {
    /// Alias is absent, create it.
    Create { entry: DeclaredEntry },

    /// Resource changed its alias, move the old alias to the new name.
    Rename {
        entry: DeclaredEntry,
        previous: String,
    },

    /// Alias name is occupied by something stale, replace it.
    Repoint {
        entry: DeclaredEntry,
        staleness: Staleness,
    },

    /// Alias is already valid.
    Unchanged { entry: DeclaredEntry },

    /// Alias was already claimed by an earlier resource in this pass.
    Conflict { entry: DeclaredEntry, holder: String },

    /// Resource declared nothing usable.
    Skip {
        identifier: String,
        reason: SkipReason,
    },

    /// Alias could not be inspected, so its state is unknown.
    Unverifiable {
        entry: DeclaredEntry,
        source: io::Error,
    },

    /// Alias no longer corresponds to any declared resource.
    RemoveOrphan {
        alias: String,
        resolved: Option<String>,
    },

    /// Unclaimed target directory entry that is not an alias.
    Stray { name: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Rename { .. } => ActionKind::Rename,
            Self::Repoint { .. } => ActionKind::Repoint,
            Self::Unchanged { .. } => ActionKind::Unchanged,
            Self::Conflict { .. } => ActionKind::Conflict,
            Self::Skip { .. } => ActionKind::Skip,
            Self::Unverifiable { .. } => ActionKind::Unverifiable,
            Self::RemoveOrphan { .. } => ActionKind::RemoveOrphan,
            Self::Stray { .. } => ActionKind::Stray,
        }
    }

    /// Check if action mutates the target directory.
    pub fn is_mutation(&self) -> bool {
        self.kind().is_mutation()
    }

    /// Resource identifier the action concerns, if any.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Create { entry }
            | Self::Rename { entry, .. }
            | Self::Repoint { entry, .. }
            | Self::Unchanged { entry }
            | Self::Conflict { entry, .. }
            | Self::Unverifiable { entry, .. } => Some(entry.identifier.as_str()),
            Self::Skip { identifier, .. } => Some(identifier.as_str()),
            Self::RemoveOrphan { resolved, .. } => resolved.as_deref(),
            Self::Stray { .. } => None,
        }
    }

    /// Alias name the action concerns, if any.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Self::Create { entry }
            | Self::Rename { entry, .. }
            | Self::Repoint { entry, .. }
            | Self::Unchanged { entry }
            | Self::Conflict { entry, .. }
            | Self::Unverifiable { entry, .. } => Some(entry.alias.as_str()),
            Self::Skip { .. } => None,
            Self::RemoveOrphan { alias, .. } => Some(alias.as_str()),
            Self::Stray { name } => Some(name.as_str()),
        }
    }
}

impl Display for Action {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Create { entry } => {
                write!(fmt, "create alias {:?} -> {:?}", entry.alias, entry.identifier)
            }
            Self::Rename { entry, previous } => write!(
                fmt,
                "rename alias {previous:?} to {:?} -> {:?}",
                entry.alias, entry.identifier
            ),
            Self::Repoint { entry, staleness } => write!(
                fmt,
                "repoint alias {:?} ({staleness}) -> {:?}",
                entry.alias, entry.identifier
            ),
            Self::Unchanged { entry } => {
                write!(fmt, "keep alias {:?} -> {:?}", entry.alias, entry.identifier)
            }
            Self::Conflict { entry, holder } => write!(
                fmt,
                "resource {:?} declares alias {:?} already claimed by {holder:?}",
                entry.identifier, entry.alias
            ),
            Self::Skip { identifier, reason } => write!(fmt, "skip resource {identifier:?}: {reason}"),
            Self::Unverifiable { entry, source } => write!(
                fmt,
                "cannot inspect alias {:?} of resource {:?}: {source}",
                entry.alias, entry.identifier
            ),
            Self::RemoveOrphan {
                alias,
                resolved: Some(identifier),
            } => write!(fmt, "remove orphan alias {alias:?} -> {identifier:?}"),
            Self::RemoveOrphan {
                alias,
                resolved: None,
            } => write!(fmt, "remove dangling orphan alias {alias:?}"),
            Self::Stray { name } => write!(fmt, "leave non-alias entry {name:?} in place"),
        }
    }
}

/// Kinds of plan actions, without their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    Create,
    Rename,
    Repoint,
    Unchanged,
    Conflict,
    Skip,
    Unverifiable,
    RemoveOrphan,
    Stray,
}

impl ActionKind {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Rename | Self::Repoint | Self::RemoveOrphan
        )
    }
}

/// Complete reconciliation plan.
///
/// # Invariant
///
/// - Every orphan removal comes after every declared entry action.
/// - No two declared entry actions mutate the same alias name.
#[derive(Debug, Default)]
pub struct Plan {
    actions: Vec<Action>,
    accounted: BTreeSet<String>,
}

impl Plan {
    /// Draft plan from scanned resources and observed target entries.
    ///
    /// Resources are taken in scan order. The first resource to declare an
    /// alias claims it, and any later resource declaring the same alias is
    /// planned as a [`Action::Conflict`].
    ///
    /// A resource whose alias is absent, while an unclaimed alias in the
    /// target directory still resolves to that resource, is planned as a
    /// [`Action::Rename`] of that alias instead of a create plus an orphan
    /// removal.
    pub fn draft(
        items: impl IntoIterator<Item = ScanItem>,
        target_dir: &Path,
        observed: &BTreeMap<String, ObservedEntry>,
        preserve: &PatternSet,
    ) -> Self {
        // alias -> identifier of first claimant.
        let mut claims: BTreeMap<String, String> = BTreeMap::new();
        let mut pending = Vec::new();
        let mut root_listed = true;

        for item in items {
            match item {
                ScanItem::Skipped { identifier, reason } => {
                    root_listed &= !reason.is_root_failure();
                    pending.push(Pending::Ready(Action::Skip { identifier, reason }))
                }
                ScanItem::Declared(entry) => match claims.get(&entry.alias) {
                    Some(holder) => pending.push(Pending::Ready(Action::Conflict {
                        holder: holder.clone(),
                        entry,
                    })),
                    None => {
                        claims.insert(entry.alias.clone(), entry.identifier.clone());
                        pending.push(Pending::Classify(entry));
                    }
                },
            }
        }

        let mut renames = rename_sources(observed, &claims, preserve);
        let mut accounted: BTreeSet<String> = claims.into_keys().collect();
        let mut actions = Vec::with_capacity(pending.len());

        for pending in pending {
            let entry = match pending {
                Pending::Ready(action) => {
                    actions.push(action);
                    continue;
                }
                Pending::Classify(entry) => entry,
            };

            let action = match classify(target_dir, &entry) {
                Ok(AliasState::Absent) => match renames.remove(entry.identifier.as_str()) {
                    Some(previous) => {
                        accounted.insert(previous.to_string());
                        Action::Rename {
                            entry,
                            previous: previous.to_string(),
                        }
                    }
                    None => Action::Create { entry },
                },
                Ok(AliasState::Valid) => Action::Unchanged { entry },
                Ok(AliasState::Stale(staleness)) => Action::Repoint { entry, staleness },
                Err(source) => Action::Unverifiable { entry, source },
            };
            actions.push(action);
        }

        // INVARIANT: Orphans are collected only after every declared entry,
        // and only when the whole resource root was seen.
        if root_listed {
            actions.extend(orphan::collect(observed, &accounted, preserve));
        } else {
            error!("resource root was not fully scanned, keep every unclaimed alias");
        }

        Self { actions, accounted }
    }

    pub fn actions(&self) -> &[Action] {
        self.actions.as_slice()
    }

    /// Names that belong to this pass and must not be collected as orphans.
    pub fn accounted(&self) -> &BTreeSet<String> {
        &self.accounted
    }

    /// Number of actions that mutate the target directory.
    pub fn mutations(&self) -> usize {
        self.actions.iter().filter(|action| action.is_mutation()).count()
    }

    /// Check if plan leaves the target directory exactly as it is.
    pub fn is_noop(&self) -> bool {
        self.mutations() == 0
    }
}

enum Pending {
    Ready(Action),
    Classify(DeclaredEntry),
}

// Map identifier -> first unclaimed alias that still resolves to it.
fn rename_sources<'a>(
    observed: &'a BTreeMap<String, ObservedEntry>,
    claims: &BTreeMap<String, String>,
    preserve: &PatternSet,
) -> BTreeMap<&'a str, &'a str> {
    let mut sources = BTreeMap::new();
    for (name, observation) in observed {
        if claims.contains_key(name) || preserve.matches(name) {
            continue;
        }

        if let ObservedEntry::Link {
            resolved: Some(identifier),
        } = observation
        {
            sources.entry(identifier.as_str()).or_insert(name.as_str());
        }
    }

    sources
}
