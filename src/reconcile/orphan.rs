// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Orphan collection.
//!
//! An __orphan__ is an alias left in the target directory that no declared
//! resource accounts for anymore, e.g., the alias of a deleted server. The
//! set of names accounted for is built fresh by each pass and handed in, so
//! nothing here outlives a single run.

use crate::{alias::ObservedEntry, filter::PatternSet, reconcile::plan::Action};

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Collect orphaned aliases from observed target entries.
///
/// Only symbolic links are ever collected. An unaccounted entry that is not
/// a symbolic link is reported as [`Action::Stray`] and left alone. Entries
/// matching `preserve` are skipped entirely.
pub fn collect(
    observed: &BTreeMap<String, ObservedEntry>,
    accounted: &BTreeSet<String>,
    preserve: &PatternSet,
) -> Vec<Action> {
    observed
        .iter()
        .filter(|(name, _)| !accounted.contains(*name))
        .filter_map(|(name, observation)| {
            if preserve.matches(name) {
                debug!("preserve target entry {name:?}");
                return None;
            }

            let action = match observation {
                ObservedEntry::Link { resolved } => Action::RemoveOrphan {
                    alias: name.clone(),
                    resolved: resolved.clone(),
                },
                ObservedEntry::Occupied => Action::Stray { name: name.clone() },
            };

            Some(action)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::plan::ActionKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn collect_skips_accounted_and_preserved() -> anyhow::Result<()> {
        let observed = BTreeMap::from([
            (
                "alpha".to_string(),
                ObservedEntry::Link {
                    resolved: Some("id-1".into()),
                },
            ),
            (
                "gone".to_string(),
                ObservedEntry::Link {
                    resolved: Some("id-7".into()),
                },
            ),
            ("ghost".to_string(), ObservedEntry::Link { resolved: None }),
            ("lost+found".to_string(), ObservedEntry::Occupied),
            ("backup.tar".to_string(), ObservedEntry::Occupied),
        ]);
        let accounted = BTreeSet::from(["alpha".to_string()]);
        let preserve = PatternSet::new(["lost+found"])?;

        let result = collect(&observed, &accounted, &preserve)
            .iter()
            .map(|action| (action.kind(), action.alias().map(str::to_owned)))
            .collect::<Vec<_>>();
        let expect = vec![
            (ActionKind::Stray, Some("backup.tar".to_string())),
            (ActionKind::RemoveOrphan, Some("ghost".to_string())),
            (ActionKind::RemoveOrphan, Some("gone".to_string())),
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn collect_is_scoped_to_given_pass() {
        let observed = BTreeMap::from([(
            "alpha".to_string(),
            ObservedEntry::Link {
                resolved: Some("id-1".into()),
            },
        )]);

        let first = collect(&observed, &BTreeSet::from(["alpha".to_string()]), &PatternSet::default());
        let second = collect(&observed, &BTreeSet::new(), &PatternSet::default());
        assert!(first.is_empty());
        assert_eq!(second.len(), 1);
    }
}
