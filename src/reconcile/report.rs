// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run reporting.
//!
//! Every plan action is recorded as an [`Event`] together with its outcome,
//! and logged at a severity matching what happened. A dry run records the
//! same actions as a live run would, with [`Outcome::Planned`] in place of
//! [`Outcome::Applied`].

use crate::reconcile::{
    plan::{Action, ActionKind},
    RunMode,
};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, error, info, warn};

/// What happened to a recorded action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Mutation was performed.
    Applied,

    /// Mutation would have been performed in a live run.
    Planned,

    /// Action needs no mutation.
    Noop,

    /// Mutation was attempted and failed.
    Failed(String),
}

/// Recorded decision of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: ActionKind,
    pub identifier: Option<String>,
    pub alias: Option<String>,
    pub outcome: Outcome,
}

/// Structured log of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    mode: RunMode,
    events: Vec<Event>,
}

impl Report {
    /// Construct new empty report.
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            events: Vec::new(),
        }
    }

    /// Record and log action with its outcome.
    pub fn record(&mut self, action: &Action, outcome: Outcome) {
        let would = if self.mode.is_dry_run() { "would " } else { "" };
        match (&outcome, action.kind()) {
            (Outcome::Failed(message), _) => error!("failed to {action}: {message}"),
            (_, ActionKind::Unchanged) => debug!("{action}"),
            (_, ActionKind::Skip | ActionKind::Stray) => warn!("{action}"),
            (_, ActionKind::Conflict | ActionKind::Unverifiable) => error!("{action}"),
            (_, _) => info!("{would}{action}"),
        }

        self.events.push(Event {
            kind: action.kind(),
            identifier: action.identifier().map(str::to_owned),
            alias: action.alias().map(str::to_owned),
            outcome,
        });
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn events(&self) -> &[Event] {
        self.events.as_slice()
    }

    /// Count recorded events of given kind.
    pub fn count(&self, kind: ActionKind) -> usize {
        self.events.iter().filter(|event| event.kind == kind).count()
    }

    /// Count mutations that were applied, or would be in a dry run.
    pub fn mutations(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event.outcome, Outcome::Applied | Outcome::Planned))
            .count()
    }

    /// Count mutations that failed.
    pub fn failures(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event.outcome, Outcome::Failed(_)))
            .count()
    }

    /// Log closing summary of the run.
    pub fn summarize(&self) {
        if self.failures() > 0 || self.count(ActionKind::Conflict) > 0 {
            warn!("{self}");
        } else {
            info!("{self}");
        }
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.mode.is_dry_run() {
            fmt.write_str("dry run: ")?;
        }

        write!(
            fmt,
            "{} created, {} renamed, {} repointed, {} unchanged, {} orphans removed, \
             {} conflicts, {} skipped, {} unverifiable, {} stray, {} failed",
            self.count(ActionKind::Create),
            self.count(ActionKind::Rename),
            self.count(ActionKind::Repoint),
            self.count(ActionKind::Unchanged),
            self.count(ActionKind::RemoveOrphan),
            self.count(ActionKind::Conflict),
            self.count(ActionKind::Skip),
            self.count(ActionKind::Unverifiable),
            self.count(ActionKind::Stray),
            self.failures(),
        )
    }
}
