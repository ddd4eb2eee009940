// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Human-readable aliases for identifier-keyed server volumes.
//!
//! Game server panels like Pterodactyl and Pelican keep every server's files
//! in a volume directory named by the server's UUID. Servlink maintains a
//! directory of symbolic links named after each server's current name, and
//! keeps it in sync as servers are renamed, created, and deleted.
//!
//! See [`reconcile`] for how a reconciliation pass works.

pub mod alias;
pub mod config;
pub mod filter;
pub mod lock;
pub mod path;
pub mod reconcile;
pub mod scan;
pub mod steward;

pub use crate::{
    config::Config,
    reconcile::{Reconciler, RunMode},
};
