// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use servlink::{lock::RunLock, path::config_path, Config, Reconciler, RunMode};

use anyhow::Result;
use clap::Parser;
use std::process::exit;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keep human-readable server aliases in sync with server volumes.
///
/// Paths and directory policy come from the configuration file, located
/// through $SERVLINK_CONFIG, then $XDG_CONFIG_HOME/servlink/config.toml, then
/// /etc/servlink/config.toml.
#[derive(Debug, Clone, Parser)]
#[command(about, long_about, version)]
struct Cli {
    /// Report every change that would be made without making it.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config = Config::load(config_path()?)?;

        // INVARIANT: Hold run lock until reconciliation finishes.
        let _lock = match &config.paths.lock_file {
            Some(path) => Some(RunLock::acquire(path)?),
            None => None,
        };

        let mode = if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Live
        };
        Reconciler::new(config).run(mode)?;

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}
