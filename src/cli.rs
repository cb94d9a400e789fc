use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;

use crate::services::batch::BatchOptions;

/// Top-level CLI struct. Without a subcommand, runs one batch and exits.
#[derive(Debug, Parser)]
#[command(
    name = "climate-collector",
    version,
    about = "Collect historical NOAA weather observations for active cities"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Process only the first N active cities (0 = all) [default: 0]
    #[arg(long)]
    pub limit: Option<usize>,

    /// Fetch even when data for the date window already exists, replacing it.
    #[arg(long)]
    pub force: bool,

    /// Retries per city after the first failed attempt [default: 1]
    #[arg(long)]
    pub retries: Option<u32>,

    /// Cities processed at the same time [default: 3]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// Also append logs to a dated file in this directory (overrides LOG_DIR).
    #[arg(long, global = true)]
    pub log_dir: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a batch every day at DAILY_RUN_HOUR and serve the status API on PORT.
    /// Uses fixed batch settings; the one-off batch flags are rejected.
    Daily,
}

impl Cli {
    /// Parse `args`, rejecting flag combinations clap can't express.
    pub fn try_parse_checked<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Self::try_parse_from(args)?;
        cli.check_mode()?;
        Ok(cli)
    }

    /// The daily runner has its own settings, so batch flags can't be
    /// combined with it.
    fn check_mode(&self) -> Result<(), clap::Error> {
        let batch_flags_given = self.limit.is_some()
            || self.force
            || self.retries.is_some()
            || self.concurrency.is_some();

        if matches!(self.command, Some(Command::Daily)) && batch_flags_given {
            return Err(Self::command().error(
                ErrorKind::ArgumentConflict,
                "--limit, --force, --retries and --concurrency only apply to a one-off batch, not to `daily`",
            ));
        }
        Ok(())
    }

    /// Options for a one-off batch run.
    pub fn batch_options(&self) -> BatchOptions {
        let defaults = BatchOptions::default();
        BatchOptions {
            limit: self.limit.unwrap_or(defaults.limit),
            skip_existing: !self.force,
            max_retries: self.retries.unwrap_or(defaults.max_retries),
            concurrency: self
                .concurrency
                .map_or(defaults.concurrency, |c| c as usize),
        }
    }
}
