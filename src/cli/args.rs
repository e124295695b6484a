use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pkgtrail",
    about = "Track package installs across package managers and replay them elsewhere",
    long_about = "Records every install/remove made through apt, yum, brew, pip and friends in an \
append-only ledger, snapshots what is installed, and diffs or replays that history on another machine",
    version,
    next_line_help = false,
    term_width = 80
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Quiet mode
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Settings file (default: <config dir>/pkgtrail.kdl)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Ledger and snapshot directory, overriding settings
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,
}

/// Where a diff or apply should end up. Exactly one source.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// KDL package list (`apt { curl "8.0"; jq }`)
    #[arg(long, short = 't', value_name = "FILE")]
    pub target: Option<PathBuf>,

    /// State of this ledger at a tag
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Final state of another machine's ledger file
    #[arg(long, value_name = "FILE")]
    pub ledger: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: TargetArgs,

    /// Never propose removing packages missing from a target file
    #[arg(long)]
    pub keep_unlisted: bool,

    /// Request the exact versions a ledger resolved
    #[arg(long)]
    pub pin: bool,

    /// Use the latest stored snapshots instead of listing backends now
    #[arg(long)]
    pub cached: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show ledger, snapshot and backend status, plus drift
    Status,

    /// Record what is installed now
    Snapshot {
        /// Backends to capture (default: every available one)
        backends: Vec<String>,
    },

    /// Preview the actions that would reach a target
    Diff {
        #[command(flatten)]
        plan: PlanArgs,

        /// Print the diff as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply the actions that reach a target, logging each attempt
    Apply {
        #[command(flatten)]
        plan: PlanArgs,

        /// Stop at the first failed action
        #[arg(long)]
        strict: bool,

        /// With --ledger: replay its actions in recorded order instead of diffing
        #[arg(long, requires = "ledger")]
        sequence: bool,

        /// Show the plan without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Install packages (`backend:name@version`, or a bare name for the default backend)
    Install {
        #[arg(required = true, value_name = "PACKAGE")]
        packages: Vec<String>,

        /// Backend for bare names
        #[arg(long, short = 'b')]
        backend: Option<String>,
    },

    /// Remove packages
    Remove {
        #[arg(required = true, value_name = "PACKAGE")]
        packages: Vec<String>,

        /// Backend for bare names
        #[arg(long, short = 'b')]
        backend: Option<String>,
    },

    /// Show recorded actions
    Log {
        #[arg(long, short = 'b')]
        backend: Option<String>,

        #[arg(long, short = 'p')]
        package: Option<String>,

        /// install, remove or upgrade
        #[arg(long)]
        kind: Option<String>,

        /// success, failed or skipped
        #[arg(long)]
        outcome: Option<String>,

        /// Only actions at or after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_name = "DATE")]
        since: Option<String>,

        /// Only the last N matching actions
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Name points in the ledger
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },

    /// Export the ledger state as an install script or a package table
    Export {
        #[arg(long, short = 'f', value_enum, default_value_t = ExportFormat::Script)]
        format: ExportFormat,

        /// Export the state at this tag
        #[arg(long)]
        tag: Option<String>,

        /// Write to a file instead of stdout
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,

        /// Use the versions the ledger resolved
        #[arg(long)]
        pin: bool,
    },

    /// Import explicit installs and removals from apt's history log
    ImportApt {
        /// Log file (default: /var/log/apt/history.log)
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    /// Tag the current end of the ledger
    Add {
        name: String,

        /// Tag this action id instead
        #[arg(long)]
        at: Option<u64>,
    },
    /// Delete a tag
    Remove { name: String },
    /// List tags
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// `#!/bin/sh` reinstall script
    Script,
    /// Human-readable package table
    Result,
}

#[cfg(test)]
mod tests;
