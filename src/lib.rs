pub mod backends;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod diff;
pub mod error;
pub mod export;
pub mod history;
pub mod ledger;
pub mod packages;
pub mod project_identity;
pub mod replay;
pub mod snapshot;
pub mod ui;
pub mod utils;

use clap::Parser;
use crate::core::CancelToken;
use std::process::exit;

/// Run the pkgtrail CLI entrypoint.
pub fn run_cli() {
    // Color settings first, before anything prints
    ui::init_colors();

    // Ctrl-C cancels in-flight backend commands; the engines record it
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        ui::mark_interrupted();
        handler_token.cancel();
        ui::warning("Operation cancelled by user.");
    }) {
        ui::warning(&format!("Could not install Ctrl-C handler: {}", e));
    }

    let args = cli::Cli::parse();
    ui::set_quiet(args.global.quiet);
    ui::set_verbose(args.global.verbose);

    if let Err(e) = cli::dispatcher::dispatch(&args, cancel) {
        ui::error(&format!("{}", e));
        exit(if ui::was_interrupted() { 130 } else { 1 });
    }
}
