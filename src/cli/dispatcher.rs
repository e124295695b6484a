//! Command dispatcher
//!
//! Loads settings, applies global overrides and routes each subcommand to
//! its handler in `commands`.

use crate::cli::args::{Cli, Command, ExportFormat, PlanArgs, TagCommand};
use crate::commands::{
    self, Session,
    diff::{PlanOptions, PlanSource},
};
use crate::config::Settings;
use crate::core::CancelToken;
use crate::core::types::ActionKind;
use crate::error::Result;
use crate::utils::paths;

pub fn dispatch(args: &Cli, cancel: CancelToken) -> Result<()> {
    let session = Session::new(load_settings(args)?, cancel);

    match &args.command {
        Command::Status => commands::status::run(&session),

        Command::Snapshot { backends } => commands::snapshot::run(
            &session,
            commands::snapshot::SnapshotOptions {
                backends: backends.clone(),
            },
        ),

        Command::Diff { plan, json } => commands::diff::run(
            &session,
            commands::diff::PreviewOptions {
                plan: plan_options(plan)?,
                json: *json,
            },
        ),

        Command::Apply {
            plan,
            strict,
            sequence,
            dry_run,
        } => commands::apply::run(
            &session,
            commands::apply::ApplyOptions {
                plan: plan_options(plan)?,
                strict: *strict,
                sequence: *sequence,
                dry_run: *dry_run,
            },
        ),

        Command::Install { packages, backend } => commands::install::run(
            &session,
            commands::install::InstallOptions {
                packages: packages.clone(),
                backend: backend.clone(),
                kind: ActionKind::Install,
            },
        ),

        Command::Remove { packages, backend } => commands::install::run(
            &session,
            commands::install::InstallOptions {
                packages: packages.clone(),
                backend: backend.clone(),
                kind: ActionKind::Remove,
            },
        ),

        Command::Log {
            backend,
            package,
            kind,
            outcome,
            since,
            limit,
            json,
        } => commands::log::run(
            &session,
            commands::log::LogOptions {
                backend: backend.clone(),
                package: package.clone(),
                kind: kind.clone(),
                outcome: outcome.clone(),
                since: since.clone(),
                limit: *limit,
                json: *json,
            },
        ),

        Command::Tag { command } => {
            let action = match command {
                TagCommand::Add { name, at } => commands::tag::TagAction::Add {
                    name: name.clone(),
                    at: *at,
                },
                TagCommand::Remove { name } => commands::tag::TagAction::Remove { name: name.clone() },
                TagCommand::List => commands::tag::TagAction::List,
            };
            commands::tag::run(&session, action)
        }

        Command::Export {
            format,
            tag,
            output,
            pin,
        } => commands::export::run(
            &session,
            commands::export::ExportOptions {
                kind: match format {
                    ExportFormat::Script => commands::export::ExportKind::Script,
                    ExportFormat::Result => commands::export::ExportKind::Result,
                },
                tag: tag.clone(),
                output: output.clone(),
                pin: *pin,
            },
        ),

        Command::ImportApt { path } => commands::import::run(
            &session,
            commands::import::ImportOptions { path: path.clone() },
        ),
    }
}

/// `--config` picks the file; `--data-dir` beats both the file and
/// `$PKGTRAIL_DATA_DIR`.
fn load_settings(args: &Cli) -> Result<Settings> {
    let mut settings = match &args.global.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(dir) = &args.global.data_dir {
        settings.data_dir = paths::expand_home(dir)?;
    }
    Ok(settings)
}

fn plan_options(args: &PlanArgs) -> Result<PlanOptions> {
    Ok(PlanOptions {
        source: PlanSource::from_args(
            args.source.target.clone(),
            args.source.tag.clone(),
            args.source.ledger.clone(),
        )?,
        keep_unlisted: args.keep_unlisted,
        pin: args.pin,
        cached: args.cached,
    })
}
