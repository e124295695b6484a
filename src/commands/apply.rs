use super::Session;
use super::diff::{PlanOptions, PlanSource, plan, print_diff};
use crate::core::types::Action;
use crate::error::Result;
use crate::ledger::{ActionFilter, LedgerReader};
use crate::replay::{ReplayEngine, ReplayMode, ReplayReport};
use crate::ui as output;

#[derive(Debug)]
pub struct ApplyOptions {
    pub plan: PlanOptions,
    pub strict: bool,
    /// Replay another ledger's actions in recorded order
    pub sequence: bool,
    pub dry_run: bool,
}

pub fn run(session: &Session, options: ApplyOptions) -> Result<()> {
    let ledger = session.ledger()?;
    let registry = session.registry();
    let store = session.snapshots();

    let mut replay_options = session.settings.replay_options();
    if options.strict {
        replay_options.mode = ReplayMode::Strict;
    }
    replay_options.pin_versions |= options.plan.pin;

    let engine = ReplayEngine::new(&registry, &ledger, replay_options)
        .with_snapshots(&store)
        .with_cancel(session.cancel.clone());

    let report = match (&options.plan.source, options.sequence) {
        (PlanSource::Ledger(path), true) => {
            let actions = LedgerReader::open(path, ActionFilter::all())?
                .collect::<Result<Vec<Action>>>()?;
            output::info(&format!(
                "Replaying {} recorded actions from {}",
                actions.len(),
                path.display()
            ));
            if options.dry_run {
                for action in &actions {
                    output::indent(
                        &format!("#{} {} {} ({})", action.id, action.kind, action.package_ref(), action.outcome),
                        1,
                    );
                }
                return Ok(());
            }
            engine.replay_ledger(&actions)?
        }
        _ => {
            let result = plan(session, &ledger.view(), &registry, &options.plan)?;
            print_diff(&result);
            if options.dry_run || result.is_empty() {
                return Ok(());
            }
            engine.replay_diff(&result)?
        }
    };

    print_report(&report);
    report.ensure_success()
}

pub fn print_report(report: &ReplayReport) {
    output::separator();
    output::keyval(
        "Result",
        &format!(
            "{} applied, {} skipped, {} failed",
            report.applied,
            report.skipped,
            report.failed.len()
        ),
    );
    for failure in &report.failed {
        output::error(&format!(
            "{} {}: {}",
            failure.action.kind,
            failure.action.package_ref(),
            failure.detail
        ));
    }
    let not_started = report.not_started();
    if report.cancelled {
        output::warning(&format!("Cancelled; {} actions not started", not_started));
    } else if report.aborted {
        output::warning(&format!("Stopped after a failure; {} actions not started", not_started));
    }
    for snapshot in &report.snapshots {
        output::verbose(&format!(
            "re-snapshotted {} ({} packages)",
            snapshot.backend,
            snapshot.packages.len()
        ));
    }
}
