use super::Session;
use crate::config::load_target;
use crate::core::types::{ActionKind, Backend, PackageRef, Snapshot};
use crate::diff::{
    DiffResult, TargetSpec, detect_drift, diff, diff_against_ledger, diff_to_earlier_state,
};
use crate::error::{PkgtrailError, Result};
use crate::ledger::{ActionFilter, LedgerReader, LedgerState, LedgerView};
use crate::packages::BackendRegistry;
use crate::ui as output;
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum PlanSource {
    TargetFile(PathBuf),
    Tag(String),
    Ledger(PathBuf),
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub source: PlanSource,
    pub keep_unlisted: bool,
    pub pin: bool,
    pub cached: bool,
}

#[derive(Debug)]
pub struct PreviewOptions {
    pub plan: PlanOptions,
    pub json: bool,
}

/// Preview only: reads the ledger without taking its lock.
pub fn run(session: &Session, options: PreviewOptions) -> Result<()> {
    let view = LedgerView::new(session.settings.ledger_dir());
    let registry = session.registry();
    let result = plan(session, &view, &registry, &options.plan)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_diff(&result);
    }
    Ok(())
}

enum Target {
    Packages(Vec<PackageRef>),
    State(LedgerState),
    /// An earlier point of this machine's own ledger
    Earlier(LedgerState),
}

/// Diff the current machine against the requested target. Drift is always
/// reported against this machine's own ledger.
pub fn plan(
    session: &Session,
    ledger: &LedgerView,
    registry: &BackendRegistry,
    options: &PlanOptions,
) -> Result<DiffResult> {
    let mut diff_options = session.settings.diff_options();
    diff_options.keep_unlisted = options.keep_unlisted;
    diff_options.pin_versions |= options.pin;

    let own_state = ledger.state(None)?;
    let target = match &options.source {
        PlanSource::TargetFile(path) => Target::Packages(load_target(path)?),
        PlanSource::Tag(name) => {
            let id = ledger.tags()?.resolve(name)?;
            Target::Earlier(ledger.state(Some(id))?)
        }
        PlanSource::Ledger(path) => Target::State(LedgerState::from_actions(
            LedgerReader::open(path, ActionFilter::all())?,
        )?),
    };

    let mut backends: BTreeSet<Backend> = own_state.entries().map(|(id, _)| id.backend.clone()).collect();
    match &target {
        Target::Packages(packages) => backends.extend(packages.iter().map(|p| p.backend.clone())),
        Target::State(state) | Target::Earlier(state) => {
            backends.extend(state.entries().map(|(id, _)| id.backend.clone()))
        }
    }

    let from = current_snapshots(session, registry, &backends, options.cached)?;

    let mut result = match target {
        Target::Packages(packages) => diff(&from, &TargetSpec::Packages(packages), &diff_options),
        Target::State(state) => diff_against_ledger(&from, &state, &diff_options),
        Target::Earlier(state) => diff_to_earlier_state(&from, &state, &own_state, &diff_options),
    };
    result.drift = detect_drift(&from, &own_state);
    Ok(result)
}

fn current_snapshots(
    session: &Session,
    registry: &BackendRegistry,
    backends: &BTreeSet<Backend>,
    cached: bool,
) -> Result<Vec<Snapshot>> {
    let store = session.snapshots();

    if cached {
        let mut snapshots = Vec::new();
        for backend in backends {
            match store.latest(backend)? {
                Some(snapshot) => snapshots.push(snapshot),
                None => output::warning(&format!("{}: no stored snapshot, treated as empty", backend)),
            }
        }
        return Ok(snapshots);
    }

    let (known, unknown): (Vec<Backend>, Vec<Backend>) =
        backends.iter().cloned().partition(|b| registry.has_backend(b));
    for backend in unknown {
        output::warning(&format!("{}: no adapter registered", backend));
    }

    let report = store.capture_backends(registry, &known);
    for backend in &report.unavailable {
        output::warning(&format!("{}: not available on this machine, treated as empty", backend));
    }
    if let Some((_, err)) = report.failed.into_iter().next() {
        return Err(err);
    }
    Ok(report.captured)
}

pub fn print_diff(result: &DiffResult) {
    for shared in &result.shared_names {
        let backends: Vec<String> = shared.backends.iter().map(ToString::to_string).collect();
        output::info(&format!(
            "'{}' exists under several backends ({}); they are tracked separately",
            shared.name,
            backends.join(", ")
        ));
    }

    for drift in &result.drift {
        output::warning(&format!("drift: {}", drift));
    }

    if result.is_empty() {
        output::success("Nothing to do");
        return;
    }

    output::header("Planned actions");
    for action in &result.actions {
        let sign = match action.kind {
            ActionKind::Install => "+".green().bold(),
            ActionKind::Upgrade => "~".yellow().bold(),
            ActionKind::Remove => "-".red().bold(),
        };
        output::indent(&format!("{} {}", sign, action), 1);
    }
    output::separator();
    output::keyval(
        "Summary",
        &format!(
            "{} install, {} upgrade, {} remove",
            result.count(ActionKind::Install),
            result.count(ActionKind::Upgrade),
            result.count(ActionKind::Remove)
        ),
    );
}

impl PlanSource {
    pub fn from_args(
        target: Option<PathBuf>,
        tag: Option<String>,
        ledger: Option<PathBuf>,
    ) -> Result<PlanSource> {
        match (target, tag, ledger) {
            (Some(path), None, None) => Ok(PlanSource::TargetFile(path)),
            (None, Some(tag), None) => Ok(PlanSource::Tag(tag)),
            (None, None, Some(path)) => Ok(PlanSource::Ledger(path)),
            _ => Err(PkgtrailError::ConfigError(
                "exactly one of --target, --tag or --ledger is required".to_string(),
            )),
        }
    }
}
