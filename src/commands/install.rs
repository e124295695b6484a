use super::Session;
use crate::core::types::{ActionKind, Backend, Outcome, PackageRef};
use crate::error::{PkgtrailError, Result};
use crate::replay::ReplayEngine;
use crate::ui as output;

#[derive(Debug)]
pub struct InstallOptions {
    pub packages: Vec<String>,
    pub backend: Option<String>,
    /// `Install` or `Remove`
    pub kind: ActionKind,
}

/// Install or remove packages one by one, logging each attempt.
/// Every package is attempted; the first failure is returned at the end.
pub fn run(session: &Session, options: InstallOptions) -> Result<()> {
    let default_backend = options
        .backend
        .as_deref()
        .map(Backend::new)
        .unwrap_or_else(|| session.settings.default_backend.clone());

    let mut packages = Vec::with_capacity(options.packages.len());
    for spec in &options.packages {
        let mut package = PackageRef::parse(spec, &default_backend)?;
        if options.kind == ActionKind::Remove && package.version.take().is_some() {
            output::warning(&format!("{}: version ignored for remove", spec));
        }
        packages.push(package);
    }

    let ledger = session.ledger()?;
    let registry = session.registry();
    let store = session.snapshots();
    let engine = ReplayEngine::new(&registry, &ledger, session.settings.replay_options())
        .with_snapshots(&store)
        .with_cancel(session.cancel.clone());

    let mut first_failure = None;
    for package in &packages {
        if session.cancel.is_cancelled() {
            return Err(PkgtrailError::Cancelled);
        }

        let action = engine.apply_one(options.kind, package)?;
        let label = format!("{} {}", action.kind, package);
        match action.outcome {
            Outcome::Success => output::success(&match &action.result_version {
                Some(version) => format!("{} ({})", label, version),
                None => label,
            }),
            Outcome::Skipped => output::info(&format!("{}: nothing to do", label)),
            Outcome::Failed => {
                let detail = action.error_detail.clone().unwrap_or_default();
                output::error(&format!("{}: {}", label, detail));
                first_failure.get_or_insert(PkgtrailError::ActionFailed {
                    kind: action.kind.to_string(),
                    backend: action.backend.to_string(),
                    package: action.package.clone(),
                    detail,
                });
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
