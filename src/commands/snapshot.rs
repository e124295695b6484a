use super::Session;
use crate::core::types::Backend;
use crate::error::{PkgtrailError, Result};
use crate::ui as output;

#[derive(Debug)]
pub struct SnapshotOptions {
    pub backends: Vec<String>,
}

pub fn run(session: &Session, options: SnapshotOptions) -> Result<()> {
    let registry = session.registry();
    let store = session.snapshots();

    let report = if options.backends.is_empty() {
        store.capture_all(&registry)
    } else {
        let backends: Vec<Backend> = options.backends.iter().map(|b| Backend::new(b)).collect();
        if let Some(unknown) = backends.iter().find(|b| !registry.has_backend(b)) {
            return Err(PkgtrailError::TargetNotFound(format!("backend '{}'", unknown)));
        }
        store.capture_backends(&registry, &backends)
    };

    for snapshot in &report.captured {
        output::success(&format!(
            "{}: {} packages",
            snapshot.backend,
            snapshot.packages.len()
        ));
    }
    for backend in &report.unavailable {
        output::verbose(&format!("{}: not available, skipped", backend));
    }

    if let Some((_, err)) = report.failed.into_iter().next() {
        return Err(err);
    }
    if report.captured.is_empty() {
        output::warning("No backend available to snapshot");
    }
    Ok(())
}
