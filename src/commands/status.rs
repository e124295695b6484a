use super::Session;
use crate::diff::detect_drift;
use crate::error::Result;
use crate::project_identity;
use crate::ui as output;
use colored::Colorize;

pub fn run(session: &Session) -> Result<()> {
    output::header("pkgtrail status");
    output::keyval("Data dir", &session.settings.data_dir.display().to_string());

    let ledger = session.ledger()?;
    let tags = ledger.tags()?;
    output::keyval("Ledger", &format!("{} actions", ledger.last_id()));
    if let Some(ts) = ledger.last_timestamp() {
        output::keyval("Last action", &ts.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    output::keyval("Tags", &tags.list().count().to_string());

    output::header("Backends");
    let registry = session.registry();
    let store = session.snapshots();
    let available = registry.detect_available();
    for backend in registry.backends() {
        let detected = available.get(&backend).copied().unwrap_or(false);
        let mark = if detected {
            "available".green()
        } else {
            "missing".bright_black()
        };
        let last = match store.latest(&backend)? {
            Some(snapshot) => format!(
                "{} packages at {}",
                snapshot.packages.len(),
                snapshot.timestamp.format("%Y-%m-%d %H:%M")
            ),
            None => "no snapshot".to_string(),
        };
        output::indent(&format!("{:<10} {:<10} {}", backend, mark, last), 1);
    }

    let latest = store.latest_all()?;
    if latest.is_empty() {
        output::info(&format!(
            "No snapshots yet; run '{}' to record what is installed",
            project_identity::cli_with("snapshot")
        ));
    }

    let state = ledger.state(None)?;
    let drift = detect_drift(&latest, &state);
    if drift.is_empty() {
        output::success("No drift between the ledger and the latest snapshots");
    } else {
        output::header("Drift");
        for item in &drift {
            output::warning(&item.to_string());
        }
    }

    Ok(())
}
