use super::Session;
use crate::error::Result;
use crate::history::apt;
use crate::ui as output;
use std::path::PathBuf;

#[derive(Debug)]
pub struct ImportOptions {
    pub path: Option<PathBuf>,
}

pub fn run(session: &Session, options: ImportOptions) -> Result<()> {
    let path = options
        .path
        .unwrap_or_else(|| PathBuf::from(apt::DEFAULT_LOG));
    let ledger = session.ledger()?;
    let report = apt::import_file(&ledger, &path)?;

    output::success(&format!(
        "Imported {} actions from {}",
        report.imported,
        path.display()
    ));
    if report.already_recorded > 0 {
        output::info(&format!(
            "{} entries were not newer than the ledger and were skipped",
            report.already_recorded
        ));
    }
    output::verbose(&format!("{} automatic dependencies ignored", report.automatic));
    ledger.close()
}
