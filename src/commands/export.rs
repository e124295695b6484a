use super::Session;
use crate::error::{PkgtrailError, Result};
use crate::export::{install_script, result_view, write_script};
use crate::ui as output;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Script,
    Result,
}

#[derive(Debug)]
pub struct ExportOptions {
    pub kind: ExportKind,
    pub tag: Option<String>,
    pub output: Option<PathBuf>,
    pub pin: bool,
}

pub fn run(session: &Session, options: ExportOptions) -> Result<()> {
    let ledger = session.ledger()?;
    let (up_to, label) = match &options.tag {
        Some(tag) => (Some(ledger.tags()?.resolve(tag)?), format!("tag: {}", tag)),
        None => (None, "current state".to_string()),
    };
    let state = ledger.state(up_to)?;

    let content = match options.kind {
        ExportKind::Script => {
            let pin = options.pin || session.settings.pin_versions;
            let script = install_script(&state, &session.registry(), &label, pin);
            for (package, reason) in &script.omitted {
                output::warning(&format!("{} left out: {}", package, reason));
            }
            script.content
        }
        ExportKind::Result => result_view(&state, &label),
    };

    match (&options.output, options.kind) {
        (Some(path), ExportKind::Script) => {
            write_script(path, &content)?;
            output::success(&format!("Wrote {}", path.display()));
        }
        (Some(path), ExportKind::Result) => {
            std::fs::write(path, content).map_err(|e| PkgtrailError::IoError {
                path: path.clone(),
                source: e,
            })?;
            output::success(&format!("Wrote {}", path.display()));
        }
        (None, _) => print!("{}", content),
    }
    Ok(())
}
