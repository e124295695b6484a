use super::Session;
use crate::error::{PkgtrailError, Result};
use crate::ui as output;

#[derive(Debug)]
pub enum TagAction {
    Add { name: String, at: Option<u64> },
    Remove { name: String },
    List,
}

pub fn run(session: &Session, action: TagAction) -> Result<()> {
    let ledger = session.ledger()?;
    let mut tags = ledger.tags()?;

    match action {
        TagAction::Add { name, at } => {
            let id = at.unwrap_or_else(|| ledger.last_id());
            if id > ledger.last_id() {
                return Err(PkgtrailError::TargetNotFound(format!("action #{}", id)));
            }
            tags.add(&name, id)?;
            output::success(&format!("Tagged #{} as '{}'", id, name));
        }
        TagAction::Remove { name } => {
            let tag = tags.remove(&name)?;
            output::success(&format!("Removed tag '{}' (was #{})", name, tag.id));
        }
        TagAction::List => {
            if tags.is_empty() {
                output::info("No tags");
            }
            for (name, tag) in tags.list() {
                println!(
                    "{:<20} #{:<6} {}",
                    name,
                    tag.id,
                    tag.created.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
    Ok(())
}
