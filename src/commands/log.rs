use super::Session;
use crate::core::types::{Action, ActionKind, Outcome};
use crate::error::{PkgtrailError, Result};
use crate::ledger::{ActionFilter, LedgerReader};
use crate::ui as output;
use crate::utils::paths;
use chrono::{DateTime, NaiveDate, Utc};
use colored::Colorize;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct LogOptions {
    pub backend: Option<String>,
    pub package: Option<String>,
    pub kind: Option<String>,
    pub outcome: Option<String>,
    pub since: Option<String>,
    pub limit: Option<usize>,
    pub json: bool,
}

/// Reads without taking the ledger lock, so it works while another
/// pkgtrail process is applying.
pub fn run(session: &Session, options: LogOptions) -> Result<()> {
    let mut filter = ActionFilter::all();
    if let Some(backend) = &options.backend {
        filter = filter.backend(backend.as_str());
    }
    if let Some(package) = &options.package {
        filter = filter.package(package);
    }
    if let Some(kind) = &options.kind {
        filter = filter.kind(kind.parse::<ActionKind>()?);
    }
    if let Some(outcome) = &options.outcome {
        filter = filter.outcome(outcome.parse::<Outcome>()?);
    }
    if let Some(since) = &options.since {
        filter = filter.since(parse_since(since)?);
    }

    let path = paths::ledger_file(&session.settings.data_dir);
    if !path.exists() {
        output::info("Ledger is empty");
        return Ok(());
    }

    let limit = options.limit.unwrap_or(usize::MAX);
    let mut actions: VecDeque<Action> = VecDeque::new();
    for action in LedgerReader::open(&path, filter)? {
        actions.push_back(action?);
        if actions.len() > limit {
            actions.pop_front();
        }
    }

    if options.json {
        for action in &actions {
            println!("{}", serde_json::to_string(action)?);
        }
        return Ok(());
    }

    if actions.is_empty() {
        output::info("No matching actions");
        return Ok(());
    }
    for action in &actions {
        println!("{}", format_action(action));
    }
    Ok(())
}

fn format_action(action: &Action) -> String {
    let outcome = match action.outcome {
        Outcome::Success => action.outcome.to_string().green(),
        Outcome::Skipped => action.outcome.to_string().bright_black(),
        Outcome::Failed => action.outcome.to_string().red(),
    };
    let mut line = format!(
        "#{:<5} {}  {:<8} {:<40} {}",
        action.id,
        action.timestamp.format("%Y-%m-%d %H:%M:%S"),
        action.kind.to_string(),
        action.package_ref().to_string(),
        outcome
    );
    if let Some(version) = &action.result_version
        && action.requested_version.as_ref() != Some(version)
    {
        line.push_str(&format!(" -> {}", version));
    }
    if let Some(detail) = &action.error_detail {
        line.push_str(&format!("  {}", detail.bright_black()));
    }
    line
}

/// `YYYY-MM-DD` (midnight UTC) or RFC 3339
fn parse_since(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PkgtrailError::ConfigError(format!("invalid --since '{}': {}", value, e)))
}
