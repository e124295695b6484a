use super::*;
use crate::core::types::{Action, InstalledPackages, Outcome};
use crate::packages::PackageManager;
use crate::packages::testing::FakeManager;
use chrono::{Duration, Utc};

fn snapshot(backend: &str, entries: &[(&str, Option<&str>)]) -> Snapshot {
    let packages: InstalledPackages = entries
        .iter()
        .map(|(name, version)| (name.to_string(), version.map(str::to_string)))
        .collect();
    Snapshot::new(Backend::from(backend), packages)
}

fn pkg(backend: &str, name: &str, version: Option<&str>) -> PackageRef {
    PackageRef::new(backend, name, version)
}

fn rendered(result: &DiffResult) -> Vec<String> {
    result.actions.iter().map(|a| a.to_string()).collect()
}

#[test]
fn upgrade_and_fresh_install() {
    let from = vec![snapshot("apt", &[("curl", Some("7.81"))])];
    let to = TargetSpec::Packages(vec![
        pkg("apt", "curl", Some("8.0")),
        pkg("apt", "jq", None),
    ]);

    let result = diff(&from, &to, &DiffOptions::default());
    assert_eq!(
        rendered(&result),
        vec!["install apt:jq", "upgrade apt:curl@8.0 (from 7.81)"]
    );
}

#[test]
fn unspecified_version_keeps_installed() {
    let from = vec![snapshot("apt", &[("curl", Some("7.81"))])];
    let to = TargetSpec::Packages(vec![pkg("apt", "curl", None)]);
    assert!(diff(&from, &to, &DiffOptions::default()).is_empty());
}

#[test]
fn segment_prefix_counts_as_same_version() {
    let from = vec![snapshot("apt", &[("curl", Some("8.0-1ubuntu1"))])];
    let to = TargetSpec::Packages(vec![pkg("apt", "curl", Some("8.0"))]);
    assert!(diff(&from, &to, &DiffOptions::default()).is_empty());
}

#[test]
fn unknown_installed_version_is_upgraded_when_pinned() {
    let from = vec![snapshot("pip", &[("requests", None)])];
    let to = TargetSpec::Packages(vec![pkg("pip", "requests", Some("2.31.0"))]);
    let result = diff(&from, &to, &DiffOptions::default());
    assert_eq!(result.count(ActionKind::Upgrade), 1);
}

#[test]
fn installs_come_before_removes_by_default() {
    let from = vec![snapshot("apt", &[("vim", Some("9.0")), ("nano", Some("7.2"))])];
    let to = TargetSpec::Packages(vec![pkg("apt", "vim", None), pkg("apt", "neovim", None)]);

    let result = diff(&from, &to, &DiffOptions::default());
    assert_eq!(rendered(&result), vec!["install apt:neovim", "remove apt:nano"]);

    let remove_first = DiffOptions {
        order: DiffOrder::RemoveFirst,
        ..Default::default()
    };
    let result = diff(&from, &to, &remove_first);
    assert_eq!(rendered(&result), vec!["remove apt:nano", "install apt:neovim"]);
}

#[test]
fn keep_unlisted_suppresses_removes() {
    let from = vec![snapshot("apt", &[("nano", Some("7.2"))])];
    let to = TargetSpec::Packages(vec![pkg("apt", "jq", None)]);
    let options = DiffOptions {
        keep_unlisted: true,
        ..Default::default()
    };
    assert_eq!(rendered(&diff(&from, &to, &options)), vec!["install apt:jq"]);
}

#[test]
fn untargeted_backends_are_untouched() {
    let from = vec![
        snapshot("apt", &[("curl", Some("8.0"))]),
        snapshot("brew", &[("wget", Some("1.24"))]),
    ];
    let to = TargetSpec::Snapshot(snapshot("apt", &[("curl", Some("8.0"))]));
    assert!(diff(&from, &to, &DiffOptions::default()).is_empty());
}

#[test]
fn missing_source_snapshot_is_treated_as_empty() {
    let to = TargetSpec::Packages(vec![pkg("npm", "typescript", Some("5.4.5"))]);
    let result = diff(&[], &to, &DiffOptions::default());
    assert_eq!(rendered(&result), vec!["install npm:typescript@5.4.5"]);
}

#[test]
fn backends_follow_precedence() {
    let to = TargetSpec::Packages(vec![
        pkg("apt", "curl", None),
        pkg("brew", "wget", None),
        pkg("pip", "black", None),
    ]);
    let options = DiffOptions {
        precedence: vec![Backend::from("pip")],
        ..Default::default()
    };
    assert_eq!(
        rendered(&diff(&[], &to, &options)),
        vec!["install pip:black", "install apt:curl", "install brew:wget"]
    );
}

#[test]
fn same_name_under_two_backends_is_reported_not_merged() {
    let from = vec![snapshot("apt", &[("requests", Some("2.25.1"))])];
    let to = TargetSpec::Packages(vec![pkg("pip", "requests", Some("2.31.0"))]);

    let result = diff(&from, &to, &DiffOptions::default());
    assert_eq!(rendered(&result), vec!["install pip:requests@2.31.0"]);
    assert_eq!(result.shared_names.len(), 1);
    assert_eq!(
        result.shared_names[0].backends,
        vec![Backend::from("apt"), Backend::from("pip")]
    );
}

#[test]
fn applying_a_snapshot_diff_reaches_the_target() {
    let start = FakeManager::new("apt")
        .with_package("curl", "7.81")
        .with_package("nano", "7.2")
        .with_package("git", "2.43");
    let target = snapshot(
        "apt",
        &[("curl", Some("8.0")), ("git", Some("2.43")), ("jq", Some("1.7"))],
    );

    let from = vec![start.list().unwrap()];
    let result = diff(&from, &TargetSpec::Snapshot(target.clone()), &DiffOptions::default());

    for action in &result.actions {
        let outcome = match action.kind {
            ActionKind::Remove => start.remove(&action.package.name),
            _ => start.install(&action.package.name, action.package.version.as_deref()),
        };
        assert!(!outcome.is_failure());
    }
    assert_eq!(start.installed(), target.packages);
}

fn recorded(id: u64, kind: ActionKind, name: &str, version: Option<&str>) -> Action {
    Action {
        id,
        timestamp: Utc::now() - Duration::minutes(10),
        backend: Backend::from("apt"),
        kind,
        package: name.to_string(),
        requested_version: None,
        result_version: version.map(str::to_string),
        outcome: Outcome::Success,
        error_detail: None,
    }
}

#[test]
fn ledger_diff_only_removes_what_the_ledger_removed() {
    let mut state = LedgerState::new();
    state.apply(&recorded(1, ActionKind::Install, "jq", Some("1.7")));
    state.apply(&recorded(2, ActionKind::Install, "nano", Some("7.2")));
    state.apply(&recorded(3, ActionKind::Remove, "nano", None));

    let from = vec![snapshot(
        "apt",
        &[("nano", Some("7.2")), ("bash", Some("5.2"))],
    )];
    let result = diff_against_ledger(&from, &state, &DiffOptions::default());

    assert_eq!(rendered(&result), vec!["install apt:jq", "remove apt:nano"]);
}

#[test]
fn drift_is_surfaced() {
    let mut state = LedgerState::new();
    state.apply(&recorded(1, ActionKind::Install, "curl", Some("8.0")));
    state.apply(&recorded(2, ActionKind::Install, "jq", Some("1.7")));
    state.apply(&recorded(3, ActionKind::Install, "nano", Some("7.2")));
    state.apply(&recorded(4, ActionKind::Remove, "nano", None));

    let from = vec![snapshot(
        "apt",
        &[("curl", Some("7.81")), ("nano", Some("7.2"))],
    )];
    let result = diff_against_ledger(&from, &state, &DiffOptions::default());

    let kinds: Vec<(&str, &DriftKind)> = result
        .drift
        .iter()
        .map(|d| (d.package.name.as_str(), &d.kind))
        .collect();
    assert_eq!(kinds.len(), 3);
    assert!(kinds.contains(&("jq", &DriftKind::Missing)));
    assert!(kinds.contains(&(
        "curl",
        &DriftKind::VersionChanged {
            expected: "8.0".to_string(),
            found: "7.81".to_string()
        }
    )));
    assert!(matches!(
        kinds.iter().find(|(name, _)| *name == "nano").unwrap().1,
        DriftKind::Reappeared { .. }
    ));
}

#[test]
fn snapshots_older_than_the_ledger_do_not_drift() {
    let mut old = snapshot("apt", &[]);
    old.timestamp = Utc::now() - Duration::days(1);

    let mut state = LedgerState::new();
    state.apply(&recorded(1, ActionKind::Install, "jq", Some("1.7")));

    assert!(detect_drift(&[old], &state).is_empty());
}

#[test]
fn rolling_back_to_a_tag_removes_what_was_installed_since() {
    let jq = recorded(1, ActionKind::Install, "jq", Some("1.7"));
    let htop = recorded(2, ActionKind::Install, "htop", Some("3.3"));

    let mut tagged = LedgerState::new();
    tagged.apply(&jq);
    let mut current = tagged.clone();
    current.apply(&htop);

    let from = vec![snapshot(
        "apt",
        &[("jq", Some("1.7")), ("htop", Some("3.3")), ("bash", Some("5.2"))],
    )];
    let result = diff_to_earlier_state(&from, &tagged, &current, &DiffOptions::default());
    assert_eq!(rendered(&result), vec!["remove apt:htop"]);
    assert!(result.drift.is_empty());

    // The plain ledger diff leaves htop alone: that state never removed it
    let plain = diff_against_ledger(&from, &tagged, &DiffOptions::default());
    assert!(plain.actions.is_empty());
}

#[test]
fn keep_unlisted_also_holds_for_ledger_targets() {
    let mut state = LedgerState::new();
    state.apply(&recorded(1, ActionKind::Install, "nano", Some("7.2")));
    state.apply(&recorded(2, ActionKind::Remove, "nano", None));

    let from = vec![snapshot("apt", &[("nano", Some("7.2"))])];
    let options = DiffOptions {
        keep_unlisted: true,
        ..Default::default()
    };
    assert!(diff_against_ledger(&from, &state, &options).actions.is_empty());
}
