use super::*;
use crate::core::types::InstalledPackages;
use crate::diff::{DiffOptions, TargetSpec, diff};
use crate::error::PkgtrailError;
use crate::ledger::ActionFilter;
use crate::packages::testing::FakeManager;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    ledger: Ledger,
    store: SnapshotStore,
    _dir: TempDir,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let ledger = Ledger::open(&dir.path().join("data")).unwrap();
    let store = SnapshotStore::new(&dir.path().join("snapshots"));
    Fixture {
        ledger,
        store,
        _dir: dir,
    }
}

fn registry(managers: Vec<Arc<FakeManager>>) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    for manager in managers {
        registry.register(manager);
    }
    registry
}

fn install(backend: &str, name: &str, version: Option<&str>) -> ProposedAction {
    ProposedAction {
        kind: ActionKind::Install,
        package: PackageRef::new(backend, name, version),
        current_version: None,
    }
}

fn remove(backend: &str, name: &str) -> ProposedAction {
    ProposedAction {
        kind: ActionKind::Remove,
        package: PackageRef::new(backend, name, None),
        current_version: None,
    }
}

#[test]
fn curl_and_jq_reach_a_fresh_machine() {
    let f = fixture();

    let mut observed = InstalledPackages::new();
    observed.insert("curl".to_string(), Some("7.81".to_string()));
    let from = vec![Snapshot::new(Backend::from("apt"), observed)];
    let target = TargetSpec::Packages(vec![
        PackageRef::new("apt", "curl", Some("8.0")),
        PackageRef::new("apt", "jq", None),
    ]);
    let plan = diff(&from, &target, &DiffOptions::default());
    assert_eq!(plan.actions.len(), 2);

    let apt = Arc::new(FakeManager::new("apt"));
    let registry = registry(vec![apt.clone()]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default());

    let report = engine.replay_diff(&plan).unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 0);
    assert!(report.failed.is_empty());
    assert!(report.is_success());
    assert_eq!(
        apt.installed().get("curl"),
        Some(&Some("8.0".to_string()))
    );
}

#[test]
fn second_replay_only_skips() {
    let f = fixture();
    let apt = Arc::new(FakeManager::new("apt").with_package("nano", "7.2"));
    let registry = registry(vec![apt.clone()]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default());

    let actions = vec![
        install("apt", "curl", Some("8.0")),
        install("apt", "jq", None),
        remove("apt", "nano"),
    ];

    let first = engine.replay(&actions).unwrap();
    assert_eq!(first.applied, 3);
    let mutations = apt.mutations();

    let second = engine.replay(&actions).unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(apt.mutations(), mutations);
    assert!(
        second
            .steps
            .iter()
            .all(|s| s.state == ActionState::Skipped)
    );

    // Every attempt is logged, skips included
    assert_eq!(f.ledger.actions(ActionFilter::all()).unwrap().len(), 6);
}

#[test]
fn install_then_remove_nets_out_on_every_run() {
    let f = fixture();
    let apt = Arc::new(FakeManager::new("apt"));
    let registry = registry(vec![apt.clone()]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default());

    let actions = vec![install("apt", "jq", None), remove("apt", "jq")];

    for _ in 0..2 {
        let report = engine.replay(&actions).unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.steps[0].state, ActionState::Skipped);
        assert!(report.steps[0].recorded.is_none());
        assert_eq!(report.not_started(), 0);
    }
    assert_eq!(apt.mutations(), 0);
    assert!(apt.installed().is_empty());

    // Only the removes reached an adapter, and only they are logged
    let logged = f.ledger.actions(ActionFilter::all()).unwrap();
    assert_eq!(logged.len(), 2);
    assert!(logged.iter().all(|a| a.kind == ActionKind::Remove));
}

#[test]
fn final_install_keeps_an_earlier_requested_version() {
    let f = fixture();
    let apt = Arc::new(FakeManager::new("apt"));
    let registry = registry(vec![apt.clone()]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default());

    let report = engine
        .replay(&[
            install("apt", "curl", Some("8.0")),
            install("apt", "jq", None),
            install("apt", "curl", None),
        ])
        .unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.steps[2].proposed.package.version.as_deref(), Some("8.0"));
    assert_eq!(apt.installed().get("curl"), Some(&Some("8.0".to_string())));

    // A remove in between resets what the final install asks for
    let report = engine
        .replay(&[
            install("apt", "htop", Some("3.3")),
            remove("apt", "htop"),
            install("apt", "htop", None),
        ])
        .unwrap();
    assert_eq!(report.steps[2].proposed.package.version, None);
    assert_eq!(apt.installed().get("htop"), Some(&Some("1.0".to_string())));
}

#[test]
fn removing_an_absent_package_is_logged_as_skipped() {
    let f = fixture();
    let registry = registry(vec![Arc::new(FakeManager::new("apt"))]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default());

    let report = engine.replay(&[remove("apt", "htop")]).unwrap();
    assert_eq!(report.skipped, 1);

    let logged = f.ledger.actions(ActionFilter::all()).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].kind, ActionKind::Remove);
    assert_eq!(logged[0].outcome, Outcome::Skipped);
}

#[test]
fn unavailable_backend_fails_without_blocking_others() {
    let f = fixture();
    let apt = Arc::new(FakeManager::new("apt"));
    let brew = Arc::new(FakeManager::new("brew").unavailable());
    let registry = registry(vec![apt.clone(), brew]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default());

    let report = engine
        .replay(&[
            install("brew", "wget", None),
            install("apt", "curl", None),
            install("brew", "htop", None),
            // No adapter registered at all
            install("nix", "ripgrep", None),
        ])
        .unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.failed.len(), 3);
    for failure in &report.failed {
        assert_eq!(failure.detail, "backend unavailable");
    }
    assert!(apt.installed().contains_key("curl"));
}

#[test]
fn continue_mode_records_failures_and_proceeds() {
    let f = fixture();
    let apt = Arc::new(FakeManager::new("apt").broken("doomed"));
    let registry = registry(vec![apt]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default());

    let report = engine
        .replay(&[install("apt", "doomed", None), install("apt", "jq", None)])
        .unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].detail.contains("Unable to locate package"));
    assert!(!report.aborted);

    let failed = f
        .ledger
        .actions(ActionFilter::all().outcome(Outcome::Failed))
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error_detail.is_some());

    match report.ensure_success() {
        Err(PkgtrailError::ActionFailed { package, .. }) => assert_eq!(package, "doomed"),
        other => panic!("expected ActionFailed, got {:?}", other),
    }
}

#[test]
fn strict_mode_stops_at_first_failure() {
    let f = fixture();
    let registry = registry(vec![Arc::new(FakeManager::new("apt").broken("doomed"))]);
    let options = ReplayOptions {
        mode: ReplayMode::Strict,
        ..Default::default()
    };
    let engine = ReplayEngine::new(&registry, &f.ledger, options);

    let report = engine
        .replay(&[
            install("apt", "curl", None),
            install("apt", "doomed", None),
            install("apt", "jq", None),
        ])
        .unwrap();

    assert!(report.aborted);
    assert_eq!(report.applied, 1);
    assert_eq!(report.not_started(), 1);
    assert_eq!(report.steps[2].state, ActionState::Pending);
    assert_eq!(f.ledger.actions(ActionFilter::all()).unwrap().len(), 2);
}

#[test]
fn cancellation_records_the_in_flight_action() {
    let f = fixture();
    let cancel = CancelToken::new();
    let apt = Arc::new(FakeManager::new("apt").cancel_on("jq", cancel.clone()));
    let registry = registry(vec![apt]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default())
        .with_cancel(cancel);

    let report = engine
        .replay(&[
            install("apt", "curl", None),
            install("apt", "jq", None),
            install("apt", "ripgrep", None),
        ])
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.applied, 1);
    assert_eq!(report.failed[0].detail, "cancelled");
    assert_eq!(report.not_started(), 1);
    assert!(matches!(
        report.ensure_success(),
        Err(PkgtrailError::Cancelled)
    ));

    let logged = f.ledger.actions(ActionFilter::all()).unwrap();
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[1].error_detail.as_deref(), Some("cancelled"));
}

#[test]
fn ledger_replay_skips_failed_source_actions_and_can_pin() {
    let source_dir = TempDir::new().unwrap();
    let source = Ledger::open(source_dir.path()).unwrap();
    let mut draft = ActionDraft::from_outcome(
        ActionKind::Install,
        &PackageRef::new("pip", "requests", None),
        &ActionOutcome::success(Some("2.31.0".to_string())),
    );
    source.append(draft.clone()).unwrap();
    draft.package = "doomed".to_string();
    draft.outcome = Outcome::Failed;
    source.append(draft).unwrap();
    let recorded = source.actions(ActionFilter::all()).unwrap();

    let f = fixture();
    let pip = Arc::new(FakeManager::new("pip"));
    let registry = registry(vec![pip.clone()]);
    let options = ReplayOptions {
        pin_versions: true,
        ..Default::default()
    };
    let engine = ReplayEngine::new(&registry, &f.ledger, options);

    let report = engine.replay_ledger(&recorded).unwrap();
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.applied, 1);
    assert_eq!(
        pip.installed().get("requests"),
        Some(&Some("2.31.0".to_string()))
    );
}

#[test]
fn touched_backends_are_resnapshotted() {
    let f = fixture();
    let registry = registry(vec![
        Arc::new(FakeManager::new("apt")),
        Arc::new(FakeManager::new("brew")),
    ]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default())
        .with_snapshots(&f.store);

    let report = engine.replay(&[install("apt", "jq", None)]).unwrap();
    assert_eq!(report.snapshots.len(), 1);

    let latest = f.store.latest(&Backend::from("apt")).unwrap().unwrap();
    assert!(latest.contains("jq"));
    assert!(f.store.latest(&Backend::from("brew")).unwrap().is_none());
}

#[test]
fn apply_one_logs_a_single_action() {
    let f = fixture();
    let registry = registry(vec![Arc::new(FakeManager::new("apt"))]);
    let engine = ReplayEngine::new(&registry, &f.ledger, ReplayOptions::default());

    let action = engine
        .apply_one(ActionKind::Install, &PackageRef::new("apt", "jq", Some("1.7")))
        .unwrap();
    assert_eq!(action.id, 1);
    assert_eq!(action.result_version.as_deref(), Some("1.7"));
}
