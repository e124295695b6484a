//! Record on one machine, reproduce on another, through the config-driven
//! adapter and a mock package manager script.
#![cfg(unix)]

use pkgtrail::backends::{BackendConfig, BinarySpecifier, OutputFormat};
use pkgtrail::core::ExecContext;
use pkgtrail::core::types::{ActionKind, Backend, Outcome, PackageRef};
use pkgtrail::diff::{DiffOptions, diff_against_ledger};
use pkgtrail::ledger::{ActionFilter, Ledger, LedgerReader, LedgerState};
use pkgtrail::packages::BackendRegistry;
use pkgtrail::replay::{ReplayEngine, ReplayOptions};
use pkgtrail::snapshot::SnapshotStore;
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MOCK_SCRIPT: &str = r#"#!/bin/sh
STATE="$(dirname "$0")/state"
touch "$STATE"
case "$1" in
  list)
    cat "$STATE"
    ;;
  install)
    if [ "$2" = "doomed" ]; then
      echo "E: Unable to locate package doomed" >&2
      exit 100
    fi
    grep -v "^$2 " "$STATE" > "$STATE.tmp"
    echo "$2 ${3:-1.0}" >> "$STATE.tmp"
    mv "$STATE.tmp" "$STATE"
    ;;
  remove)
    grep -v "^$2 " "$STATE" > "$STATE.tmp"
    mv "$STATE.tmp" "$STATE"
    ;;
esac
"#;

/// One simulated host: a mock package manager plus a data directory.
struct Machine {
    bin_dir: PathBuf,
    data_dir: PathBuf,
    registry: BackendRegistry,
    _tmp: TempDir,
}

impl Machine {
    fn new(initial: &str) -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let bin_dir = tmp.path().join("bin");
        let data_dir = tmp.path().join("data");
        fs::create_dir_all(&bin_dir).expect("mkdir bin");

        let script = bin_dir.join("mockpm");
        fs::write(&script, MOCK_SCRIPT).expect("write mock");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod mock");
        fs::write(bin_dir.join("state"), initial).expect("write state");

        let config = BackendConfig {
            name: "mockpm".to_string(),
            binary: BinarySpecifier::Single(script.to_string_lossy().into_owned()),
            list_cmd: Some("{binary} list".to_string()),
            install_cmd: "{binary} install {package}".to_string(),
            install_version_cmd: Some("{binary} install {package} {version}".to_string()),
            remove_cmd: Some("{binary} remove {package}".to_string()),
            list_format: OutputFormat::SplitWhitespace,
            ..Default::default()
        };
        let registry = BackendRegistry::from_configs(
            BTreeMap::from([("mockpm".to_string(), config)]),
            &ExecContext::default(),
        );

        Self {
            bin_dir,
            data_dir,
            registry,
            _tmp: tmp,
        }
    }

    fn installed(&self) -> String {
        fs::read_to_string(self.bin_dir.join("state")).expect("read state")
    }

    fn store(&self) -> SnapshotStore {
        SnapshotStore::new(&self.data_dir.join("snapshots"))
    }

    fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.jsonl")
    }
}

fn mockpm(name: &str, version: Option<&str>) -> PackageRef {
    PackageRef::new("mockpm", name, version)
}

fn record_history(machine: &Machine) {
    let ledger = Ledger::open(&machine.data_dir).unwrap();
    let engine = ReplayEngine::new(&machine.registry, &ledger, ReplayOptions::default());

    let curl = engine
        .apply_one(ActionKind::Install, &mockpm("curl", Some("8.0")))
        .unwrap();
    assert_eq!(curl.outcome, Outcome::Success);
    assert_eq!(curl.result_version.as_deref(), Some("8.0"));

    engine.apply_one(ActionKind::Install, &mockpm("jq", None)).unwrap();
    engine.apply_one(ActionKind::Remove, &mockpm("jq", None)).unwrap();

    let doomed = engine
        .apply_one(ActionKind::Install, &mockpm("doomed", None))
        .unwrap();
    assert_eq!(doomed.outcome, Outcome::Failed);
    assert!(
        doomed
            .error_detail
            .unwrap()
            .contains("Unable to locate package doomed")
    );

    ledger.close().unwrap();
}

fn read_state(path: &Path) -> LedgerState {
    LedgerState::from_actions(LedgerReader::open(path, ActionFilter::all()).unwrap()).unwrap()
}

#[test]
fn recorded_history_lands_in_the_ledger() {
    let a = Machine::new("");
    record_history(&a);

    assert_eq!(a.installed(), "curl 8.0\n");
    let actions: Vec<_> = LedgerReader::open(&a.ledger_path(), ActionFilter::all())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(actions.len(), 4);
    assert_eq!(
        actions.iter().map(|a| a.id).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
}

#[test]
fn another_machine_converges_through_a_diff() {
    let a = Machine::new("");
    record_history(&a);

    // jq is installed here but was removed on A; htop was never tracked
    let b = Machine::new("jq 1.6\nhtop 3.3\n");
    let target = read_state(&a.ledger_path());

    let store = b.store();
    let before = store.capture_all(&b.registry);
    assert_eq!(before.captured.len(), 1);

    let plan = diff_against_ledger(&before.captured, &target, &DiffOptions::default());
    let rendered: Vec<String> = plan.actions.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["install mockpm:curl@8.0", "remove mockpm:jq"]);

    let ledger = Ledger::open(&b.data_dir).unwrap();
    let engine =
        ReplayEngine::new(&b.registry, &ledger, ReplayOptions::default()).with_snapshots(&store);
    let report = engine.replay_diff(&plan).unwrap();
    assert!(report.is_success());
    assert_eq!(report.applied, 2);
    assert_eq!(report.snapshots.len(), 1);

    let installed = b.installed();
    assert!(installed.contains("curl 8.0"));
    assert!(installed.contains("htop 3.3"));
    assert!(!installed.contains("jq"));

    let after = store.latest(&Backend::from("mockpm")).unwrap().unwrap();
    let again = diff_against_ledger(&[after], &target, &DiffOptions::default());
    assert!(again.actions.is_empty());
}

#[test]
fn sequence_replay_reproduces_every_successful_step() {
    let a = Machine::new("");
    record_history(&a);

    let source: Vec<_> = LedgerReader::open(&a.ledger_path(), ActionFilter::all())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let c = Machine::new("");
    let ledger = Ledger::open(&c.data_dir).unwrap();
    let engine = ReplayEngine::new(&c.registry, &ledger, ReplayOptions::default());
    let report = engine.replay_ledger(&source).unwrap();

    // The failed install on A is not replayed, and jq nets out to a remove
    assert_eq!(report.steps.len(), 3);
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(c.installed(), "curl 8.0\n");
    assert_eq!(ledger.last_id(), 2);

    let again = engine.replay_ledger(&source).unwrap();
    assert_eq!(again.applied, 0);
    assert_eq!(again.skipped, 3);
    assert_eq!(c.installed(), "curl 8.0\n");
}
