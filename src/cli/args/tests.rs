use super::*;

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("pkgtrail").chain(args.iter().copied()))
}

#[test]
fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn diff_requires_exactly_one_source() {
    assert!(parse(&["diff"]).is_err());
    assert!(parse(&["diff", "--tag", "a", "--ledger", "b.jsonl"]).is_err());

    let cli = parse(&["diff", "--target", "t.kdl", "--keep-unlisted"]).unwrap();
    let Command::Diff { plan, json } = cli.command else {
        panic!("expected diff");
    };
    assert_eq!(plan.source.target, Some(PathBuf::from("t.kdl")));
    assert!(plan.keep_unlisted);
    assert!(!json);
}

#[test]
fn sequence_needs_a_ledger() {
    assert!(parse(&["apply", "--tag", "base", "--sequence"]).is_err());
    assert!(parse(&["apply", "--ledger", "other.jsonl", "--sequence", "--strict"]).is_ok());
}

#[test]
fn global_flags_after_subcommand() {
    let cli = parse(&["log", "-n", "5", "--data-dir", "/tmp/x", "-v"]).unwrap();
    assert!(cli.global.verbose);
    assert_eq!(cli.global.data_dir, Some(PathBuf::from("/tmp/x")));
    assert!(matches!(cli.command, Command::Log { limit: Some(5), .. }));
}

#[test]
fn export_format_values() {
    let cli = parse(&["export", "--format", "result", "--tag", "base"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Export {
            format: ExportFormat::Result,
            ..
        }
    ));
    assert!(parse(&["export", "--format", "yaml"]).is_err());
}

#[test]
fn install_needs_packages() {
    assert!(parse(&["install"]).is_err());
    let cli = parse(&["install", "pip:requests@2.31.0", "jq", "-b", "brew"]).unwrap();
    let Command::Install { packages, backend } = cli.command else {
        panic!("expected install");
    };
    assert_eq!(packages.len(), 2);
    assert_eq!(backend.as_deref(), Some("brew"));
}
