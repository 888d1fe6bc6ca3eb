use super::*;
use clap::Parser;
use regcheck_core::models::RegulationSource;

#[test]
fn root_defaults_to_hidden_workspace_dir() {
    let cli = Cli::try_parse_from(["regcheck", "status"]).expect("parse");
    assert_eq!(cli.root, PathBuf::from(".regcheck"));
    assert_eq!(cli.verbose, 0);
    assert!(matches!(cli.command, Commands::Status));
}

#[test]
fn verbose_flag_counts_repeats() {
    let cli = Cli::try_parse_from(["regcheck", "-vv", "status"]).expect("parse");
    assert_eq!(cli.verbose, 2);
    let cli = Cli::try_parse_from(["regcheck", "status", "-v"]).expect("parse");
    assert_eq!(cli.verbose, 1);
}

#[test]
fn ingest_collects_corpora_per_source() {
    let cli = Cli::try_parse_from([
        "regcheck",
        "ingest",
        "--official",
        "nrc.json",
        "--supplementary",
        "extra.jsonl",
        "--official",
        "nrc-2.json",
    ])
    .expect("parse");
    let Commands::Ingest(args) = cli.command else {
        panic!("expected ingest command");
    };
    let corpora = args.corpora();
    assert_eq!(corpora.len(), 3);
    assert_eq!(corpora[0], (RegulationSource::OfficialGuideline, PathBuf::from("nrc.json")));
    assert_eq!(corpora[2].0, RegulationSource::Supplementary);
}

#[test]
fn check_parses_format() {
    let cli = Cli::try_parse_from(["regcheck", "check", "actions.json", "--format", "text"])
        .expect("parse");
    match cli.command {
        Commands::Check(CheckArgs { input, format }) => {
            assert_eq!(input, PathBuf::from("actions.json"));
            assert_eq!(format, OutputFormat::Text);
        }
        _ => panic!("expected check command"),
    }
}

#[test]
fn rules_source_accepts_labels_and_rejects_unknown() {
    let cli = Cli::try_parse_from(["regcheck", "rules", "--source", "NRC Guidelines"])
        .expect("parse");
    match cli.command {
        Commands::Rules(RulesArgs { source, limit }) => {
            assert_eq!(source, Some(RegulationSource::OfficialGuideline));
            assert_eq!(limit, None);
        }
        _ => panic!("expected rules command"),
    }
    assert!(Cli::try_parse_from(["regcheck", "rules", "--source", "blog"]).is_err());
}
