use flowtrace::commands::command_argument_builder;
use flowtrace::handlers::*;
use flowtrace_core::{
    Amount, BuildParams, BuildProgress, BuildStatus, Edge, Graph, TxKind, export_graph,
};
use flowtrace_scanner::SchedulerProgress;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const ALICE: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";
const BOB: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
const GATEWAY: &str = "rN7n7otQDd6FczFgLdSqtcsAUxDkw6fzRH";

fn sub_matches(args: &[&str]) -> clap::ArgMatches {
    let mut argv = vec!["flowtrace"];
    argv.extend_from_slice(args);
    let matches = command_argument_builder().try_get_matches_from(argv).unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    sub.clone()
}

fn chain() -> Graph {
    let mut graph = Graph::new(vec![ALICE.to_string()], BuildParams::default());
    graph.ensure_node(ALICE, 0);
    for (i, (from, to)) in [(ALICE, BOB), (BOB, GATEWAY)].into_iter().enumerate() {
        graph.try_add_edge(
            Edge {
                from: from.to_string(),
                to: to.to_string(),
                kind: TxKind::Payment,
                amount: Some(Amount::xrp(2.0)),
                ledger_index: Some(100 + i as i64),
                timestamp: None,
                tx_hash: format!("H{}", i),
            },
            i as u32 + 1,
        );
    }
    graph.status = BuildStatus::Complete;
    graph
}

#[test]
fn test_parse_seed_line_valid() {
    assert_eq!(parse_seed_line(ALICE), Some(ALICE.to_string()));
    assert_eq!(parse_seed_line(&format!("  {}  ", BOB)), Some(BOB.to_string()));
}

#[test]
fn test_parse_seed_line_comments_and_blanks() {
    assert_eq!(parse_seed_line("# exchange wallets"), None);
    assert_eq!(parse_seed_line("   "), None);
    assert_eq!(
        parse_seed_line(&format!("{} # hot wallet", GATEWAY)),
        Some(GATEWAY.to_string())
    );
}

#[test]
fn test_parse_seed_line_invalid() {
    assert_eq!(parse_seed_line("not an address!!!"), None);
    assert_eq!(parse_seed_line("xPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe"), None);
}

#[test]
fn test_load_seeds_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "# seeds")?;
    writeln!(temp_file, "{}", ALICE)?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "garbage")?;
    writeln!(temp_file, "{}", BOB)?;

    let seeds = load_seeds_from_file(temp_file.path())?;
    assert_eq!(seeds, vec![ALICE.to_string(), BOB.to_string()]);
    Ok(())
}

#[test]
fn test_load_seeds_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   # nothing here").unwrap();

    let result = load_seeds_from_file(temp_file.path());
    assert!(result.unwrap_err().contains("No valid addresses"));
}

#[test]
fn test_load_seeds_from_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = load_seeds_from_file(&dir.path().join("absent.txt"));
    assert!(result.unwrap_err().contains("Failed to read seeds file"));
}

#[test]
fn test_load_seeds_from_source() {
    let args = vec![ALICE.to_string(), "bogus".to_string()];
    // positional seeds are kept as given so the crawl can report rejects
    assert_eq!(load_seeds_from_source(&args, None).unwrap(), args);
    assert!(load_seeds_from_source(&[], None).is_err());
}

#[test]
fn test_build_params_from_defaults() {
    let params = build_params_from_args(&sub_matches(&["crawl", ALICE])).unwrap();
    assert_eq!(params, BuildParams::default());
}

#[test]
fn test_build_params_from_args() {
    let sub = sub_matches(&[
        "crawl",
        ALICE,
        "--max-depth",
        "3",
        "--max-edges",
        "40",
        "--per-node",
        "5",
        "--ledger-min",
        "100",
        "--ledger-max",
        "200",
        "--start-date",
        "2024-01-01",
        "--min-xrp",
        "25",
        "--no-metadata",
        "--seed-tokens",
    ]);
    let params = build_params_from_args(&sub).unwrap();
    assert_eq!(params.max_depth, 3);
    assert_eq!(params.max_edges, 40);
    assert_eq!(params.per_node, 5);
    assert_eq!(params.constraints.ledger_min, Some(100));
    assert_eq!(params.constraints.ledger_max, Some(200));
    assert!(params.constraints.date_min.is_some());
    assert_eq!(params.constraints.min_xrp, Some(25.0));
    assert!(!params.resolve_account_info);
    assert!(!params.resolve_activation);
    assert!(params.resolve_seed_tokens);
}

#[test]
fn test_build_params_rejects_bad_input() {
    let bad_date = sub_matches(&["crawl", ALICE, "--start-date", "yesterday"]);
    assert!(build_params_from_args(&bad_date).is_err());

    let inverted = sub_matches(&["crawl", ALICE, "--ledger-min", "300", "--ledger-max", "200"]);
    assert!(build_params_from_args(&inverted).is_err());
}

#[test]
fn test_seeds_and_file_conflict() {
    let result = command_argument_builder().try_get_matches_from([
        "flowtrace",
        "crawl",
        ALICE,
        "--seeds-file",
        "seeds.txt",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_scheduler_config_from_args() {
    let config = scheduler_config_from_args(&sub_matches(&["crawl", ALICE, "-t", "8", "-r", "5"]));
    assert_eq!(config.max_concurrent, 8);
    assert_eq!(config.default_max_retries, 5);
}

#[test]
fn test_pattern_config_from_args() {
    let sub = sub_matches(&[
        "analyze",
        "--snapshot",
        "snap.json",
        "--fan-threshold",
        "3",
        "--max-cycle-len",
        "4",
    ]);
    let config = pattern_config_from_args(&sub);
    assert_eq!(config.fan_out_threshold, 3);
    assert_eq!(config.fan_in_threshold, 3);
    assert_eq!(config.cycles.max_depth, 4);
    assert_eq!(config.burst_window_ledgers, 20);
}

#[test]
fn test_load_graph_and_format_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snap.json");
    export_graph(&chain()).write_to(&path).unwrap();

    let graph = load_graph(path.to_str().unwrap()).unwrap();
    assert_eq!(graph.node_count(), 3);

    let hops = flowtrace_core::find_path(&graph, ALICE, GATEWAY).unwrap();
    let text = format_path(&graph, &hops);
    assert!(text.starts_with("Path (2 hops):"));
    assert_eq!(text.matches("Payment 2 XRP").count(), 2);
    assert!(text.trim_end().ends_with(GATEWAY));
}

#[test]
fn test_load_graph_missing_file() {
    let err = load_graph("/definitely/not/here.json").unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read snapshot"));
}

#[test]
fn test_expand_path_tilde() {
    if std::env::var_os("HOME").is_some() {
        let expanded = expand_path("~/snapshots/crawl.json");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
    assert_eq!(expand_path("plain.json").to_str(), Some("plain.json"));
}

#[test]
fn test_negative_burst_window_rejected() {
    let result = command_argument_builder().try_get_matches_from([
        "flowtrace",
        "analyze",
        "--snapshot",
        "snap.json",
        "--burst-window=-1",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_progress_message_shows_every_request_state() {
    let progress = BuildProgress {
        nodes: 4,
        edges: 6,
        queued: 2,
        expanded: 2,
        current: Some(ALICE.to_string()),
        depth: 1,
        scheduler: SchedulerProgress {
            total: 12,
            completed: 7,
            failed: 2,
            pending: 3,
            active: 1,
        },
    };
    let line = progress_message(&progress);
    assert!(line.contains("requests 7/12"));
    assert!(line.contains("2 failed"));
    assert!(line.contains("3 pending"));
}
