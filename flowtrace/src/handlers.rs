use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use flowtrace_core::amount::short_address;
use flowtrace_core::analysis::CycleConfig;
use flowtrace_core::constraints::parse_date;
use flowtrace_core::export::GraphSnapshot;
use flowtrace_core::report::{generate_crawl_summary, generate_findings_report, save_report};
use flowtrace_core::{
    BuildParams, BuildProgress, BuildProgressCallback, BuildStatus, Constraints, CrawlContext,
    FlowGraphBuilder, Graph, PatternConfig, detect_patterns, export_graph, find_path, to_dot,
};
use flowtrace_scanner::{
    JsonRpcGateway, RequestScheduler, SchedulerConfig, is_valid_address, parse_address,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub fn print_banner() {
    println!(
        "{} {}",
        "flowtrace".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!("{}", "ledger fund flow crawler".dimmed());
    println!();
}

/// Expand `~` in a user supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

// Helper functions for crawl handler

/// Seeds from either a file or the positional arguments. Positional seeds are
/// passed through untouched so the crawl can report the invalid ones.
pub fn load_seeds_from_source(
    seeds: &[String],
    seeds_file: Option<&Path>,
) -> Result<Vec<String>, String> {
    if let Some(seeds_file_path) = seeds_file {
        load_seeds_from_file(seeds_file_path)
    } else if !seeds.is_empty() {
        Ok(seeds.to_vec())
    } else {
        Err("Either SEEDS or --seeds-file must be provided".to_string())
    }
}

/// Load and parse seed addresses from a file
pub fn load_seeds_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read seeds file {}: {}", path.display(), e))?;

    let seeds: Vec<String> = content.lines().filter_map(parse_seed_line).collect();

    if seeds.is_empty() {
        return Err(format!("No valid addresses found in {}", path.display()));
    }

    Ok(seeds)
}

/// Parse one line of a seeds file. Blank lines and `#` comments yield
/// nothing; anything left must be a classic address.
pub fn parse_seed_line(line: &str) -> Option<String> {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() {
        return None;
    }
    if is_valid_address(line) {
        return Some(line.to_string());
    }

    eprintln!("⚠️  Skipping invalid address '{}'", line);
    None
}

pub fn build_params_from_args(args: &ArgMatches) -> Result<BuildParams> {
    let start_date = args
        .get_one::<String>("start-date")
        .map(|raw| parse_date(raw))
        .transpose()?;
    let end_date = args
        .get_one::<String>("end-date")
        .map(|raw| parse_date(raw))
        .transpose()?;

    let constraints = Constraints::default()
        .with_ledger_range(
            args.get_one::<i64>("ledger-min").copied(),
            args.get_one::<i64>("ledger-max").copied(),
        )
        .with_date_range(start_date, end_date)
        .with_min_xrp(args.get_one::<f64>("min-xrp").copied());

    let mut params = BuildParams::default().with_constraints(constraints);
    if let Some(&depth) = args.get_one::<u32>("max-depth") {
        params = params.with_max_depth(depth);
    }
    if let Some(&accounts) = args.get_one::<usize>("max-accounts") {
        params = params.with_max_accounts(accounts);
    }
    if let Some(&edges) = args.get_one::<usize>("max-edges") {
        params = params.with_max_edges(edges);
    }
    if let Some(&per_node) = args.get_one::<usize>("per-node") {
        params = params.with_per_node(per_node);
    }
    if let Some(&page_size) = args.get_one::<u32>("page-size") {
        params.page_size = page_size;
    }
    if let Some(&pages) = args.get_one::<u32>("max-pages") {
        params.max_pages_per_node = pages;
    }
    if let Some(&pages) = args.get_one::<u32>("max-pages-total") {
        params.max_pages_total = pages;
    }
    if let Some(&tx) = args.get_one::<u32>("max-tx") {
        params.max_tx_scanned = tx;
    }
    if args.get_flag("no-metadata") {
        params = params.transactions_only();
    }
    params.resolve_seed_tokens = args.get_flag("seed-tokens");

    params.validate()?;
    Ok(params)
}

pub fn scheduler_config_from_args(args: &ArgMatches) -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    if let Some(&threads) = args.get_one::<usize>("threads") {
        config = config.with_max_concurrent(threads.max(1));
    }
    if let Some(&retries) = args.get_one::<u32>("retries") {
        config = config.with_default_retries(retries);
    }
    config
}

pub fn pattern_config_from_args(args: &ArgMatches) -> PatternConfig {
    let defaults = PatternConfig::default();
    let fan = args
        .get_one::<usize>("fan-threshold")
        .copied()
        .unwrap_or(defaults.fan_out_threshold);
    PatternConfig {
        fan_out_threshold: fan,
        fan_in_threshold: fan,
        burst_window_ledgers: args
            .get_one::<u64>("burst-window")
            .copied()
            .unwrap_or(defaults.burst_window_ledgers),
        burst_threshold: args
            .get_one::<usize>("burst-threshold")
            .copied()
            .unwrap_or(defaults.burst_threshold),
        cycles: CycleConfig {
            max_depth: args
                .get_one::<usize>("max-cycle-len")
                .copied()
                .unwrap_or(defaults.cycles.max_depth),
            ..CycleConfig::default()
        },
        ..defaults
    }
}

/// Read a snapshot file back into a graph.
pub fn load_graph(path: &str) -> Result<Graph> {
    let path = expand_path(path);
    let snapshot = GraphSnapshot::read_from(&path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    info!("Loaded snapshot {} ({} accounts)", snapshot.id, snapshot.nodes.len());
    Ok(snapshot.into_graph()?)
}

/// One line per hop, with the first edge that carries it.
pub fn format_path(graph: &Graph, path: &[String]) -> String {
    let mut out = format!("Path ({} hops):\n", path.len().saturating_sub(1));
    if let Some(first) = path.first() {
        out.push_str(&format!("  {}\n", first));
    }
    for hop in path.windows(2) {
        let edge = graph.outgoing_edges(&hop[0]).find(|e| e.to == hop[1]);
        let label = match edge {
            Some(edge) => match &edge.amount {
                Some(amount) => format!("{} {}", edge.kind, amount),
                None => edge.kind.to_string(),
            },
            None => "?".to_string(),
        };
        out.push_str(&format!("   └─ {} ─▶ {}\n", label, hop[1]));
    }
    out
}

pub fn progress_message(p: &BuildProgress) -> String {
    let current = p
        .current
        .as_deref()
        .map(short_address)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "depth {} | {} accounts, {} edges, {} queued | requests {}/{} ({} failed, {} pending) | {}",
        p.depth,
        p.nodes,
        p.edges,
        p.queued,
        p.scheduler.completed,
        p.scheduler.total,
        p.scheduler.failed,
        p.scheduler.pending,
        current
    )
}

pub async fn handle_crawl(sub_matches: &ArgMatches) -> Result<()> {
    let seeds: Vec<String> = sub_matches
        .get_many::<String>("SEEDS")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let seeds_file = sub_matches
        .get_one::<String>("seeds-file")
        .map(|raw| expand_path(raw));
    let seeds = load_seeds_from_source(&seeds, seeds_file.as_deref()).map_err(anyhow::Error::msg)?;

    let params = build_params_from_args(sub_matches)?;
    let endpoint = sub_matches
        .get_one::<Url>("endpoint")
        .context("missing --endpoint")?;
    let timeout = *sub_matches.get_one::<u64>("timeout").unwrap_or(&20);
    let scheduler_config = scheduler_config_from_args(sub_matches);

    println!("\n🔎 Crawling from {} seed(s)", seeds.len());
    println!("Endpoint: {}", endpoint);
    println!(
        "Workers: {}, retries: {}",
        scheduler_config.max_concurrent, scheduler_config.default_max_retries
    );
    println!(
        "Max depth: {}, accounts: {}, edges: {}\n",
        params.max_depth, params.max_accounts, params.max_edges
    );

    let gateway = JsonRpcGateway::with_timeout(endpoint.as_str(), timeout)?;
    let scheduler = RequestScheduler::new(scheduler_config);
    let ctx = CrawlContext::new(Arc::new(gateway), scheduler.clone());

    // Ctrl-C cancels the crawl and keeps whatever graph was built
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling crawl");
            scheduler.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("starting");
    let bar = spinner.clone();
    let progress_callback: BuildProgressCallback =
        Arc::new(move |p: &BuildProgress| bar.set_message(progress_message(p)));

    let result = FlowGraphBuilder::new(ctx, params)
        .with_progress_callback(progress_callback)
        .build(&seeds)
        .await;
    interrupt.abort();
    spinner.finish_and_clear();

    let graph = match result {
        Ok(graph) => graph,
        Err(e) => bail!("Crawl failed: {}", e),
    };

    match graph.status {
        BuildStatus::Complete => println!("{} Crawl complete!\n", "✓".green().bold()),
        BuildStatus::Cancelled => println!("{} Crawl cancelled, partial graph kept\n", "⚠".yellow().bold()),
        status => println!("{} Crawl stopped: {}\n", "⚠".yellow().bold(), status),
    }

    let mut report = generate_crawl_summary(&graph);
    if sub_matches.get_flag("analyze") {
        let findings = detect_patterns(&graph, &PatternConfig::default());
        report.push_str(&generate_findings_report(&graph, &findings));
    }
    print!("{}", report);

    if let Some(output) = sub_matches.get_one::<String>("output") {
        let path = expand_path(output);
        let format = sub_matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("json");
        if format == "dot" {
            save_report(&to_dot(&graph), &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        } else {
            export_graph(&graph).write_to(&path)?;
        }
        println!("{} Graph saved to {}", "✓".green().bold(), path.display());
    }

    if let Some(report_path) = sub_matches.get_one::<String>("report") {
        let path = expand_path(report_path);
        save_report(&report, &path).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} Report saved to {}", "✓".green().bold(), path.display());
    }

    Ok(())
}

pub fn handle_path(sub_matches: &ArgMatches) -> Result<()> {
    let snapshot = sub_matches
        .get_one::<String>("snapshot")
        .context("missing --snapshot")?;
    let from = parse_address(sub_matches.get_one::<String>("from").context("missing --from")?)?;
    let to = parse_address(sub_matches.get_one::<String>("to").context("missing --to")?)?;

    let graph = load_graph(snapshot)?;
    for address in [&from, &to] {
        if !graph.contains(address) {
            bail!("{} is not in the snapshot", address);
        }
    }

    match find_path(&graph, &from, &to) {
        Some(path) => print!("{}", format_path(&graph, &path)),
        None => {
            println!("No flow path from {} to {}", from, to);
            if graph.is_incomplete() {
                println!(
                    "{} the snapshot is a partial crawl; a path may exist outside it",
                    "CAVEAT".yellow().bold()
                );
            }
        }
    }
    Ok(())
}

pub fn handle_analyze(sub_matches: &ArgMatches) -> Result<()> {
    let snapshot = sub_matches
        .get_one::<String>("snapshot")
        .context("missing --snapshot")?;
    let graph = load_graph(snapshot)?;
    let config = pattern_config_from_args(sub_matches);
    let findings = detect_patterns(&graph, &config);

    let report = if sub_matches.get_flag("json") {
        serde_json::to_string_pretty(&findings)?
    } else {
        generate_findings_report(&graph, &findings)
    };

    match sub_matches.get_one::<String>("output") {
        Some(output) => {
            let path = expand_path(output);
            save_report(&report, &path).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Report saved to {}", "✓".green().bold(), path.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}
