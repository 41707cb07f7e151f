// Text reports for crawls and findings

use crate::amount::{DROPS_PER_XRP, format_value, short_address};
use crate::analysis::Findings;
use crate::graph::{ActivationLookup, Graph};
use colored::Colorize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push('\n');
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");
}

fn colored_score(score: u8) -> String {
    let text = format!("{:>3}/100", score);
    match score {
        0..=24 => text.green().to_string(),
        25..=59 => text.yellow().to_string(),
        _ => text.red().bold().to_string(),
    }
}

pub fn generate_crawl_summary(graph: &Graph) -> String {
    let stats = graph.stats();
    let mut report = String::new();
    report.push_str(RULE);
    report.push_str("\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Status: {}\n", graph.status));
    report.push_str(&format!("  Seeds: {}\n", graph.seeds.join(", ")));
    if !graph.rejected_seeds.is_empty() {
        report.push_str(&format!(
            "  Rejected seeds: {}\n",
            graph.rejected_seeds.join(", ").red()
        ));
    }
    report.push_str(&format!(
        "  Accounts: {} ({} expanded, {} incomplete)\n",
        stats.nodes, stats.expanded, stats.incomplete
    ));
    report.push_str(&format!("  Edges: {}\n", stats.edges));
    if stats.errors > 0 {
        report.push_str(&format!("  Accounts with errors: {}\n", stats.errors.to_string().yellow()));
    }
    if let Some(finished) = graph.finished_at {
        let secs = (finished - graph.built_at).num_milliseconds() as f64 / 1000.0;
        report.push_str(&format!("  Duration: {:.1}s\n", secs));
    }
    report.push_str(&format!("\n{}\n\n", RULE));

    let mut level = None;
    for node in graph.nodes() {
        if level != Some(node.level) {
            level = Some(node.level);
            report.push_str(&format!("## Depth {}\n", node.level));
        }

        let marker = match (node.scan.expanded, node.scan.complete) {
            (true, true) => "●".green().to_string(),
            (true, false) => "◐".yellow().to_string(),
            (false, _) => "○".dimmed().to_string(),
        };
        let mut line = format!(
            "  {} {}  out {} / in {}",
            marker,
            node.address,
            graph.outgoing_edges(&node.address).count(),
            graph.incoming_edges(&node.address).count()
        );
        if let Some(info) = &node.account_info {
            line.push_str(&format!("  {} XRP", format_value(info.balance as f64 / DROPS_PER_XRP)));
            if let Some(domain) = &info.domain {
                line.push_str(&format!(" {}", domain.cyan()));
            }
        }
        match &node.activation {
            Some(ActivationLookup::Found(activation)) => line.push_str(&format!(
                "  funded by {}",
                short_address(&activation.activator)
            )),
            Some(ActivationLookup::NotFoundWithinBudget) => {
                line.push_str(&format!("  {}", "activation not found within budget".dimmed()))
            }
            _ => {}
        }
        if let Some(error) = &node.scan.error {
            line.push_str(&format!("  {}", error.red()));
        }
        report.push_str(&line);
        report.push('\n');
    }
    report.push('\n');
    report
}

pub fn generate_findings_report(graph: &Graph, findings: &Findings) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                         FLOWTRACE FINDINGS REPORT\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Status:       {}\n", graph.status));
    report.push_str(&format!("Built:        {}\n", graph.built_at.to_rfc3339()));
    report.push_str(&format!("Seeds:        {}\n", graph.seeds.join(", ")));
    report.push_str(&format!(
        "Graph:        {} accounts, {} edges\n",
        graph.node_count(),
        graph.edge_count()
    ));
    report.push_str(&format!("Risk:         {}\n\n", colored_score(findings.risk.score)));
    for reason in &findings.risk.reasons {
        report.push_str(&format!("  - {}\n", reason));
    }
    if !findings.risk.reasons.is_empty() {
        report.push('\n');
    }

    if !findings.caveats.is_empty() {
        for caveat in &findings.caveats {
            report.push_str(&format!("{} {}\n", "CAVEAT".yellow().bold(), caveat));
        }
        report.push('\n');
    }

    if findings.is_empty() {
        report.push_str("No patterns met their thresholds.\n\n");
        return report;
    }

    if !findings.ping_pong.is_empty() {
        section(&mut report, "PING-PONG / REPEATED AMOUNTS");
        for pair in &findings.ping_pong {
            report.push_str(&format!(
                "{}  {} <-> {}  ({} -> / {} <-)\n",
                colored_score(pair.risk.score),
                pair.a,
                pair.b,
                pair.a_to_b,
                pair.b_to_a
            ));
            for reason in &pair.risk.reasons {
                report.push_str(&format!("    - {}\n", reason));
            }
        }
        report.push('\n');
    }

    if !findings.cycles.cycles.is_empty() {
        section(&mut report, "CYCLES");
        for cycle in &findings.cycles.cycles {
            let hops: Vec<String> = cycle.path.iter().map(String::as_str).map(short_address).collect();
            report.push_str(&format!(
                "  [{}] {} -> {}\n",
                cycle.len(),
                hops.join(" -> "),
                hops.first().cloned().unwrap_or_default()
            ));
        }
        report.push('\n');
    }

    if !findings.hubs.is_empty() {
        section(&mut report, "HUBS");
        for hub in &findings.hubs {
            report.push_str(&format!(
                "  {}  {} parents, {} children, {} edges\n",
                hub.address, hub.parents, hub.children, hub.edges
            ));
        }
        report.push('\n');
    }

    if !findings.fan_out.is_empty() || !findings.fan_in.is_empty() {
        section(&mut report, "FAN-OUT / FAN-IN");
        for f in &findings.fan_out {
            report.push_str(&format!(
                "  out {:>4}  {}  ({} edges)\n",
                f.degree, f.address, f.edges
            ));
        }
        for f in &findings.fan_in {
            report.push_str(&format!("  in  {:>4}  {}  ({} edges)\n", f.degree, f.address, f.edges));
        }
        report.push('\n');
    }

    if !findings.bursts.is_empty() {
        section(&mut report, "BURSTS");
        for burst in &findings.bursts {
            let sampled = if burst.sampled {
                " (sampled)".dimmed().to_string()
            } else {
                String::new()
            };
            report.push_str(&format!(
                "  {}  {} transactions in ledgers {}-{}{}\n",
                burst.address, burst.count, burst.first_ledger, burst.last_ledger, sampled
            ));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("\nHeuristic indicators only; a score is never a verdict.\n");
    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
