//! Read-only analysis over a built [`Graph`].
//!
//! Nothing here fetches or mutates. Every result states whether it was
//! computed over an incomplete graph, since an absent edge in a partial crawl
//! proves nothing.

pub mod cycles;
pub mod path;
pub mod patterns;

pub use cycles::{Cycle, CycleConfig, CycleReport, find_cycles};
pub use path::find_path;
pub use patterns::{
    BurstFinding, DegreeFinding, HubFinding, PingPongFinding, RepeatedAmount, RiskScore,
};

use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub fan_out_threshold: usize,
    pub fan_in_threshold: usize,
    pub hub_min_parents: usize,
    pub hub_max_children: usize,
    pub hub_min_edges: usize,
    /// Window span in ledgers (roughly 3 to 5 seconds each).
    pub burst_window_ledgers: u64,
    pub burst_threshold: usize,
    /// Payments in both directions, counted together.
    pub min_reciprocal: usize,
    pub min_repeated_amount: usize,
    pub cycles: CycleConfig,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            fan_out_threshold: 10,
            fan_in_threshold: 10,
            hub_min_parents: 5,
            hub_max_children: 2,
            hub_min_edges: 10,
            burst_window_ledgers: 20,
            burst_threshold: 5,
            min_reciprocal: 2,
            min_repeated_amount: 2,
            cycles: CycleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub fan_out: Vec<DegreeFinding>,
    pub fan_in: Vec<DegreeFinding>,
    pub hubs: Vec<HubFinding>,
    pub bursts: Vec<BurstFinding>,
    pub ping_pong: Vec<PingPongFinding>,
    pub cycles: CycleReport,
    /// Overall 0-100 indicator built from the findings above.
    pub risk: RiskScore,
    /// The graph was cut short by a budget, a cancel or a failed node.
    pub sampled_incomplete: bool,
    pub caveats: Vec<String>,
}

impl Findings {
    pub fn is_empty(&self) -> bool {
        self.fan_out.is_empty()
            && self.fan_in.is_empty()
            && self.hubs.is_empty()
            && self.bursts.is_empty()
            && self.ping_pong.is_empty()
            && self.cycles.cycles.is_empty()
    }
}

pub fn detect_patterns(graph: &Graph, config: &PatternConfig) -> Findings {
    let mut findings = Findings {
        fan_out: patterns::fan_out(graph, config.fan_out_threshold),
        fan_in: patterns::fan_in(graph, config.fan_in_threshold),
        hubs: patterns::hubs(
            graph,
            config.hub_min_parents,
            config.hub_max_children,
            config.hub_min_edges,
        ),
        bursts: patterns::bursts(graph, config.burst_window_ledgers, config.burst_threshold),
        ping_pong: patterns::ping_pong(graph, config.min_reciprocal, config.min_repeated_amount),
        cycles: find_cycles(graph, &config.cycles),
        sampled_incomplete: graph.is_incomplete(),
        ..Findings::default()
    };

    if findings.sampled_incomplete {
        let stats = graph.stats();
        findings.caveats.push(format!(
            "Crawl {}; {} of {} expanded accounts were not read to the end. Missing edges prove nothing.",
            graph.status, stats.incomplete, stats.expanded
        ));
    }
    if findings.bursts.iter().any(|b| b.sampled) {
        findings
            .caveats
            .push("Some bursts were measured on truncated history.".to_string());
    }
    if findings.cycles.truncated {
        findings
            .caveats
            .push("Cycle search stopped at its cap; more cycles may exist.".to_string());
    }

    findings.risk = overall_risk(&findings);
    debug!(
        "Pattern scan: {} fan-out, {} fan-in, {} hubs, {} bursts, {} ping-pong, {} cycles",
        findings.fan_out.len(),
        findings.fan_in.len(),
        findings.hubs.len(),
        findings.bursts.len(),
        findings.ping_pong.len(),
        findings.cycles.cycles.len()
    );
    findings
}

fn overall_risk(findings: &Findings) -> RiskScore {
    let mut reasons = Vec::new();
    let mut score: u32 = 0;

    if let Some(top) = findings.ping_pong.first() {
        score += u32::from(top.risk.score) / 2;
        reasons.push(format!(
            "{} ping-pong or repeated-amount pair(s), strongest scored {}",
            findings.ping_pong.len(),
            top.risk.score
        ));
    }
    if !findings.cycles.cycles.is_empty() {
        score += (10 * findings.cycles.cycles.len() as u32).min(30);
        reasons.push(format!("{} closed loop(s) of funds", findings.cycles.cycles.len()));
    }
    if !findings.hubs.is_empty() {
        score += (5 * findings.hubs.len() as u32).min(15);
        reasons.push(format!("{} collection hub(s)", findings.hubs.len()));
    }
    if !findings.bursts.is_empty() {
        score += (5 * findings.bursts.len() as u32).min(15);
        reasons.push(format!("{} burst(s) of activity", findings.bursts.len()));
    }
    let fans = findings.fan_out.len() + findings.fan_in.len();
    if fans > 0 {
        score += (3 * fans as u32).min(10);
        reasons.push(format!("{} high fan-in/fan-out account(s)", fans));
    }

    RiskScore {
        score: score.min(100) as u8,
        reasons,
    }
}
