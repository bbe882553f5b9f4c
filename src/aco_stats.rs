// Statistics and results for one simulation replicate

use serde::Serialize;

use crate::aco_interface::{
    AgentKind, AgentRecord, AgentState, GenerationId, GenerationRecord, NodeId, ReplicateId,
    OPTIMAL_WIDTH, WIDTH_STEP,
};

/// Buckets of the bottleneck histogram: widths 0, 10, ..., 100
pub const BOTTLENECK_BUCKETS: usize = (OPTIMAL_WIDTH / WIDTH_STEP) as usize + 1;

/// Per-kind outcome counters across all generations of a replicate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStats {
    pub kind: AgentKind,
    pub arrived: usize,
    pub stuck: usize,

    /// Arrivals whose route is exactly the planted optimal route
    pub optimal_hits: usize,

    /// Arrivals whose bottleneck is the full planted width
    pub full_width_arrivals: usize,

    /// First generation with an optimal hit
    pub first_optimal_generation: Option<GenerationId>,

    /// Arrived bottlenecks bucketed by `width / WIDTH_STEP`
    pub bottleneck_histogram: [usize; BOTTLENECK_BUCKETS],

    total_hops: usize,
}

impl AgentStats {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            arrived: 0,
            stuck: 0,
            optimal_hits: 0,
            full_width_arrivals: 0,
            first_optimal_generation: None,
            bottleneck_histogram: [0; BOTTLENECK_BUCKETS],
            total_hops: 0,
        }
    }

    pub fn observe(&mut self, generation: GenerationId, record: &AgentRecord, optimal: &[NodeId]) {
        self.total_hops += record.route_width.len();
        match record.state {
            AgentState::Arrived => {
                self.arrived += 1;
                if record.route_bottleneck == OPTIMAL_WIDTH {
                    self.full_width_arrivals += 1;
                }
                if record.route == optimal {
                    self.optimal_hits += 1;
                    self.first_optimal_generation.get_or_insert(generation);
                }
                let bucket = (record.route_bottleneck / WIDTH_STEP) as usize;
                if let Some(slot) = self.bottleneck_histogram.get_mut(bucket) {
                    *slot += 1;
                }
            }
            AgentState::Stuck => self.stuck += 1,
            AgentState::Traveling => {}
        }
    }

    pub fn runs(&self) -> usize {
        self.arrived + self.stuck
    }

    pub fn arrival_rate(&self) -> f64 {
        if self.runs() == 0 {
            0.0
        } else {
            self.arrived as f64 / self.runs() as f64
        }
    }

    pub fn mean_hops(&self) -> f64 {
        if self.runs() == 0 {
            0.0
        } else {
            self.total_hops as f64 / self.runs() as f64
        }
    }

    pub fn mean_bottleneck(&self) -> Option<f64> {
        if self.arrived == 0 {
            return None;
        }
        let sum: usize = self
            .bottleneck_histogram
            .iter()
            .enumerate()
            .map(|(bucket, count)| bucket * WIDTH_STEP as usize * count)
            .sum();
        Some(sum as f64 / self.arrived as f64)
    }
}

/// Result of one replicate
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub replicate: ReplicateId,
    pub seed_used: [u8; 32],
    pub generations_completed: usize,
    pub cancelled: bool,
    pub optimal_route: Vec<NodeId>,
    pub reinforcements: usize,
    pub agents: Vec<AgentStats>,
}

impl RunSummary {
    pub fn new(replicate: ReplicateId, seed_used: [u8; 32]) -> Self {
        Self {
            replicate,
            seed_used,
            generations_completed: 0,
            cancelled: false,
            optimal_route: Vec::new(),
            reinforcements: 0,
            agents: AgentKind::ALL.iter().map(|&k| AgentStats::new(k)).collect(),
        }
    }

    pub fn observe(&mut self, record: &GenerationRecord) {
        self.generations_completed += 1;
        if record.reinforced {
            self.reinforcements += 1;
        }
        for agent in &record.agents {
            if let Some(stats) = self.agents.iter_mut().find(|s| s.kind == agent.kind) {
                stats.observe(record.generation, agent, &self.optimal_route);
            }
        }
    }

    pub fn agent(&self, kind: AgentKind) -> Option<&AgentStats> {
        self.agents.iter().find(|s| s.kind == kind)
    }

    /// Print a summary of the replicate
    pub fn print_summary(&self) {
        println!("\n═══ Replicate {} ═══", self.replicate);
        println!("  Seed: {}", seed_hex(&self.seed_used));
        println!(
            "  Generations: {}{}",
            self.generations_completed,
            if self.cancelled { " (cancelled)" } else { "" }
        );
        println!("  Optimal route: {:?}", self.optimal_route);
        println!("  Reinforcements: {}", self.reinforcements);

        for stats in &self.agents {
            println!(
                "  {:<9} arrived {:>5} stuck {:>5} ({:.1}%)  hops {:.1}",
                stats.kind.as_str(),
                stats.arrived,
                stats.stuck,
                stats.arrival_rate() * 100.0,
                stats.mean_hops()
            );
            match stats.mean_bottleneck() {
                Some(mean) => println!(
                    "            bottleneck avg {:.1}  width-100 {}  optimal {} (first at {})",
                    mean,
                    stats.full_width_arrivals,
                    stats.optimal_hits,
                    stats
                        .first_optimal_generation
                        .map(|g| g.to_string())
                        .unwrap_or_else(|| "-".to_string())
                ),
                None => println!("            no arrivals"),
            }
        }
    }
}

pub fn seed_hex(seed: &[u8; 32]) -> String {
    let mut out = String::with_capacity(2 + 64);
    out.push_str("0x");
    for b in seed {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
