// Run parameters and scenario files

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aco_interface::{Pheromone, SimError, DEFAULT_ATTACHMENT_EDGES};

// ============================================================================
// Parameters
// ============================================================================

/// Immutable configuration of one simulation batch.
///
/// Every field up to `simulation_count` is required; only the generator and
/// updater settings below it have defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Number of nodes in the generated network (>= 3)
    pub num_nodes: usize,

    /// Number of hops in the planted 100-width route (>= 1)
    pub optimal_route_length: usize,

    /// Decay factor applied to every link once per generation
    pub volatility: f64,

    /// Pheromone floor; also the initial pheromone of every link
    pub pheromone_min: Pheromone,

    /// Pheromone ceiling
    pub pheromone_max: Pheromone,

    /// Packet time-to-live; carried for the record, traversal never reads it
    pub ttl: u32,

    /// Width exponent in the ant's selection weight `width^bata * pheromone`
    pub bata: f64,

    /// Generations per replicate
    pub generation_limit: usize,

    /// Number of independent replicates
    pub simulation_count: usize,

    /// Edges attached per new node during preferential attachment
    #[serde(default = "default_attachment_edges")]
    pub attachment_edges: usize,

    /// How the volatilization floor is derived for each link
    #[serde(default)]
    pub floor_policy: FloorPolicy,
}

fn default_attachment_edges() -> usize {
    DEFAULT_ATTACHMENT_EDGES
}

/// Lower bound a link's pheromone is clamped to after volatilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorPolicy {
    /// Every link uses `pheromone_min`
    #[default]
    Fixed,

    /// `pheromone_min * 3 / degree`, with degree the larger endpoint degree
    DegreeScaled,
}

impl FloorPolicy {
    /// Floor for a link whose busier endpoint has `degree` neighbours
    pub fn floor(&self, params: &Params, degree: usize) -> Pheromone {
        match self {
            FloorPolicy::Fixed => params.pheromone_min,
            FloorPolicy::DegreeScaled => {
                let scaled = params.pheromone_min.saturating_mul(3) / degree.max(1) as Pheromone;
                scaled.min(params.pheromone_max)
            }
        }
    }
}

impl Default for Params {
    /// Small reference run: 5 nodes, a 2-hop planted route, two generations
    fn default() -> Self {
        Self {
            num_nodes: 5,
            optimal_route_length: 2,
            volatility: 0.99,
            pheromone_min: 100,
            pheromone_max: 1 << 20,
            ttl: 100,
            bata: 1.0,
            generation_limit: 2,
            simulation_count: 1,
            attachment_edges: DEFAULT_ATTACHMENT_EDGES,
            floor_policy: FloorPolicy::Fixed,
        }
    }
}

impl Params {
    /// Reject parameter sets the simulation cannot run with
    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_nodes < 3 {
            return Err(SimError::InvalidParams(format!(
                "num_nodes must be at least 3, got {}",
                self.num_nodes
            )));
        }
        if self.optimal_route_length < 1 {
            return Err(SimError::InvalidParams(
                "optimal_route_length must be at least 1".to_string(),
            ));
        }
        if self.optimal_route_length >= self.num_nodes {
            return Err(SimError::InvalidParams(format!(
                "optimal_route_length {} needs at least {} nodes",
                self.optimal_route_length,
                self.optimal_route_length + 1
            )));
        }
        if !self.volatility.is_finite() || self.volatility <= 0.0 {
            return Err(SimError::InvalidParams(format!(
                "volatility must be a positive finite number, got {}",
                self.volatility
            )));
        }
        if self.pheromone_min > self.pheromone_max {
            return Err(SimError::InvalidParams(format!(
                "pheromone_min {} exceeds pheromone_max {}",
                self.pheromone_min, self.pheromone_max
            )));
        }
        if !self.bata.is_finite() {
            return Err(SimError::InvalidParams(format!(
                "bata must be finite, got {}",
                self.bata
            )));
        }
        if self.generation_limit < 1 {
            return Err(SimError::InvalidParams(
                "generation_limit must be at least 1".to_string(),
            ));
        }
        if self.simulation_count < 1 {
            return Err(SimError::InvalidParams(
                "simulation_count must be at least 1".to_string(),
            ));
        }
        if self.attachment_edges < 1 {
            return Err(SimError::InvalidParams(
                "attachment_edges must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "Nodes: {}, Route: {}, Volatility: {}, Pheromone: [{}, {}], Bata: {}, Generations: {}, Replicates: {}",
            self.num_nodes,
            self.optimal_route_length,
            self.volatility,
            self.pheromone_min,
            self.pheromone_max,
            self.bata,
            self.generation_limit,
            self.simulation_count
        )
    }
}

// ============================================================================
// Scenario Files
// ============================================================================

/// Scenario file format
#[derive(Debug, Deserialize)]
pub struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    pub meta: ScenarioMeta,

    /// Simulation parameters
    pub params: Params,

    /// Where results go
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScenarioMeta {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hypothesis: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct OutputConfig {
    /// Log every agent result through the `log` facade
    #[serde(default)]
    pub console: bool,

    /// Directory receiving one JSON document per replicate
    pub json_dir: Option<PathBuf>,

    /// Directory receiving one CSV file per replicate
    pub csv_dir: Option<PathBuf>,

    /// Worker threads for replicates (rayon default when absent)
    pub threads: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] SimError),
}

impl ScenarioFile {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ScenarioError> {
        let scenario: ScenarioFile = serde_yaml::from_str(yaml)?;
        scenario.params.validate()?;
        Ok(scenario)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }
}
