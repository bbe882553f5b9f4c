use serde::Serialize;
use thiserror::Error;

use crate::aco_network::Network;

// external, durable identity of a node (what snapshots carry)
pub type NodeId = u64;
// position of a node in the network arena; stable for the lifetime of a run
pub type NodeIndex = usize;
// position of a link in the edge arena
pub type LinkId = usize;

pub type Width = u32;
pub type Pheromone = u64;

pub type ReplicateId = usize;
pub type GenerationId = usize;

/// Random link widths are drawn from `WIDTH_STEP..=WIDTH_MAX` in steps of `WIDTH_STEP`
pub const WIDTH_STEP: Width = 10;
pub const WIDTH_MAX: Width = 100;

/// Width forced onto every edge of the planted route
pub const OPTIMAL_WIDTH: Width = 100;

/// Initial bottleneck of a fresh agent; larger than any real width
pub const ROUTE_BOTTLENECK_SENTINEL: Width = 1 << 8;

/// Out-degree used for preferential attachment when a scenario does not say
pub const DEFAULT_ATTACHMENT_EDGES: usize = 3;

/// Undirected link stored once in the network's edge arena.
///
/// Both endpoints reference the same `LinkId`, so a pheromone update made while
/// traversing from either side is seen from the other.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub a: NodeIndex,
    pub b: NodeIndex,
    pub width: Width,
    pub pheromone: Pheromone,
}

impl Link {
    /// The endpoint opposite `node`, or `None` if `node` is not on this link
    pub fn other(&self, node: NodeIndex) -> Option<NodeIndex> {
        if node == self.a {
            Some(self.b)
        } else if node == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Pheromone-proportional stochastic routing (reinforces the field)
    Ant,
    /// Uniform random routing (baseline)
    Rand,
    /// Greedy pheromone following
    Interest,
}

impl AgentKind {
    /// Release order within one generation
    pub const ALL: [AgentKind; 3] = [AgentKind::Ant, AgentKind::Rand, AgentKind::Interest];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Ant => "ant",
            AgentKind::Rand => "rand",
            AgentKind::Interest => "interest",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Traveling,
    Arrived,
    Stuck,
}

impl AgentState {
    /// Arrived and Stuck are both terminal ("unmovable")
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AgentState::Traveling)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Traveling => "traveling",
            AgentState::Arrived => "arrived",
            AgentState::Stuck => "stuck",
        }
    }
}

// ============================================================================
// Emission Records
// ============================================================================

/// Full node/edge state of the network at a generation boundary
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    /// Planted route, in the ids current when the snapshot was taken
    pub optimal_route: Vec<NodeId>,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub edges: Vec<EdgeSnapshot>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EdgeSnapshot {
    pub neighbor: NodeId,
    pub width: Width,
    pub pheromone: Pheromone,
}

/// Terminal snapshot of one agent
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentRecord {
    pub kind: AgentKind,
    pub source: NodeId,
    pub destination: NodeId,
    pub route: Vec<NodeId>,
    pub route_width: Vec<Width>,
    pub route_bottleneck: Width,
    pub state: AgentState,
}

impl AgentRecord {
    pub fn arrived(&self) -> bool {
        self.state == AgentState::Arrived
    }
}

/// Agent outcomes of one generation, in release order
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub generation: GenerationId,
    pub reinforced: bool,
    pub agents: Vec<AgentRecord>,
}

impl GenerationRecord {
    pub fn agent(&self, kind: AgentKind) -> Option<&AgentRecord> {
        self.agents.iter().find(|a| a.kind == kind)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SimError {
    /// Planted-route walk ran out of unvisited neighbours; fatal to the run
    #[error("topology construction failed: node {node} has no unvisited neighbor at route step {step}")]
    TopologyConstruction { node: NodeId, step: usize },

    /// All candidate weights of an ant's weighted choice were zero
    #[error("zero weight selection at node {node} ({candidates} candidates)")]
    ZeroWeightSelection { node: NodeId, candidates: usize },

    /// A candidate weight was negative or not finite
    #[error("invalid selection weight at node {node}: {weight}")]
    InvalidWeight { node: NodeId, weight: f64 },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("node id {0} is already assigned in this network")]
    DuplicateNodeId(NodeId),

    #[error("no node at index {0}")]
    UnknownNode(NodeIndex),

    /// Self-loop, duplicate edge, or unknown endpoint
    #[error("cannot link node {a} to node {b}")]
    InvalidLink { a: NodeIndex, b: NodeIndex },

    /// The route is not a simple path over existing links
    #[error("route is not a simple linked path: {0}")]
    InvalidRoute(String),

    #[error("no optimal route has been planted")]
    RouteNotPlanted,

    #[error("simulation already completed")]
    Completed,

    /// An earlier error ended the run; a failed generation is never retried
    #[error("simulation aborted by an earlier error")]
    Aborted,

    #[error("emission failed: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sink rejected record: {0}")]
    Rejected(String),
}

// ============================================================================
// Emission Sink
// ============================================================================

/// Consumer of per-generation results (store, document writer, logger, ...)
///
/// Errors returned here abort the remaining generations of the replicate.
pub trait GenerationSink {
    /// Called once after the topology is built and before any snapshot.
    ///
    /// A store that assigns its own durable node ids writes them back here via
    /// [`Network::assign_node_id`].
    fn topology_built(
        &mut self,
        _replicate: ReplicateId,
        _network: &mut Network,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    /// Whether `network_snapshot` should be called at all
    fn wants_snapshots(&self) -> bool {
        true
    }

    /// Pre-update state of the field at the start of a generation
    fn network_snapshot(
        &mut self,
        replicate: ReplicateId,
        generation: GenerationId,
        snapshot: &NetworkSnapshot,
    ) -> Result<(), SinkError>;

    /// Terminal agent snapshots after the field update
    fn generation_result(
        &mut self,
        replicate: ReplicateId,
        record: &GenerationRecord,
    ) -> Result<(), SinkError>;

    /// Called once after the last generation of a replicate
    fn finish(&mut self, _replicate: ReplicateId) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: GenerationSink + ?Sized> GenerationSink for Box<S> {
    fn topology_built(
        &mut self,
        replicate: ReplicateId,
        network: &mut Network,
    ) -> Result<(), SinkError> {
        (**self).topology_built(replicate, network)
    }

    fn wants_snapshots(&self) -> bool {
        (**self).wants_snapshots()
    }

    fn network_snapshot(
        &mut self,
        replicate: ReplicateId,
        generation: GenerationId,
        snapshot: &NetworkSnapshot,
    ) -> Result<(), SinkError> {
        (**self).network_snapshot(replicate, generation, snapshot)
    }

    fn generation_result(
        &mut self,
        replicate: ReplicateId,
        record: &GenerationRecord,
    ) -> Result<(), SinkError> {
        (**self).generation_result(replicate, record)
    }

    fn finish(&mut self, replicate: ReplicateId) -> Result<(), SinkError> {
        (**self).finish(replicate)
    }
}

/// Discards everything
pub struct NoOpSink;

impl GenerationSink for NoOpSink {
    fn wants_snapshots(&self) -> bool {
        false
    }

    #[inline(always)]
    fn network_snapshot(
        &mut self,
        _replicate: ReplicateId,
        _generation: GenerationId,
        _snapshot: &NetworkSnapshot,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    #[inline(always)]
    fn generation_result(
        &mut self,
        _replicate: ReplicateId,
        _record: &GenerationRecord,
    ) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_other_endpoint() {
        let link = Link {
            a: 1,
            b: 4,
            width: 30,
            pheromone: 100,
        };
        assert_eq!(link.other(1), Some(4));
        assert_eq!(link.other(4), Some(1));
        assert_eq!(link.other(2), None);
    }

    #[test]
    fn test_agent_state_terminal() {
        assert!(!AgentState::Traveling.is_terminal());
        assert!(AgentState::Arrived.is_terminal());
        assert!(AgentState::Stuck.is_terminal());
    }

    #[test]
    fn test_sentinel_exceeds_any_width() {
        assert!(ROUTE_BOTTLENECK_SENTINEL > WIDTH_MAX);
        assert!(ROUTE_BOTTLENECK_SENTINEL > OPTIMAL_WIDTH);
    }
}
