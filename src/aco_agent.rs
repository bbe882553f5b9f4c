// Routing agents: one traversal state machine, three next-hop policies

use hashbrown::HashSet;
use log::trace;
use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;

use crate::aco_interface::{
    AgentKind, AgentRecord, AgentState, NodeId, NodeIndex, Pheromone, SimError, Width,
    ROUTE_BOTTLENECK_SENTINEL,
};
use crate::aco_network::Network;

/// An unvisited neighbour offered to a policy, with the link leading to it
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub node: NodeIndex,
    pub width: Width,
    pub pheromone: Pheromone,
}

/// Next-hop selection for an agent.
///
/// `choose_next` is only called with a non-empty candidate list in neighbour
/// order, and returns a position in that list.
pub trait HopPolicy {
    const KIND: AgentKind;

    /// Whether a single `advance` call drives the agent to a terminal state
    const RUNS_TO_COMPLETION: bool;

    fn choose_next<R: Rng + ?Sized>(
        &mut self,
        at: NodeId,
        candidates: &[Candidate],
        rng: &mut R,
    ) -> Result<usize, SimError>;
}

/// Weighted random choice by `width^bata * pheromone`
#[derive(Copy, Clone, Debug)]
pub struct AntPolicy {
    pub bata: f64,
}

impl HopPolicy for AntPolicy {
    const KIND: AgentKind = AgentKind::Ant;
    const RUNS_TO_COMPLETION: bool = true;

    fn choose_next<R: Rng + ?Sized>(
        &mut self,
        at: NodeId,
        candidates: &[Candidate],
        rng: &mut R,
    ) -> Result<usize, SimError> {
        let weights: Vec<f64> = candidates
            .iter()
            .map(|c| (c.width as f64).powf(self.bata) * c.pheromone as f64)
            .collect();

        if let Some(&weight) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(SimError::InvalidWeight { node: at, weight });
        }

        let dist = WeightedIndex::new(&weights).map_err(|e| match e {
            WeightedError::AllWeightsZero | WeightedError::NoItem => SimError::ZeroWeightSelection {
                node: at,
                candidates: candidates.len(),
            },
            _ => SimError::InvalidWeight {
                node: at,
                weight: f64::NAN,
            },
        })?;
        Ok(dist.sample(rng))
    }
}

/// Uniform choice among unvisited neighbours
#[derive(Copy, Clone, Debug, Default)]
pub struct RandPolicy;

impl HopPolicy for RandPolicy {
    const KIND: AgentKind = AgentKind::Rand;
    const RUNS_TO_COMPLETION: bool = false;

    fn choose_next<R: Rng + ?Sized>(
        &mut self,
        at: NodeId,
        candidates: &[Candidate],
        rng: &mut R,
    ) -> Result<usize, SimError> {
        if candidates.is_empty() {
            return Err(SimError::ZeroWeightSelection { node: at, candidates: 0 });
        }
        Ok(rng.gen_range(0..candidates.len()))
    }
}

/// Follow the strongest trail.
///
/// Ties go to the earliest candidate in neighbour order.
#[derive(Copy, Clone, Debug, Default)]
pub struct InterestPolicy;

impl HopPolicy for InterestPolicy {
    const KIND: AgentKind = AgentKind::Interest;
    const RUNS_TO_COMPLETION: bool = false;

    fn choose_next<R: Rng + ?Sized>(
        &mut self,
        at: NodeId,
        candidates: &[Candidate],
        _rng: &mut R,
    ) -> Result<usize, SimError> {
        let mut best: Option<(usize, Pheromone)> = None;
        for (i, c) in candidates.iter().enumerate() {
            match best {
                Some((_, p)) if c.pheromone <= p => {}
                _ => best = Some((i, c.pheromone)),
            }
        }
        best.map(|(i, _)| i)
            .ok_or(SimError::ZeroWeightSelection { node: at, candidates: 0 })
    }
}

/// Packet travelling from `source` toward `destination`.
///
/// The route doubles as the visited set, so every walk is a simple path.
#[derive(Debug, Clone)]
pub struct Agent<P: HopPolicy> {
    policy: P,
    source: NodeIndex,
    destination: NodeIndex,
    current: NodeIndex,
    route: Vec<NodeIndex>,
    visited: HashSet<NodeIndex>,
    route_width: Vec<Width>,
    route_bottleneck: Width,
    state: AgentState,
}

pub type Ant = Agent<AntPolicy>;
pub type RandomWalker = Agent<RandPolicy>;
pub type Interest = Agent<InterestPolicy>;

impl Agent<AntPolicy> {
    pub fn ant(source: NodeIndex, destination: NodeIndex, bata: f64) -> Self {
        Self::new(AntPolicy { bata }, source, destination)
    }
}

impl Agent<RandPolicy> {
    pub fn random(source: NodeIndex, destination: NodeIndex) -> Self {
        Self::new(RandPolicy, source, destination)
    }
}

impl Agent<InterestPolicy> {
    pub fn interest(source: NodeIndex, destination: NodeIndex) -> Self {
        Self::new(InterestPolicy, source, destination)
    }
}

impl<P: HopPolicy> Agent<P> {
    pub fn new(policy: P, source: NodeIndex, destination: NodeIndex) -> Self {
        let mut visited = HashSet::new();
        visited.insert(source);
        Self {
            policy,
            source,
            destination,
            current: source,
            route: vec![source],
            visited,
            route_width: Vec::new(),
            route_bottleneck: ROUTE_BOTTLENECK_SENTINEL,
            state: AgentState::Traveling,
        }
    }

    /// One step of the state machine; a no-op once terminal
    pub fn hop<R: Rng + ?Sized>(
        &mut self,
        network: &Network,
        rng: &mut R,
    ) -> Result<AgentState, SimError> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        let node = network
            .node(self.current)
            .ok_or(SimError::UnknownNode(self.current))?;

        let candidates: Vec<Candidate> = node
            .neighbors()
            .filter(|(n, _)| !self.visited.contains(n))
            .map(|(n, l)| {
                let link = &network.links()[l];
                Candidate {
                    node: n,
                    width: link.width,
                    pheromone: link.pheromone,
                }
            })
            .collect();

        if candidates.is_empty() {
            trace!("{} stuck at {}", P::KIND.as_str(), node.id());
            self.state = AgentState::Stuck;
            return Ok(self.state);
        }

        if let Some(link) = node.link_to(self.destination) {
            let width = network.links()[link].width;
            self.move_to(self.destination, width);
            trace!("{} arrived at {}", P::KIND.as_str(), node.id());
            self.state = AgentState::Arrived;
            return Ok(self.state);
        }

        let pick = self.policy.choose_next(node.id(), &candidates, rng)?;
        let next = candidates.get(pick).copied().ok_or_else(|| {
            SimError::InvalidRoute(format!("policy chose candidate {} of {}", pick, candidates.len()))
        })?;
        trace!("{} {} -> {}", P::KIND.as_str(), node.id(), next.node);
        self.move_to(next.node, next.width);
        Ok(self.state)
    }

    /// Advance the way this agent kind is driven: to completion for the ant,
    /// a single hop for the others.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        network: &Network,
        rng: &mut R,
    ) -> Result<AgentState, SimError> {
        if P::RUNS_TO_COMPLETION {
            self.run_to_completion(network, rng)
        } else {
            self.hop(network, rng)
        }
    }

    /// Hop until Arrived or Stuck; bounded by the node count since every hop
    /// consumes an unvisited node
    pub fn run_to_completion<R: Rng + ?Sized>(
        &mut self,
        network: &Network,
        rng: &mut R,
    ) -> Result<AgentState, SimError> {
        while !self.state.is_terminal() {
            self.hop(network, rng)?;
        }
        Ok(self.state)
    }

    fn move_to(&mut self, next: NodeIndex, width: Width) {
        self.route.push(next);
        self.visited.insert(next);
        self.route_width.push(width);
        self.route_bottleneck = self.route_bottleneck.min(width);
        self.current = next;
    }

    pub fn kind(&self) -> AgentKind {
        P::KIND
    }

    pub fn is_at_destination(&self) -> bool {
        self.state == AgentState::Arrived
    }

    pub fn is_movable(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn source(&self) -> NodeIndex {
        self.source
    }

    pub fn destination(&self) -> NodeIndex {
        self.destination
    }

    pub fn current_node(&self) -> NodeIndex {
        self.current
    }

    pub fn route(&self) -> &[NodeIndex] {
        &self.route
    }

    pub fn route_width(&self) -> &[Width] {
        &self.route_width
    }

    pub fn route_bottleneck(&self) -> Width {
        self.route_bottleneck
    }

    /// Snapshot with node indices translated to node ids
    pub fn record(&self, network: &Network) -> AgentRecord {
        let id = |n: NodeIndex| network.node_id(n).unwrap_or(n as NodeId);
        AgentRecord {
            kind: P::KIND,
            source: id(self.source),
            destination: id(self.destination),
            route: self.route.iter().map(|&n| id(n)).collect(),
            route_width: self.route_width.clone(),
            route_bottleneck: self.route_bottleneck,
            state: self.state,
        }
    }
}
