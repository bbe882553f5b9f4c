// Network topology: node/link arena, preferential-attachment generator and
// the planted optimal route

use hashbrown::HashSet;
use indexmap::IndexMap;
use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::aco_interface::{
    EdgeSnapshot, Link, LinkId, NetworkSnapshot, NodeId, NodeIndex, NodeSnapshot, Pheromone,
    SimError, Width, OPTIMAL_WIDTH, WIDTH_MAX, WIDTH_STEP,
};
use crate::aco_params::{FloorPolicy, Params};
use crate::aco_pheromone;

/// A node and its adjacency.
///
/// Neighbours keep insertion order, which makes every traversal over them
/// (and therefore every tie-break) reproducible for a given seed.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    neighbors: IndexMap<NodeIndex, LinkId>,
}

impl Node {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            neighbors: IndexMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_neighbor(&self, other: NodeIndex) -> bool {
        self.neighbors.contains_key(&other)
    }

    pub fn link_to(&self, other: NodeIndex) -> Option<LinkId> {
        self.neighbors.get(&other).copied()
    }

    /// `(neighbour, link)` pairs in insertion order
    pub fn neighbors(&self) -> impl Iterator<Item = (NodeIndex, LinkId)> + '_ {
        self.neighbors.iter().map(|(n, l)| (*n, *l))
    }
}

/// Topology of one run.
///
/// Nodes and links are never removed once created; only `Link::pheromone`
/// changes after the route is planted.
#[derive(Debug, Clone)]
pub struct Network {
    nodes: Vec<Node>,
    links: Vec<Link>,
    optimal_route: Vec<NodeIndex>,
}

impl Network {
    /// `count` unconnected nodes with sequential ids `0..count`
    pub fn with_nodes(count: usize) -> Self {
        Self {
            nodes: (0..count).map(|i| Node::new(i as NodeId)).collect(),
            links: Vec::new(),
            optimal_route: Vec::new(),
        }
    }

    /// Build a preferential-attachment network and plant the optimal route
    pub fn generate<R: Rng + ?Sized>(params: &Params, rng: &mut R) -> Result<Self, SimError> {
        params.validate()?;

        let mut network = Self::with_nodes(params.num_nodes);
        network.attach_preferentially(params.attachment_edges, params.pheromone_min, rng)?;
        network.plant_random_route(params.optimal_route_length, rng)?;

        if params.floor_policy == FloorPolicy::DegreeScaled {
            aco_pheromone::reset_to_floor(&mut network, params);
        }

        debug!(
            "network built: {} nodes, {} links, route {:?}",
            network.nodes.len(),
            network.links.len(),
            network.optimal_route_ids()
        );

        Ok(network)
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Add an undirected link; self-loops and parallel links are rejected
    pub fn connect(
        &mut self,
        a: NodeIndex,
        b: NodeIndex,
        width: Width,
        pheromone: Pheromone,
    ) -> Result<LinkId, SimError> {
        if a == b || a >= self.nodes.len() || b >= self.nodes.len() || self.nodes[a].is_neighbor(b)
        {
            return Err(SimError::InvalidLink { a, b });
        }

        let link_id = self.links.len();
        self.links.push(Link {
            a,
            b,
            width,
            pheromone,
        });
        self.nodes[a].neighbors.insert(b, link_id);
        self.nodes[b].neighbors.insert(a, link_id);
        Ok(link_id)
    }

    /// Seed triangle, then attach every further node to `edge_num` distinct
    /// existing nodes drawn by degree without replacement.
    pub fn attach_preferentially<R: Rng + ?Sized>(
        &mut self,
        edge_num: usize,
        pheromone: Pheromone,
        rng: &mut R,
    ) -> Result<(), SimError> {
        if self.nodes.len() < 3 {
            return Err(SimError::InvalidParams(format!(
                "preferential attachment needs at least 3 nodes, got {}",
                self.nodes.len()
            )));
        }

        for (a, b) in [(0, 1), (1, 2), (2, 0)] {
            let width = random_width(rng);
            self.connect(a, b, width, pheromone)?;
        }

        for i in 3..self.nodes.len() {
            let mut candidates: Vec<NodeIndex> = (0..i).collect();
            let mut weights: Vec<usize> = candidates.iter().map(|&j| self.nodes[j].degree()).collect();

            let draws = edge_num.min(candidates.len());
            let mut targets = Vec::with_capacity(draws);
            for _ in 0..draws {
                let dist = WeightedIndex::new(&weights).map_err(|_| SimError::ZeroWeightSelection {
                    node: self.nodes[i].id,
                    candidates: candidates.len(),
                })?;
                let pick = dist.sample(rng);
                targets.push(candidates.remove(pick));
                weights.remove(pick);
            }

            for j in targets {
                let width = random_width(rng);
                self.connect(i, j, width, pheromone)?;
            }
        }

        Ok(())
    }

    /// Random simple walk of `length` hops from a uniformly chosen start; its
    /// links become the optimal route.
    pub fn plant_random_route<R: Rng + ?Sized>(
        &mut self,
        length: usize,
        rng: &mut R,
    ) -> Result<(), SimError> {
        if self.nodes.is_empty() {
            return Err(SimError::InvalidParams("network has no nodes".to_string()));
        }

        let start = rng.gen_range(0..self.nodes.len());
        let mut route = vec![start];
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        visited.insert(start);

        for step in 0..length {
            let current = route[route.len() - 1];
            let unvisited: Vec<NodeIndex> = self.nodes[current]
                .neighbors
                .keys()
                .filter(|n| !visited.contains(*n))
                .copied()
                .collect();

            let next = *unvisited
                .choose(rng)
                .ok_or(SimError::TopologyConstruction {
                    node: self.nodes[current].id,
                    step,
                })?;
            visited.insert(next);
            route.push(next);
        }

        self.plant_route(route)
    }

    /// Make `route` the optimal route: force its links to `OPTIMAL_WIDTH`.
    ///
    /// The route must be a simple path of at least one hop over existing links.
    pub fn plant_route(&mut self, route: Vec<NodeIndex>) -> Result<(), SimError> {
        if route.len() < 2 {
            return Err(SimError::InvalidRoute(format!(
                "needs at least two nodes, got {}",
                route.len()
            )));
        }

        let mut seen: HashSet<NodeIndex> = HashSet::new();
        for &n in &route {
            if n >= self.nodes.len() {
                return Err(SimError::UnknownNode(n));
            }
            if !seen.insert(n) {
                return Err(SimError::InvalidRoute(format!("node index {} repeats", n)));
            }
        }

        let mut link_ids = Vec::with_capacity(route.len() - 1);
        for pair in route.windows(2) {
            let link = self.nodes[pair[0]].link_to(pair[1]).ok_or_else(|| {
                SimError::InvalidRoute(format!("no link between {} and {}", pair[0], pair[1]))
            })?;
            link_ids.push(link);
        }

        for link in link_ids {
            self.links[link].width = OPTIMAL_WIDTH;
        }
        self.optimal_route = route;
        Ok(())
    }

    /// Write an externally assigned id onto a node; ids stay unique
    pub fn assign_node_id(&mut self, index: NodeIndex, id: NodeId) -> Result<(), SimError> {
        if index >= self.nodes.len() {
            return Err(SimError::UnknownNode(index));
        }
        if self
            .nodes
            .iter()
            .enumerate()
            .any(|(i, n)| i != index && n.id == id)
        {
            return Err(SimError::DuplicateNodeId(id));
        }
        self.nodes[index].id = id;
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_id(&self, index: NodeIndex) -> Option<NodeId> {
        self.nodes.get(index).map(|n| n.id)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub(crate) fn links_mut(&mut self) -> &mut [Link] {
        &mut self.links
    }

    pub fn link_between(&self, a: NodeIndex, b: NodeIndex) -> Option<&Link> {
        self.nodes
            .get(a)
            .and_then(|n| n.link_to(b))
            .map(|l| &self.links[l])
    }

    pub fn link_between_mut(&mut self, a: NodeIndex, b: NodeIndex) -> Option<&mut Link> {
        let link = self.nodes.get(a).and_then(|n| n.link_to(b))?;
        self.links.get_mut(link)
    }

    /// `(start_node, end_node)` of the planted route
    pub fn endpoints(&self) -> Result<(NodeIndex, NodeIndex), SimError> {
        match (self.optimal_route.first(), self.optimal_route.last()) {
            (Some(&s), Some(&e)) if self.optimal_route.len() >= 2 => Ok((s, e)),
            _ => Err(SimError::RouteNotPlanted),
        }
    }

    pub fn start_node(&self) -> Option<NodeIndex> {
        self.endpoints().ok().map(|(s, _)| s)
    }

    pub fn end_node(&self) -> Option<NodeIndex> {
        self.endpoints().ok().map(|(_, e)| e)
    }

    pub fn optimal_route(&self) -> &[NodeIndex] {
        &self.optimal_route
    }

    pub fn optimal_route_ids(&self) -> Vec<NodeId> {
        self.optimal_route.iter().map(|&n| self.nodes[n].id).collect()
    }

    /// Full node/edge state, nodes in arena order, edges in neighbour order
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            optimal_route: self.optimal_route_ids(),
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeSnapshot {
                    id: node.id,
                    edges: node
                        .neighbors()
                        .map(|(n, l)| EdgeSnapshot {
                            neighbor: self.nodes[n].id,
                            width: self.links[l].width,
                            pheromone: self.links[l].pheromone,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

fn random_width<R: Rng + ?Sized>(rng: &mut R) -> Width {
    rng.gen_range(1..=WIDTH_MAX / WIDTH_STEP) * WIDTH_STEP
}
