// One replicate: topology construction followed by a fixed number of
// generations, each releasing an ant, a random walker and an interest agent
// between the planted route's endpoints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::aco_agent::{Agent, HopPolicy};
use crate::aco_interface::{
    AgentRecord, GenerationId, GenerationRecord, GenerationSink, ReplicateId, SimError,
};
use crate::aco_network::Network;
use crate::aco_params::Params;
use crate::aco_pheromone;
use crate::aco_replicates::random_seed;
use crate::aco_stats::{seed_hex, RunSummary};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimulationState {
    Initialized,
    TopologyBuilt,
    /// `Running(k)`: generations `0..k` are done and generation `k` runs next
    Running(GenerationId),
    Completed,
    /// A generation or the topology build returned an error; every later
    /// call fails with `SimError::Aborted`
    Failed,
}

pub struct Simulation<S: GenerationSink> {
    params: Params,
    replicate: ReplicateId,
    rng: StdRng,
    network: Option<Network>,
    sink: S,
    state: SimulationState,
    cancel: Option<Arc<AtomicBool>>,
    summary: RunSummary,
}

impl<S: GenerationSink> Simulation<S> {
    /// Create a replicate. Without a seed one is drawn from the thread rng;
    /// either way it is reported in the summary.
    pub fn new(
        params: Params,
        replicate: ReplicateId,
        seed: Option<[u8; 32]>,
        sink: S,
    ) -> Result<Self, SimError> {
        params.validate()?;

        let seed = seed.unwrap_or_else(random_seed);

        Ok(Self {
            params,
            replicate,
            rng: StdRng::from_seed(seed),
            network: None,
            sink,
            state: SimulationState::Initialized,
            cancel: None,
            summary: RunSummary::new(replicate, seed),
        })
    }

    /// Stop before the next generation once `flag` is set
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn build_topology(&mut self) -> Result<(), SimError> {
        match self.state {
            SimulationState::Initialized => {}
            SimulationState::Failed => return Err(SimError::Aborted),
            _ => return Ok(()),
        }

        let result = self.build_topology_inner();
        if result.is_err() {
            self.state = SimulationState::Failed;
        }
        result
    }

    fn build_topology_inner(&mut self) -> Result<(), SimError> {
        let mut network = Network::generate(&self.params, &mut self.rng)?;
        self.sink.topology_built(self.replicate, &mut network)?;
        self.summary.optimal_route = network.optimal_route_ids();

        info!(
            "replicate {}: {} nodes, {} links, optimal route {:?}",
            self.replicate,
            network.len(),
            network.links().len(),
            self.summary.optimal_route
        );

        self.network = Some(network);
        self.state = SimulationState::TopologyBuilt;
        Ok(())
    }

    /// Run one generation: snapshot, release the three agents, update the
    /// field, emit the agents' terminal records.
    ///
    /// Any error other than `Completed` leaves the simulation `Failed`.
    pub fn step_generation(&mut self) -> Result<GenerationRecord, SimError> {
        let generation = match self.state {
            SimulationState::Initialized => {
                self.build_topology()?;
                0
            }
            SimulationState::TopologyBuilt => 0,
            SimulationState::Running(next) => next,
            SimulationState::Completed => return Err(SimError::Completed),
            SimulationState::Failed => return Err(SimError::Aborted),
        };
        if generation >= self.params.generation_limit {
            return Err(SimError::Completed);
        }

        match self.run_generation(generation) {
            Ok(record) => {
                self.summary.observe(&record);
                self.state = SimulationState::Running(generation + 1);
                Ok(record)
            }
            Err(e) => {
                self.state = SimulationState::Failed;
                Err(e)
            }
        }
    }

    fn run_generation(&mut self, generation: GenerationId) -> Result<GenerationRecord, SimError> {
        let network = self.network.as_mut().ok_or(SimError::RouteNotPlanted)?;
        let (start, end) = network.endpoints()?;

        if self.sink.wants_snapshots() {
            let snapshot = network.snapshot();
            self.sink.network_snapshot(self.replicate, generation, &snapshot)?;
        }

        let mut ant = Agent::ant(start, end, self.params.bata);
        let mut walker = Agent::random(start, end);
        let mut interest = Agent::interest(start, end);
        drive(&mut ant, network, &mut self.rng)?;
        drive(&mut walker, network, &mut self.rng)?;
        drive(&mut interest, network, &mut self.rng)?;

        let reinforced = ant.is_at_destination();
        if reinforced {
            aco_pheromone::reinforce(network, ant.route(), ant.route_bottleneck())?;
        }
        aco_pheromone::volatilize(network, &self.params);

        let agents: Vec<AgentRecord> = vec![
            ant.record(network),
            walker.record(network),
            interest.record(network),
        ];
        let record = GenerationRecord {
            generation,
            reinforced,
            agents,
        };

        debug!(
            "replicate {} generation {}: ant {:?} (bottleneck {}), rand {:?}, interest {:?}",
            self.replicate,
            generation,
            ant.state(),
            ant.route_bottleneck(),
            walker.state(),
            interest.state()
        );

        self.sink.generation_result(self.replicate, &record)?;
        Ok(record)
    }

    /// Run every remaining generation (or until cancelled) and finish the sink.
    ///
    /// When a generation fails the sink is still finished, so whatever it has
    /// buffered is flushed, and the generation's error is returned.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        match self.state {
            SimulationState::Completed => return Err(SimError::Completed),
            SimulationState::Failed => return Err(SimError::Aborted),
            _ => {}
        }

        info!(
            "replicate {} starting, seed {}",
            self.replicate,
            seed_hex(&self.summary.seed_used)
        );
        self.build_topology()?;

        while self.summary.generations_completed < self.params.generation_limit {
            if self.is_cancelled() {
                info!(
                    "replicate {} cancelled after {} generations",
                    self.replicate, self.summary.generations_completed
                );
                self.summary.cancelled = true;
                break;
            }
            if let Err(e) = self.step_generation() {
                self.finish_after_failure(&e);
                return Err(e);
            }
        }

        if let Err(e) = self.sink.finish(self.replicate) {
            self.state = SimulationState::Failed;
            return Err(e.into());
        }
        self.state = SimulationState::Completed;

        info!(
            "replicate {} done: {} generations, {} reinforcements",
            self.replicate, self.summary.generations_completed, self.summary.reinforcements
        );
        Ok(self.summary.clone())
    }

    fn finish_after_failure(&mut self, cause: &SimError) {
        if self.network.is_none() {
            return;
        }
        warn!(
            "replicate {} aborted after {} generations: {}",
            self.replicate, self.summary.generations_completed, cause
        );
        if let Err(e) = self.sink.finish(self.replicate) {
            warn!("replicate {}: finish after abort failed: {}", self.replicate, e);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn replicate(&self) -> ReplicateId {
        self.replicate
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn network(&self) -> Option<&Network> {
        self.network.as_ref()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

fn drive<P: HopPolicy>(
    agent: &mut Agent<P>,
    network: &Network,
    rng: &mut StdRng,
) -> Result<(), SimError> {
    while agent.is_movable() {
        agent.advance(network, rng)?;
    }
    Ok(())
}
