//! # aco-routing - Pheromone Routing Simulation
//!
//! Simulates ant-colony style routing over a scale-free network. Each run
//! builds a preferential-attachment topology with a hidden high-capacity
//! route, then repeatedly releases three kinds of packets between the route's
//! endpoints and records how well each finds it:
//!
//! - **Ant**: picks links by `width^bata * pheromone` and reinforces the links
//!   of every route it completes with the route's bottleneck width
//! - **Rand**: uniform random walk (baseline)
//! - **Interest**: always follows the strongest pheromone trail
//!
//! After every generation all pheromone decays by the volatility factor and is
//! clamped into `[pheromone_min, pheromone_max]`.
//!
//! ## Core Components
//!
//! - **Network**: node/link arena, topology generator, planted route
//! - **Agent**: traversal state machine parameterised by a `HopPolicy`
//! - **Simulation**: one replicate, generation by generation
//! - **GenerationSink**: where snapshots and agent results go
//!
//! ```no_run
//! use aco_rust::{CollectorSink, Params, Simulation};
//!
//! let params = Params::default();
//! let mut sim = Simulation::new(params, 0, Some([7u8; 32]), CollectorSink::new()).unwrap();
//! let summary = sim.run().unwrap();
//! summary.print_summary();
//! ```
//!
//! Many replicates of one parameter set run in parallel through
//! [`aco_replicates::run_replicates`]; the `scenario_runner` binary drives
//! them from YAML files.

pub mod aco_interface;
pub mod aco_params;

// Topology and routing
pub mod aco_agent;
pub mod aco_network;
pub mod aco_pheromone;

// Running
pub mod aco_replicates;
pub mod aco_simulation;
pub mod aco_stats;

// Emission
pub mod aco_sinks;

// Re-export commonly used types
pub use aco_agent::{Agent, Ant, HopPolicy, Interest, RandomWalker};
pub use aco_interface::{
    AgentKind, AgentRecord, AgentState, GenerationRecord, GenerationSink, NetworkSnapshot,
    NoOpSink, NodeId, SimError, SinkError,
};
pub use aco_network::Network;
pub use aco_params::{FloorPolicy, Params, ScenarioFile};
pub use aco_replicates::{run_replicates, ReplicateOutcome};
pub use aco_simulation::{Simulation, SimulationState};
pub use aco_sinks::{CollectorSink, CsvSink, JsonDocumentSink, LoggingSink, MultiSink};
pub use aco_stats::RunSummary;
