// Independent replicates of one parameter set, run in parallel on the rayon
// pool. Each replicate owns its network, rng and sink; nothing is shared but
// the parameters and the cancel flag.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::aco_interface::{GenerationSink, ReplicateId, SimError, SinkError};
use crate::aco_params::Params;
use crate::aco_simulation::Simulation;
use crate::aco_stats::{seed_hex, RunSummary};

/// Fresh 32-byte seed from the thread rng
pub fn random_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill(&mut seed);
    seed
}

/// Per-replicate seeds derived from one master seed
pub fn replicate_seeds(master: [u8; 32], count: usize) -> Vec<[u8; 32]> {
    let mut rng = StdRng::from_seed(master);
    (0..count).map(|_| rng.gen()).collect()
}

#[derive(Debug)]
pub struct ReplicateOutcome {
    pub replicate: ReplicateId,
    pub seed: [u8; 32],
    pub result: Result<RunSummary, SimError>,
}

/// Run `params.simulation_count` replicates.
///
/// A replicate that fails (topology construction, sink error, ...) is reported
/// in its outcome; the others run to completion. Outcomes are in replicate
/// order.
pub fn run_replicates<S, F>(
    params: &Params,
    master_seed: [u8; 32],
    make_sink: F,
    cancel: Option<Arc<AtomicBool>>,
) -> Vec<ReplicateOutcome>
where
    S: GenerationSink,
    F: Fn(ReplicateId) -> Result<S, SinkError> + Sync,
{
    info!(
        "running {} replicates, master seed {}",
        params.simulation_count,
        seed_hex(&master_seed)
    );

    let seeds = replicate_seeds(master_seed, params.simulation_count);
    seeds
        .into_par_iter()
        .enumerate()
        .map(|(replicate, seed)| {
            let result = run_one(params, replicate, seed, &make_sink, cancel.clone());
            if let Err(e) = &result {
                warn!("replicate {} failed: {}", replicate, e);
            }
            ReplicateOutcome {
                replicate,
                seed,
                result,
            }
        })
        .collect()
}

fn run_one<S, F>(
    params: &Params,
    replicate: ReplicateId,
    seed: [u8; 32],
    make_sink: &F,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<RunSummary, SimError>
where
    S: GenerationSink,
    F: Fn(ReplicateId) -> Result<S, SinkError>,
{
    let sink = make_sink(replicate)?;
    let mut sim = Simulation::new(params.clone(), replicate, Some(seed), sink)?;
    if let Some(flag) = cancel {
        sim = sim.with_cancel(flag);
    }
    sim.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aco_interface::{NoOpSink, DEFAULT_ATTACHMENT_EDGES};
    use crate::aco_params::FloorPolicy;
    use std::sync::atomic::Ordering;

    fn params(replicates: usize) -> Params {
        Params {
            num_nodes: 25,
            optimal_route_length: 3,
            volatility: 0.99,
            pheromone_min: 100,
            pheromone_max: 1 << 20,
            ttl: 100,
            bata: 1.0,
            generation_limit: 6,
            simulation_count: replicates,
            attachment_edges: DEFAULT_ATTACHMENT_EDGES,
            floor_policy: FloorPolicy::Fixed,
        }
    }

    #[test]
    fn test_replicate_seeds_are_deterministic_and_distinct() {
        let a = replicate_seeds([8u8; 32], 4);
        let b = replicate_seeds([8u8; 32], 4);
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        for i in 0..a.len() {
            for j in (i + 1)..a.len() {
                assert_ne!(a[i], a[j]);
            }
        }
        assert_ne!(replicate_seeds([9u8; 32], 1)[0], a[0]);
    }

    #[test]
    fn test_outcomes_in_replicate_order() {
        let outcomes = run_replicates(&params(5), [1u8; 32], |_| Ok(NoOpSink), None);
        let seeds = replicate_seeds([1u8; 32], 5);
        assert_eq!(outcomes.len(), 5);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.replicate, i);
            assert_eq!(outcome.seed, seeds[i]);
            let summary = outcome.result.as_ref().unwrap();
            assert_eq!(summary.replicate, i);
            assert_eq!(summary.seed_used, seeds[i]);
            assert_eq!(summary.generations_completed, 6);
        }
    }

    #[test]
    fn test_sink_construction_failure_is_isolated() {
        let outcomes = run_replicates(
            &params(3),
            [2u8; 32],
            |replicate| {
                if replicate == 1 {
                    Err(SinkError::Rejected("no output for 1".to_string()))
                } else {
                    Ok(NoOpSink)
                }
            },
            None,
        );
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(SimError::Sink(_))));
        assert!(outcomes[2].result.is_ok());
    }

    #[test]
    fn test_zero_weight_selection_fails_only_its_replicate() {
        let mut p = params(12);
        p.pheromone_min = 0;
        let outcomes = run_replicates(&p, [4u8; 32], |_| Ok(NoOpSink), None);

        assert_eq!(outcomes.len(), 12);
        let mut zero_weight = 0;
        for outcome in &outcomes {
            match &outcome.result {
                Err(SimError::ZeroWeightSelection { .. }) => zero_weight += 1,
                // endpoints that share a link never need a weighted draw
                Ok(summary) => assert_eq!(summary.generations_completed, 6),
                Err(e) => panic!("replicate {}: unexpected error {}", outcome.replicate, e),
            }
        }
        assert!(zero_weight > 0);
    }

    #[test]
    fn test_cancel_flag_reaches_every_replicate() {
        let flag = Arc::new(AtomicBool::new(false));
        flag.store(true, Ordering::Relaxed);
        let outcomes = run_replicates(&params(3), [3u8; 32], |_| Ok(NoOpSink), Some(flag));
        for outcome in outcomes {
            let summary = outcome.result.unwrap();
            assert!(summary.cancelled);
            assert_eq!(summary.generations_completed, 0);
        }
    }
}
