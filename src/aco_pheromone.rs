// Pheromone field updates, applied once per generation: reinforcement along a
// successful ant route, then volatilization of every link.

use log::trace;

use crate::aco_interface::{Link, NodeIndex, Pheromone, SimError, Width};
use crate::aco_network::Network;
use crate::aco_params::Params;

/// Clamp floor for `link` under the configured floor policy
pub fn link_floor(network: &Network, link: &Link, params: &Params) -> Pheromone {
    let degree = |n: NodeIndex| network.node(n).map(|node| node.degree()).unwrap_or(0);
    let busiest = degree(link.a).max(degree(link.b));
    params.floor_policy.floor(params, busiest)
}

/// Set every link's pheromone to its own floor
pub fn reset_to_floor(network: &mut Network, params: &Params) {
    let floors = floors(network, params);
    for (link, floor) in network.links_mut().iter_mut().zip(floors) {
        link.pheromone = floor;
    }
}

/// Add `bottleneck` to every link along `route` (uncapped).
///
/// Returns the number of links reinforced.
pub fn reinforce(
    network: &mut Network,
    route: &[NodeIndex],
    bottleneck: Width,
) -> Result<usize, SimError> {
    let mut reinforced = 0;
    for pair in route.windows(2) {
        let link = network.link_between_mut(pair[0], pair[1]).ok_or_else(|| {
            SimError::InvalidRoute(format!("no link between {} and {}", pair[0], pair[1]))
        })?;
        link.pheromone = link.pheromone.saturating_add(bottleneck as Pheromone);
        reinforced += 1;
    }
    trace!("reinforced {} links by {}", reinforced, bottleneck);
    Ok(reinforced)
}

/// Decay every link by `volatility` (rounded down), then clamp into
/// `[floor, pheromone_max]`.
pub fn volatilize(network: &mut Network, params: &Params) {
    let floors = floors(network, params);
    for (link, floor) in network.links_mut().iter_mut().zip(floors) {
        let decayed = (link.pheromone as f64 * params.volatility).floor() as Pheromone;
        link.pheromone = if decayed < floor {
            floor
        } else if decayed > params.pheromone_max {
            params.pheromone_max
        } else {
            decayed
        };
    }
}

fn floors(network: &Network, params: &Params) -> Vec<Pheromone> {
    network
        .links()
        .iter()
        .map(|link| link_floor(network, link, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aco_interface::DEFAULT_ATTACHMENT_EDGES;
    use crate::aco_params::FloorPolicy;

    fn params(min: Pheromone, max: Pheromone, volatility: f64) -> Params {
        Params {
            num_nodes: 4,
            optimal_route_length: 2,
            volatility,
            pheromone_min: min,
            pheromone_max: max,
            ttl: 100,
            bata: 1.0,
            generation_limit: 1,
            simulation_count: 1,
            attachment_edges: DEFAULT_ATTACHMENT_EDGES,
            floor_policy: FloorPolicy::Fixed,
        }
    }

    // 0 - 1 - 2 - 3 with a shortcut 0 - 2
    fn square(pheromone: Pheromone) -> Network {
        let mut network = Network::with_nodes(4);
        network.connect(0, 1, 40, pheromone).unwrap();
        network.connect(1, 2, 70, pheromone).unwrap();
        network.connect(2, 3, 100, pheromone).unwrap();
        network.connect(0, 2, 20, pheromone).unwrap();
        network
    }

    #[test]
    fn test_reinforce_only_route_links() {
        let mut network = square(100);
        let n = reinforce(&mut network, &[0, 1, 2, 3], 40).unwrap();
        assert_eq!(n, 3);

        assert_eq!(network.link_between(0, 1).unwrap().pheromone, 140);
        assert_eq!(network.link_between(2, 1).unwrap().pheromone, 140);
        assert_eq!(network.link_between(3, 2).unwrap().pheromone, 140);
        assert_eq!(network.link_between(0, 2).unwrap().pheromone, 100);
    }

    #[test]
    fn test_reinforce_is_uncapped() {
        let mut network = square(1000);
        reinforce(&mut network, &[0, 1], 100).unwrap();
        assert_eq!(network.link_between(0, 1).unwrap().pheromone, 1100);
    }

    #[test]
    fn test_reinforce_rejects_unlinked_route() {
        let mut network = square(100);
        assert!(reinforce(&mut network, &[1, 3], 10).is_err());
    }

    #[test]
    fn test_volatilize_decays_and_rounds_down() {
        let p = params(100, 1 << 20, 0.99);
        let mut network = square(1000);
        network.link_between_mut(0, 2).unwrap().pheromone = 101;
        volatilize(&mut network, &p);

        assert_eq!(network.link_between(0, 1).unwrap().pheromone, 990);
        // 101 * 0.99 = 99.99 -> 99 -> clamped to the floor
        assert_eq!(network.link_between(0, 2).unwrap().pheromone, 100);
    }

    #[test]
    fn test_volatilize_clamps_into_bounds() {
        let p = params(100, 500, 0.9);
        let mut network = square(100);
        reinforce(&mut network, &[0, 1, 2], 1000).unwrap();
        volatilize(&mut network, &p);

        for link in network.links() {
            assert!(link.pheromone >= p.pheromone_min && link.pheromone <= p.pheromone_max);
        }
        assert_eq!(network.link_between(0, 1).unwrap().pheromone, 500);
        assert_eq!(network.link_between(0, 2).unwrap().pheromone, 100);
    }

    #[test]
    fn test_floor_is_fixed_point() {
        let p = params(100, 1000, 0.5);
        let mut network = square(100);
        for _ in 0..5 {
            volatilize(&mut network, &p);
        }
        assert!(network.links().iter().all(|l| l.pheromone == 100));
    }

    #[test]
    fn test_degenerate_bounds_pin_every_link() {
        let p = params(100, 100, 0.99);
        let mut network = square(100);
        reinforce(&mut network, &[3, 2, 1, 0], 70).unwrap();
        volatilize(&mut network, &p);
        assert!(network.links().iter().all(|l| l.pheromone == 100));
    }

    #[test]
    fn test_degree_scaled_floor() {
        let mut p = params(100, 1000, 0.5);
        p.floor_policy = FloorPolicy::DegreeScaled;
        let mut network = square(10);

        // degrees: 0 -> 2, 1 -> 2, 2 -> 3, 3 -> 1
        reset_to_floor(&mut network, &p);
        assert_eq!(network.link_between(0, 1).unwrap().pheromone, 150);
        assert_eq!(network.link_between(1, 2).unwrap().pheromone, 100);
        assert_eq!(network.link_between(2, 3).unwrap().pheromone, 100);

        volatilize(&mut network, &p);
        assert_eq!(network.link_between(0, 1).unwrap().pheromone, 150);
        assert_eq!(network.link_between(0, 2).unwrap().pheromone, 100);
    }
}
