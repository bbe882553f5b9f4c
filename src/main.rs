use log::{info, warn};
use simple_logger::SimpleLogger;

use aco_rust::aco_replicates::random_seed;
use aco_rust::aco_stats::seed_hex;
use aco_rust::{run_replicates, LoggingSink, Params};

fn main() {
    if let Err(e) = SimpleLogger::new().init() {
        eprintln!("logger init failed: {}", e);
    }

    let params = Params {
        simulation_count: 2,
        ..Params::default()
    };
    let seed = random_seed();

    info!("starting: {}", params.summary());
    info!("master seed {}", seed_hex(&seed));

    for outcome in run_replicates(&params, seed, |_| Ok(LoggingSink), None) {
        match outcome.result {
            Ok(summary) => summary.print_summary(),
            Err(e) => warn!("replicate {} failed: {}", outcome.replicate, e),
        }
    }
}
