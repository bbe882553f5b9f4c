// Scenario Runner - Load and execute scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/baseline.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/baseline.yaml --seed 0x1234...
//   cargo run --bin scenario_runner scenarios/baseline.yaml --verbose

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, LevelFilter};
use simple_logger::SimpleLogger;

use aco_rust::aco_params::OutputConfig;
use aco_rust::aco_replicates::random_seed;
use aco_rust::aco_stats::seed_hex;
use aco_rust::{
    run_replicates, CsvSink, JsonDocumentSink, LoggingSink, MultiSink, Params, ReplicateOutcome,
    ScenarioFile, SinkError,
};

struct Args {
    path: PathBuf,
    seed: Option<[u8; 32]>,
    verbose: bool,
}

fn main() {
    let args = match parse_args(env::args().collect()) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    };

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("logger init failed: {}", e);
    }

    let path = args.path.as_path();
    let ok = if path.is_file() {
        run_scenario_file(path, args.seed)
    } else if path.is_dir() {
        run_scenario_directory(path, args.seed)
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        false
    };

    if !ok {
        std::process::exit(1);
    }
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    let program = args.first().cloned().unwrap_or_else(|| "scenario_runner".to_string());
    let usage = format!(
        "Usage: {0} <scenario.yaml | directory/> [--seed SEED_HEX] [--verbose]\n\nExamples:\n  {0} scenarios/baseline.yaml\n  {0} scenarios/\n  {0} scenarios/baseline.yaml --seed 0x123456...",
        program
    );

    let mut path = None;
    let mut seed = None;
    let mut verbose = false;

    let mut rest = args.into_iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--seed" => {
                let hex = rest.next().ok_or_else(|| usage.clone())?;
                seed = Some(parse_seed_hex(&hex)?);
            }
            "--verbose" | "-v" => verbose = true,
            _ if path.is_none() => path = Some(PathBuf::from(arg)),
            _ => return Err(usage),
        }
    }

    Ok(Args {
        path: path.ok_or(usage)?,
        seed,
        verbose,
    })
}

fn run_scenario_directory(dir: &Path, seed: Option<[u8; 32]>) -> bool {
    let mut scenarios = Vec::new();

    // Find all .yaml files
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str());
            if ext == Some("yaml") || ext == Some("yml") {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        return false;
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  SCENARIO RUNNER - Multiple Scenarios                  ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Found {} scenario(s) to run\n", scenarios.len());

    let mut all_ok = true;
    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        all_ok &= run_scenario_file(scenario_path, seed);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  All scenarios complete!                               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    all_ok
}

fn run_scenario_file(path: &Path, seed: Option<[u8; 32]>) -> bool {
    println!("Loading scenario from: {}", path.display());

    let scenario = match ScenarioFile::load(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            error!("{}: {}", path.display(), e);
            return false;
        }
    };

    // Print scenario header
    let name = scenario.meta.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scenario")
            .to_string()
    });
    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  {}{}║", name, " ".repeat(54_usize.saturating_sub(name.len())));
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    if let Some(ref hypothesis) = scenario.meta.hypothesis {
        println!("Hypothesis:");
        println!("  {}\n", hypothesis);
    }

    let params = &scenario.params;
    let output = &scenario.output;
    let master_seed = seed.unwrap_or_else(random_seed);

    println!("Configuration:");
    println!("  {}", params.summary());
    println!("  Attachment edges: {}", params.attachment_edges);
    println!("  Floor policy: {:?}", params.floor_policy);
    println!("  Master seed: {}", seed_hex(&master_seed));
    println!("\nStarting simulation...\n");

    let run = || run_replicates(params, master_seed, |r| build_sink(output, params, r), None);
    let outcomes = match output.threads {
        Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                error!("failed to build thread pool: {}", e);
                return false;
            }
        },
        None => run(),
    };

    let ok = report(&outcomes);
    println!("\n✓ Scenario complete!\n");
    ok
}

fn build_sink(
    output: &OutputConfig,
    params: &Params,
    replicate: usize,
) -> Result<MultiSink, SinkError> {
    let mut sink = MultiSink::new();
    if output.console {
        sink.add_sink(LoggingSink);
    }
    if let Some(dir) = &output.json_dir {
        sink.add_sink(JsonDocumentSink::in_dir(dir, replicate, params)?);
    }
    if let Some(dir) = &output.csv_dir {
        sink.add_sink(CsvSink::in_dir(dir, replicate)?);
    }
    Ok(sink)
}

fn report(outcomes: &[ReplicateOutcome]) -> bool {
    let mut failed = 0;
    for outcome in outcomes {
        match &outcome.result {
            Ok(summary) => summary.print_summary(),
            Err(e) => {
                failed += 1;
                println!("\n═══ Replicate {} ═══", outcome.replicate);
                println!("  Seed: {}", seed_hex(&outcome.seed));
                println!("  FAILED: {}", e);
            }
        }
    }
    println!(
        "\n{} of {} replicate(s) completed",
        outcomes.len() - failed,
        outcomes.len()
    );
    failed == 0
}

fn parse_seed_hex(hex: &str) -> Result<[u8; 32], String> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if hex.len() % 2 != 0 {
        return Err(format!("Invalid hex seed: odd number of digits ({})", hex.len()));
    }
    if hex.len() > 64 {
        return Err(format!("Invalid hex seed: {} digits, at most 64", hex.len()));
    }
    let mut seed = [0u8; 32];

    // shorter seeds are zero-padded on the right
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let byte_str = std::str::from_utf8(chunk).map_err(|e| format!("Invalid hex seed: {}", e))?;
        seed[i] = u8::from_str_radix(byte_str, 16).map_err(|e| format!("Invalid hex seed: {}", e))?;
    }

    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_seed_hex() {
        let seed = parse_seed_hex("0xab01").unwrap();
        assert_eq!(seed[0], 0xab);
        assert_eq!(seed[1], 0x01);
        assert!(seed[2..].iter().all(|&b| b == 0));
        assert!(parse_seed_hex("zz").is_err());
    }

    #[test]
    fn test_parse_seed_hex_rejects_bad_lengths() {
        assert!(parse_seed_hex("abc").is_err());
        assert!(parse_seed_hex("0xabc").is_err());
        assert!(parse_seed_hex(&"ab".repeat(33)).is_err());

        let full = parse_seed_hex(&format!("0x{}", "7f".repeat(32))).unwrap();
        assert_eq!(full, [0x7f; 32]);
        assert!(parse_args(args(&["runner", "s.yaml", "--seed", "123"])).is_err());
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(args(&["runner", "s.yaml", "--seed", "ff", "--verbose"])).unwrap();
        assert_eq!(parsed.path, PathBuf::from("s.yaml"));
        assert_eq!(parsed.seed.map(|s| s[0]), Some(0xff));
        assert!(parsed.verbose);

        assert!(parse_args(args(&["runner"])).is_err());
        assert!(parse_args(args(&["runner", "a.yaml", "b.yaml"])).is_err());
        assert!(parse_args(args(&["runner", "a.yaml", "--seed"])).is_err());
    }
}
