use agent_diffusion::SimulationConfig;
use diffusion_batch::*;
use std::fs::File;
use tracing::error;

fn main() {
    init_tracing();

    let num_reps: u64 = match std::env::args().nth(1) {
        Some(x) => match x.parse() {
            Ok(n) => n,
            Err(e) => {
                eprintln!("replicate count '{}' is not a number: {}", x, e);
                std::process::exit(2);
            }
        },
        _ => 1000,
    };
    let config = match std::env::args().nth(2) {
        Some(path) => match File::open(&path)
            .map_err(Into::into)
            .and_then(SimulationConfig::from_json)
        {
            Ok(c) => c,
            Err(e) => {
                eprintln!("could not read config {}: {}", path, e);
                std::process::exit(2);
            }
        },
        None => SimulationConfig::default(),
    };

    let results = match run_replicates(&config, num_reps, 10_000) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "replicate run failed");
            std::process::exit(1);
        }
    };
    let summary = summarize(&results);
    if let Err(e) = write_summary_csv(&summary, "reference.csv")
        .and_then(|_| write_summary_json(&summary, "reference.json"))
    {
        error!(error = %e, "could not write summary");
        std::process::exit(1);
    }

    println!("Average number of steps: {}", summary.mean_steps);
    println!(
        "Saturated runs: {:.1}%",
        summary.terminated_fraction * 100.0
    );
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
