/* Include our library */
use agent_diffusion::*;

/* include the time library, needed for throughput data */
use std::time::Instant;

fn main() {
    init_tracing();

    // Timer to measure runtime
    let now_with_initial = Instant::now();

    /* 10 infected and 90 susceptible people on a 30x30 grid, as in the classic setup.
    A fixed seed makes every run of this demo print the same numbers. */
    let config = SimulationConfig {
        rng_seed: Some(42),
        ..SimulationConfig::default()
    };
    let mut model = match SimulationEngine::new(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("could not build the simulation: {}", e);
            std::process::exit(1);
        }
    };
    println!("{}", model);

    /* RUN SIMULATION until everyone is infected, with timing and no IO */
    let now = Instant::now();
    if let Err(e) = model.run(5_000) {
        eprintln!("simulation failed: {}", e);
        std::process::exit(1);
    }
    let fintime = now.elapsed().as_secs_f64();
    let fintime_total = now_with_initial.elapsed().as_secs_f64();

    println!("{}", model);
    println!("FINAL: {:?}", model.agent_counts());
    println!("Terminated: {}", model.is_terminated());
    println!("Duration: {}s (with init: {}s)", fintime, fintime_total);
    println!(
        "Throughput: {} steps/s (with init: {} steps/s)",
        model.stepnumber as f64 / fintime,
        model.stepnumber as f64 / fintime_total
    );
    println!("Total steps: {}", model.stepnumber);

    // run with IO
    //model.run_and_write_csv(5_000, "output.csv");
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
