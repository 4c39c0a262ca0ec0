use agent_diffusion::SimulationConfig;
use diffusion_batch::*;

/* Mean number of steps until every agent is infected, for square grids of
growing side. Half the cells are occupied and one percent of the agents start
infected. */
fn main() {
    let num_reps = 20;
    let mut res: Vec<f64> = vec![];
    let mut xvals = vec![];
    for pow in 1..8 {
        let xmax = 2_usize.pow(pow);
        let population = (xmax * xmax / 2).max(1);
        let infected = (population / 100).max(1);
        let config = SimulationConfig {
            initial_infected: infected,
            initial_susceptible: population - infected,
            width: xmax,
            height: xmax,
            rng_seed: Some(pow as u64 * 1_000),
            ..SimulationConfig::default()
        };
        let results = match run_replicates(&config, num_reps, 100_000) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("{}x{} failed: {}", xmax, xmax, e);
                std::process::exit(1);
            }
        };
        let stepsum = summarize(&results).mean_steps;
        xvals.push(xmax);
        res.push(stepsum);
        println!("{:?} x {:?}", res, xvals);
        println!("{} {stepsum}", xmax);
    }
}
