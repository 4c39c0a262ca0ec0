use agent_diffusion::*;
use std::time::Instant;

fn main() {
    init_tracing();

    // same parameters as the interactive flocking viewer
    let config = FlockConfig {
        population: 100,
        width: 200.,
        height: 200.,
        speed: 3.,
        vision: 10.,
        separation: 2.,
        rng_seed: Some(7),
        ..FlockConfig::default()
    };
    let swarm_radius = 2.0;

    let mut model = match FlockModel::new(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("could not build the flock: {}", e);
            std::process::exit(1);
        }
    };

    let now = Instant::now();
    for frame in 0..10 {
        if let Err(e) = model.run(50) {
            eprintln!("flock step failed: {}", e);
            std::process::exit(1);
        }
        let labels = model.swarm_labels(swarm_radius);
        let sizes = cluster::cluster_sizes(&labels);
        let largest = sizes.set_iter().map(|(_, n)| n).max().unwrap_or(0);
        println!(
            "step {:4}: {:3} swarms, largest {:3} boids",
            (frame + 1) * 50,
            cluster::cluster_count(&labels),
            largest
        );
    }
    println!("Duration: {}s", now.elapsed().as_secs_f64());
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
