//! Independent replicate runs of the diffusion model and their per-step summary.
//!
//! Replicates run in parallel, each engine on its own thread with its own seed;
//! a single engine is never shared between threads.

use agent_diffusion::{Result, SimulationConfig, SimulationEngine};
use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Base seed used when the configuration does not carry one.
pub const DEFAULT_BASE_SEED: u64 = 0x5EED_0000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateResult {
    pub seed: u64,
    /// Steps actually taken.
    pub steps: usize,
    pub terminated: bool,
    /// Per-step values of every reporter, keyed by reporter name.
    pub series: BTreeMap<String, Vec<f64>>,
}

/// Runs one engine until termination or `max_steps`.
pub fn run_replicate(config: &SimulationConfig, seed: u64, max_steps: usize) -> Result<ReplicateResult> {
    let mut engine = SimulationEngine::new(SimulationConfig {
        rng_seed: Some(seed),
        ..config.clone()
    })?;
    let steps = engine.run(max_steps)?;
    let series = engine
        .metrics()
        .reporters()
        .iter()
        .map(|r| (r.name().to_string(), engine.metrics().series(*r)))
        .collect();
    Ok(ReplicateResult {
        seed,
        steps,
        terminated: engine.is_terminated(),
        series,
    })
}

/// Runs `replicates` engines in parallel with seeds `base, base + 1, ...`,
/// where `base` is the configured seed. Results come back in seed order.
pub fn run_replicates(
    config: &SimulationConfig,
    replicates: u64,
    max_steps: usize,
) -> Result<Vec<ReplicateResult>> {
    let base = config.rng_seed.unwrap_or(DEFAULT_BASE_SEED);
    info!(replicates, max_steps, base_seed = base, "starting replicate runs");
    (0..replicates)
        .into_par_iter()
        .progress_count(replicates)
        .map(|k| run_replicate(config, base.wrapping_add(k), max_steps))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub median: Vec<f64>,
    pub mean: Vec<f64>,
    pub stddev: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub replicates: usize,
    /// Step numbers the rows refer to, starting at 1.
    pub steps: Vec<usize>,
    pub metrics: BTreeMap<String, MetricSummary>,
    pub mean_steps: f64,
    pub terminated_fraction: f64,
}

/// Per-step statistics across replicates. A replicate that terminated early
/// contributes its final value to every later step.
pub fn summarize(results: &[ReplicateResult]) -> Summary {
    if results.is_empty() {
        return Summary::default();
    }
    let horizon = results.iter().map(|r| r.steps).max().unwrap_or(0);
    let names: Vec<&String> = results
        .iter()
        .flat_map(|r| r.series.keys())
        .unique()
        .sorted()
        .collect();

    let mut metrics = BTreeMap::new();
    for name in names {
        let mut summary = MetricSummary::default();
        for step in 0..horizon {
            let column: Vec<f64> = results
                .iter()
                .filter_map(|r| r.series.get(name))
                .filter_map(|values| values.get(step).or_else(|| values.last()).copied())
                .collect();
            summary
                .median
                .push(stats::median(column.iter().copied()).unwrap_or(f64::NAN));
            summary.mean.push(stats::mean(column.iter().copied()));
            summary.stddev.push(stats::stddev(column.iter().copied()));
        }
        metrics.insert(name.clone(), summary);
    }

    Summary {
        replicates: results.len(),
        steps: (1..=horizon).collect(),
        metrics,
        mean_steps: stats::mean(results.iter().map(|r| r.steps)),
        terminated_fraction: results.iter().filter(|r| r.terminated).count() as f64
            / results.len() as f64,
    }
}

/// One row per step: `step` then `<metric>_median,<metric>_mean,<metric>_stddev`
/// for each metric in name order.
pub fn write_summary_csv(summary: &Summary, filename: impl AsRef<Path>) -> Result<()> {
    let filename = filename.as_ref();
    info!(file = %filename.display(), rows = summary.steps.len(), "writing summary csv");
    let mut file = BufWriter::new(File::create(filename)?);
    writeln!(
        file,
        "step,{}",
        summary
            .metrics
            .keys()
            .map(|k| format!("{0}_median,{0}_mean,{0}_stddev", k))
            .join(",")
    )?;
    for (i, step) in summary.steps.iter().enumerate() {
        writeln!(
            file,
            "{},{}",
            step,
            summary
                .metrics
                .values()
                .map(|m| format!("{},{},{}", m.median[i], m.mean[i], m.stddev[i]))
                .join(",")
        )?;
    }
    file.flush()?;
    Ok(())
}

pub fn write_summary_json(summary: &Summary, filename: impl AsRef<Path>) -> Result<()> {
    let filename = filename.as_ref();
    info!(file = %filename.display(), "writing summary json");
    let file = BufWriter::new(File::create(filename)?);
    serde_json::to_writer_pretty(file, summary).map_err(std::io::Error::from)?;
    Ok(())
}
