use crate::{Agent, Result, SimulationError};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Named population reducers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reporter {
    /// Agents with `infection_level >= 1.0`.
    Infected,
    /// Everyone else.
    Susceptible,
    /// Mean infection level. Undefined for an empty population.
    AvgInfectedLevel,
}

impl Reporter {
    pub const ALL: [Reporter; 3] = [
        Reporter::Infected,
        Reporter::Susceptible,
        Reporter::AvgInfectedLevel,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Reporter::Infected => "Infected",
            Reporter::Susceptible => "Susceptible",
            Reporter::AvgInfectedLevel => "AvgInfectedLevel",
        }
    }

    pub fn evaluate(&self, population: &[Agent]) -> Result<f64> {
        match self {
            Reporter::Infected => Ok(population.iter().filter(|a| a.is_infected()).count() as f64),
            Reporter::Susceptible => {
                Ok(population.iter().filter(|a| !a.is_infected()).count() as f64)
            }
            Reporter::AvgInfectedLevel => {
                if population.is_empty() {
                    return Err(SimulationError::EmptyPopulation(self.name()));
                }
                let sum: f64 = population.iter().map(Agent::infection_level).sum();
                Ok(sum / population.len() as f64)
            }
        }
    }
}

impl Display for Reporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One sample of every configured reporter, taken after step `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub step: usize,
    pub values: BTreeMap<String, f64>,
}

impl MetricsRecord {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn value(&self, reporter: Reporter) -> Option<f64> {
        self.get(reporter.name())
    }
}

/// Append-only time series of reporter samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsCollector {
    reporters: Vec<Reporter>,
    records: Vec<MetricsRecord>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        MetricsCollector::new(Reporter::ALL)
    }
}

impl MetricsCollector {
    pub fn new(reporters: impl IntoIterator<Item = Reporter>) -> MetricsCollector {
        MetricsCollector {
            reporters: reporters.into_iter().unique().collect(),
            records: vec![],
        }
    }

    pub fn reporters(&self) -> &[Reporter] {
        &self.reporters
    }

    /// Evaluates every reporter and appends one record. If any reporter fails
    /// nothing is appended.
    pub fn collect(&mut self, population: &[Agent]) -> Result<&MetricsRecord> {
        let mut values = BTreeMap::new();
        for reporter in self.reporters.iter() {
            values.insert(reporter.name().to_string(), reporter.evaluate(population)?);
        }
        let step = self.records.len() + 1;
        self.records.push(MetricsRecord { step, values });
        Ok(&self.records[step - 1])
    }

    pub fn records(&self) -> &[MetricsRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&MetricsRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one reporter across all records.
    pub fn series(&self, reporter: Reporter) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| r.value(reporter))
            .collect()
    }

    /// Writes `step,<reporter names>` followed by one row per record.
    pub fn write_csv(&self, filename: impl AsRef<Path>) -> Result<()> {
        let filename = filename.as_ref();
        info!(file = %filename.display(), records = self.records.len(), "writing metrics csv");
        let mut file = BufWriter::new(File::create(filename)?);
        writeln!(file, "step,{}", self.reporters.iter().join(","))?;
        for record in self.records.iter() {
            writeln!(
                file,
                "{},{}",
                record.step,
                self.reporters
                    .iter()
                    .map(|r| match record.value(*r) {
                        None => String::new(),
                        Some(v) => format!("{}", v),
                    })
                    .join(",")
            )?;
        }
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn agents(levels: &[bool]) -> Vec<Agent> {
        let mut rng = SmallRng::seed_from_u64(0);
        levels
            .iter()
            .enumerate()
            .map(|(id, infected)| Agent::new(id, (0, 0), *infected, &[0.25], &mut rng))
            .collect()
    }

    #[test]
    fn collects_one_record_per_call() {
        let mut m = MetricsCollector::default();
        let population = agents(&[true, false, false, false]);
        let record = m.collect(&population).unwrap();
        assert_eq!(record.step, 1);
        assert_eq!(record.get("Infected"), Some(1.0));
        assert_eq!(record.get("Susceptible"), Some(3.0));
        assert_eq!(record.get("AvgInfectedLevel"), Some(0.25));
        m.collect(&population).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.series(Reporter::Infected), vec![1.0, 1.0]);
    }

    #[test]
    fn average_on_empty_population_fails_without_appending() {
        let mut m = MetricsCollector::default();
        assert!(matches!(
            m.collect(&[]),
            Err(SimulationError::EmptyPopulation("AvgInfectedLevel"))
        ));
        assert!(m.is_empty());

        let mut counts_only = MetricsCollector::new([Reporter::Infected, Reporter::Susceptible]);
        let record = counts_only.collect(&[]).unwrap();
        assert_eq!(record.get("Infected"), Some(0.0));
        assert_eq!(record.get("AvgInfectedLevel"), None);
    }

    #[test]
    fn duplicate_reporters_are_collapsed() {
        let m = MetricsCollector::new([Reporter::Infected, Reporter::Infected, Reporter::Susceptible]);
        assert_eq!(m.reporters(), &[Reporter::Infected, Reporter::Susceptible]);
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut m = MetricsCollector::default();
        let population = agents(&[true, false]);
        m.collect(&population).unwrap();
        m.collect(&population).unwrap();
        let path = std::env::temp_dir().join(format!("metrics_{}.csv", std::process::id()));
        m.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "step,Infected,Susceptible,AvgInfectedLevel");
        assert_eq!(lines[1], "1,1,1,0.5");
        assert_eq!(lines.len(), 3);
    }
}
