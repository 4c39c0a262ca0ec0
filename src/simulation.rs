use crate::{
    Agent, AgentId, Cell, DiffusionRule, InteractionContext, InteractionRule, MetricsCollector,
    MetricsRecord, MultiGrid, Neighborhood, RandomActivation, Reporter, Result, SimulationError,
    INFECTION_RATES,
};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Construction-time options of a diffusion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Agents starting at infection level 1.0.
    pub initial_infected: usize,
    /// Agents starting at level 0.0.
    pub initial_susceptible: usize,
    pub width: usize,
    pub height: usize,
    /// Adjacency used both for moving and for finding infected contacts.
    pub neighborhood: Neighborhood,
    pub torus: bool,
    /// Values a susceptible agent's rate is drawn from.
    pub infection_rates: Vec<f64>,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            initial_infected: 10,
            initial_susceptible: 90,
            width: 30,
            height: 30,
            neighborhood: Neighborhood::Moore,
            torus: false,
            infection_rates: INFECTION_RATES.to_vec(),
            rng_seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn population(&self) -> usize {
        self.initial_infected + self.initial_susceptible
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SimulationError::InvalidConfiguration(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        let capacity = self.width.checked_mul(self.height).ok_or_else(|| {
            SimulationError::InvalidConfiguration(format!(
                "grid of {}x{} cells is too large",
                self.width, self.height
            ))
        })?;
        let population = self
            .initial_infected
            .checked_add(self.initial_susceptible)
            .ok_or_else(|| {
                SimulationError::InvalidConfiguration("population count overflows".to_string())
            })?;
        if population > capacity {
            return Err(SimulationError::InvalidConfiguration(format!(
                "{} agents do not fit on a {}x{} grid",
                population,
                self.width,
                self.height
            )));
        }
        if self.infection_rates.is_empty() {
            return Err(SimulationError::InvalidConfiguration(
                "infection_rates must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .infection_rates
            .iter()
            .find(|r| !(r.is_finite() && **r > 0.0 && **r <= 1.0))
        {
            return Err(SimulationError::InvalidConfiguration(format!(
                "infection rate {} outside (0, 1]",
                bad
            )));
        }
        Ok(())
    }

    /// Reads a JSON config; missing fields take their defaults.
    pub fn from_json<R: Read>(reader: R) -> Result<SimulationConfig> {
        serde_json::from_reader(reader)
            .map_err(|e| SimulationError::InvalidConfiguration(e.to_string()))
    }

    /// Returns the configured RNG, seeded from entropy if no seed is set.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Constructed,
    Running,
    Terminated,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StepRunResult {
    NoStep,
    Step { stepnumber: usize },
}
impl StepRunResult {
    pub fn success(&self) -> bool {
        match self {
            StepRunResult::NoStep => false,
            StepRunResult::Step { .. } => true,
        }
    }
}

/// Read-only view of one agent after a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub position: Cell,
    pub infected: bool,
    pub infection_level: f64,
}

pub struct SimulationEngine<Rule: InteractionRule = DiffusionRule> {
    config: SimulationConfig,
    state: EngineState,
    agents: Vec<Agent>,
    grid: MultiGrid,
    scheduler: RandomActivation,
    rule: Rule,
    metrics: MetricsCollector,
    rng: SmallRng,
    pub stepnumber: usize,
}

impl<Rule: InteractionRule> std::fmt::Debug for SimulationEngine<Rule> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("stepnumber", &self.stepnumber)
            .field("agent_count", &self.agents.len())
            .finish()
    }
}

impl SimulationEngine<DiffusionRule> {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let rule = DiffusionRule::with_neighborhood(config.neighborhood);
        SimulationEngine::with_rule(config, rule)
    }
}

impl<Rule: InteractionRule> SimulationEngine<Rule> {
    /// Validates `config`, then places infected agents followed by susceptible
    /// ones on distinct random cells. Ids are dense and start at zero.
    pub fn with_rule(config: SimulationConfig, rule: Rule) -> Result<Self> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let mut grid = MultiGrid::new(config.width, config.height, config.torus)?;

        let mut all_positions: Vec<Cell> = (0..config.width)
            .flat_map(|x| (0..config.height).map(move |y| (x, y)))
            .collect();
        all_positions.shuffle(&mut rng);

        let mut agents = Vec::with_capacity(config.population());
        for (id, pos) in all_positions.into_iter().take(config.population()).enumerate() {
            let infected = id < config.initial_infected;
            let agent = Agent::new(id, pos, infected, &config.infection_rates, &mut rng);
            grid.place_agent(id, pos)?;
            agents.push(agent);
        }
        let scheduler = RandomActivation::new(0..agents.len());

        info!(
            infected = config.initial_infected,
            susceptible = config.initial_susceptible,
            width = config.width,
            height = config.height,
            torus = config.torus,
            seed = ?config.rng_seed,
            "constructed diffusion simulation"
        );

        Ok(SimulationEngine {
            config,
            state: EngineState::Constructed,
            agents,
            grid,
            scheduler,
            rule,
            metrics: MetricsCollector::default(),
            rng,
            stepnumber: 0,
        })
    }

    /// Replaces the reporters sampled after each step. Drops any collected history.
    pub fn with_reporters(mut self, reporters: impl IntoIterator<Item = Reporter>) -> Self {
        self.metrics = MetricsCollector::new(reporters);
        self
    }

    /// Activates every agent once, samples the metrics and checks whether
    /// everyone is infected. Does nothing once terminated.
    pub fn step(&mut self) -> Result<StepRunResult> {
        if self.state == EngineState::Terminated {
            return Ok(StepRunResult::NoStep);
        }
        self.state = EngineState::Running;

        let SimulationEngine {
            scheduler,
            rng,
            grid,
            agents,
            rule,
            ..
        } = self;
        scheduler.step(rng, |agent_id, rng| {
            let mut ctx = InteractionContext {
                grid: &mut *grid,
                agents: &mut agents[..],
                rng,
            };
            rule.activate(agent_id, &mut ctx)
        })?;
        self.stepnumber += 1;

        let record = self.metrics.collect(&self.agents)?;
        debug!(step = self.stepnumber, values = ?record.values, "step complete");

        if self.agents.iter().all(Agent::is_infected) {
            self.state = EngineState::Terminated;
            info!(step = self.stepnumber, "every agent infected, terminating");
        }
        Ok(StepRunResult::Step {
            stepnumber: self.stepnumber,
        })
    }

    /// Steps up to `n` times, stopping early on termination. Returns the steps taken.
    pub fn run(&mut self, n: usize) -> Result<usize> {
        let mut taken = 0;
        for _ in 0..n {
            if !self.step()?.success() {
                break;
            }
            taken += 1;
        }
        Ok(taken)
    }

    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        self.agents
            .iter()
            .map(|a| AgentSnapshot {
                id: a.id,
                position: a.position,
                infected: a.is_infected(),
                infection_level: a.infection_level(),
            })
            .collect()
    }

    pub fn metrics_history(&self) -> &[MetricsRecord] {
        self.metrics.records()
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn is_terminated(&self) -> bool {
        self.state == EngineState::Terminated
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn grid(&self) -> &MultiGrid {
        &self.grid
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn agent_counts(&self) -> HashMap<String, usize> {
        let mut res = HashMap::new();
        for ag in self.agents.iter() {
            let name = match ag.is_infected() {
                true => Reporter::Infected.name(),
                false => Reporter::Susceptible.name(),
            };
            *res.entry(name.to_string()).or_insert(0) += 1;
        }
        res
    }

    pub fn generate_json(&self) -> serde_json::Value {
        json!({
            "step": self.stepnumber,
            "state": self.state,
            "agents": self.snapshot(),
            "metrics": self.metrics.records(),
        })
    }

    /// Runs until termination or `max_steps`, then writes the metrics history.
    pub fn run_and_write_csv(&mut self, max_steps: usize, filename: impl AsRef<Path>) -> Result<usize> {
        let pb = ProgressBar::new(max_steps as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .progress_chars("#>-"),
        );
        let mut taken = 0;
        while taken < max_steps {
            if !self.step()?.success() {
                break;
            }
            taken += 1;
            pb.set_position(taken as u64);
        }
        pb.finish_with_message("simulation complete");
        self.metrics.write_csv(filename)?;
        Ok(taken)
    }
}

impl<Rule: InteractionRule> Display for SimulationEngine<Rule> {
    /// One character per cell: `I` if any occupant is infected, `S` if only
    /// susceptible agents are there, `.` if empty.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for y in 0..self.grid.height() {
            for x in 0..self.grid.width() {
                let occupants = self.grid.cell_occupants((x, y));
                let symbol = if occupants.is_empty() {
                    '.'
                } else if occupants.iter().any(|id| self.agents[*id].is_infected()) {
                    'I'
                } else {
                    'S'
                };
                write!(f, "{}", symbol)?
            }
            writeln!(f)?
        }
        Ok(())
    }
}
