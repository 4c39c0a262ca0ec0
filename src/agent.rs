use crate::{AgentId, Cell};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Per-agent infection rates a susceptible agent may be assigned.
pub const INFECTION_RATES: [f64; 5] = [0.1, 0.2, 0.3, 0.4, 0.5];

/// Level at (and above) which an agent counts as infected.
pub const INFECTED_THRESHOLD: f64 = 1.0;

/// A person on the grid. `infection_level` only ever grows and never exceeds 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub position: Cell,
    infection_level: f64,
    rate: f64,
}

impl Agent {
    /// Draws the agent's rate from `rates`. Infected agents keep the draw but never use it.
    pub fn new<R: Rng + ?Sized>(
        id: AgentId,
        position: Cell,
        infected: bool,
        rates: &[f64],
        rng: &mut R,
    ) -> Agent {
        let rate = rates.choose(rng).copied().unwrap_or(0.0);
        Agent {
            id,
            position,
            infection_level: if infected { INFECTED_THRESHOLD } else { 0.0 },
            rate,
        }
    }

    pub fn infection_level(&self) -> f64 {
        self.infection_level
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_infected(&self) -> bool {
        self.infection_level >= INFECTED_THRESHOLD
    }

    /// Adds this agent's rate and clamps the result to 1.0.
    pub fn absorb_exposure(&mut self) {
        self.infection_level += self.rate;
        if self.infection_level > INFECTED_THRESHOLD {
            self.infection_level = INFECTED_THRESHOLD;
        }
    }
}
