use crate::{Agent, AgentId, MultiGrid, Neighborhood, Result, SimulationError};
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Everything an activation may read or mutate.
///
/// `agents` is indexed by agent id. Reads of other agents observe whatever was
/// last written in the current step; nothing is snapshotted.
pub struct InteractionContext<'a> {
    pub grid: &'a mut MultiGrid,
    pub agents: &'a mut [Agent],
    pub rng: &'a mut dyn RngCore,
}

impl<'a> InteractionContext<'a> {
    fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent> {
        self.agents
            .get_mut(id)
            .ok_or(SimulationError::UnknownAgent(id))
    }
}

/// Transition law applied to one agent per activation.
pub trait InteractionRule {
    fn activate(&self, agent: AgentId, ctx: &mut InteractionContext<'_>) -> Result<()>;
}

/// Random walk to an adjacent cell (or stay), then exposure to infected neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffusionRule {
    /// Cells considered for the move, the current cell always included.
    pub movement: Neighborhood,
    /// Cells searched for infected contacts, the agent's own cell excluded.
    pub contact: Neighborhood,
}

impl Default for DiffusionRule {
    fn default() -> Self {
        DiffusionRule {
            movement: Neighborhood::Moore,
            contact: Neighborhood::Moore,
        }
    }
}

impl DiffusionRule {
    pub fn with_neighborhood(kind: Neighborhood) -> DiffusionRule {
        DiffusionRule {
            movement: kind,
            contact: kind,
        }
    }

    /// Moves to a uniformly chosen cell of the neighborhood, current cell included.
    pub fn move_random_or_stay(&self, agent: AgentId, ctx: &mut InteractionContext<'_>) -> Result<()> {
        let pos = ctx
            .grid
            .position_of(agent)
            .ok_or(SimulationError::UnknownAgent(agent))?;
        let candidates = ctx.grid.neighborhood(pos, self.movement, true);
        let target = candidates.choose(&mut *ctx.rng).copied().unwrap_or(pos);
        ctx.grid.move_agent(agent, target)?;
        ctx.agent_mut(agent)?.position = target;
        Ok(())
    }

    /// Raises a susceptible agent's level if any neighbor is infected right now.
    pub fn interact(&self, agent: AgentId, ctx: &mut InteractionContext<'_>) -> Result<()> {
        let me = ctx.agent_mut(agent)?;
        if me.is_infected() {
            return Ok(());
        }
        let pos = me.position;
        let exposed = ctx
            .grid
            .neighbors(pos, self.contact, false)
            .into_iter()
            .any(|other| ctx.agents.get(other).map_or(false, Agent::is_infected));
        if exposed {
            ctx.agent_mut(agent)?.absorb_exposure();
        }
        Ok(())
    }
}

impl InteractionRule for DiffusionRule {
    fn activate(&self, agent: AgentId, ctx: &mut InteractionContext<'_>) -> Result<()> {
        self.move_random_or_stay(agent, ctx)?;
        self.interact(agent, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn population(spots: &[(usize, usize, bool)], rate: f64) -> (MultiGrid, Vec<Agent>) {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut grid = MultiGrid::new(5, 5, false).unwrap();
        let agents: Vec<Agent> = spots
            .iter()
            .enumerate()
            .map(|(id, (x, y, infected))| {
                grid.place_agent(id, (*x, *y)).unwrap();
                Agent::new(id, (*x, *y), *infected, &[rate], &mut rng)
            })
            .collect();
        (grid, agents)
    }

    #[test]
    fn moves_stay_within_moore_reach() {
        let (mut grid, mut agents) = population(&[(0, 0, false)], 0.1);
        let mut rng = SmallRng::seed_from_u64(5);
        let rule = DiffusionRule::default();
        for _ in 0..200 {
            let before = agents[0].position;
            let mut ctx = InteractionContext {
                grid: &mut grid,
                agents: &mut agents,
                rng: &mut rng,
            };
            rule.activate(0, &mut ctx).unwrap();
            let after = agents[0].position;
            assert!((before.0 as i64 - after.0 as i64).abs() <= 1);
            assert!((before.1 as i64 - after.1 as i64).abs() <= 1);
            assert_eq!(grid.position_of(0), Some(after));
        }
    }

    #[test]
    fn isolated_susceptible_is_unchanged() {
        let (mut grid, mut agents) = population(&[(0, 0, false), (4, 4, true)], 0.3);
        let mut rng = SmallRng::seed_from_u64(8);
        let mut ctx = InteractionContext {
            grid: &mut grid,
            agents: &mut agents,
            rng: &mut rng,
        };
        DiffusionRule::default().activate(0, &mut ctx).unwrap();
        assert_eq!(agents[0].infection_level(), 0.0);
    }

    #[test]
    fn exposure_from_surrounded_position() {
        // every cell reachable from the corner borders another infected cell
        let spots = [
            (0, 0, false),
            (0, 0, true),
            (1, 0, true),
            (0, 1, true),
            (1, 1, true),
        ];
        let (mut grid, mut agents) = population(&spots, 0.3);
        let mut rng = SmallRng::seed_from_u64(21);
        let mut ctx = InteractionContext {
            grid: &mut grid,
            agents: &mut agents,
            rng: &mut rng,
        };
        let rule = DiffusionRule::default();
        rule.activate(0, &mut ctx).unwrap();
        assert!((ctx.agents[0].infection_level() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn unknown_agent_is_reported() {
        let (mut grid, mut agents) = population(&[(1, 1, false)], 0.1);
        let mut rng = SmallRng::seed_from_u64(2);
        let mut ctx = InteractionContext {
            grid: &mut grid,
            agents: &mut agents,
            rng: &mut rng,
        };
        assert!(matches!(
            DiffusionRule::default().activate(3, &mut ctx),
            Err(SimulationError::UnknownAgent(3))
        ));
    }

    #[test]
    fn later_activations_see_infections_from_earlier_ones() {
        let spots = [(0, 0, true), (1, 0, false), (2, 0, false)];
        let rule = DiffusionRule::default();

        let (mut grid, mut agents) = population(&spots, 1.0);
        let mut rng = SmallRng::seed_from_u64(4);
        let mut ctx = InteractionContext {
            grid: &mut grid,
            agents: &mut agents,
            rng: &mut rng,
        };
        rule.interact(1, &mut ctx).unwrap();
        rule.interact(2, &mut ctx).unwrap();
        assert!(ctx.agents[1].is_infected());
        assert!(ctx.agents[2].is_infected());

        let (mut grid, mut agents) = population(&spots, 1.0);
        let mut ctx = InteractionContext {
            grid: &mut grid,
            agents: &mut agents,
            rng: &mut rng,
        };
        rule.interact(2, &mut ctx).unwrap();
        rule.interact(1, &mut ctx).unwrap();
        assert!(ctx.agents[1].is_infected());
        assert_eq!(ctx.agents[2].infection_level(), 0.0);
    }
}
