use crate::AgentId;
use rand::seq::SliceRandom;
use rand::Rng;

/// Activates every registered agent once per step in a freshly shuffled order.
#[derive(Debug, Clone, Default)]
pub struct RandomActivation {
    agent_ids: Vec<AgentId>,
    steps: usize,
}

impl RandomActivation {
    pub fn new(agent_ids: impl IntoIterator<Item = AgentId>) -> RandomActivation {
        let mut agent_ids: Vec<AgentId> = agent_ids.into_iter().collect();
        agent_ids.sort_unstable();
        agent_ids.dedup();
        RandomActivation {
            agent_ids,
            steps: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.agent_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agent_ids.is_empty()
    }

    /// Completed calls to [`RandomActivation::step`].
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn agent_ids(&self) -> &[AgentId] {
        &self.agent_ids
    }

    /// A uniformly random permutation of the registered ids.
    ///
    /// The shuffle always starts from the sorted id list, so the result depends
    /// only on the generator state.
    pub fn activation_order<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<AgentId> {
        let mut order = self.agent_ids.clone();
        order.shuffle(rng);
        order
    }

    /// Draws one order and calls `callback` for each id in it. The generator is
    /// handed back to the callback so activations can keep drawing from it.
    /// Stops at the first error.
    pub fn step<R, E, F>(&mut self, rng: &mut R, mut callback: F) -> Result<(), E>
    where
        R: Rng + ?Sized,
        F: FnMut(AgentId, &mut R) -> Result<(), E>,
    {
        let order = self.activation_order(rng);
        for agent_id in order {
            callback(agent_id, &mut *rng)?;
        }
        self.steps += 1;
        Ok(())
    }
}
