mod agent;
pub mod cluster;
mod error;
mod flocking;
mod metrics;
mod rule;
mod scheduler;
mod simulation;
mod space;


pub use agent::*;
pub use error::*;
pub use flocking::*;
pub use metrics::*;
pub use rule::*;
pub use scheduler::*;
pub use serde::{Deserialize, Serialize};
pub use simulation::*;
pub use space::*;

/// Identifier of an agent. Assigned once at construction, never reused.
pub type AgentId = usize;

/// Sorted-vector set operations used for cell occupancy lists.
pub trait SetInsertable {
    fn binary_insert(&mut self, val: usize) -> bool;
    fn binary_remove(&mut self, val: usize) -> bool;
}
impl SetInsertable for Vec<usize> {
    /// Returns `true` if the value was already present.
    fn binary_insert(&mut self, val: usize) -> bool {
        match self.binary_search(&val) {
            Ok(_) => true,
            Err(pos) => {
                self.insert(pos, val);
                false
            }
        }
    }

    /// Returns `true` if the value was present and has been removed.
    fn binary_remove(&mut self, val: usize) -> bool {
        match self.binary_search(&val) {
            Ok(pos) => {
                self.remove(pos);
                true
            }
            Err(_) => false,
        }
    }
}
