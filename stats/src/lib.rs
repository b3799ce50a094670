#![allow(clippy::upper_case_acronyms)]

pub mod fetch;
pub mod instructions;
pub mod mem;
pub mod sim;

pub use fetch::Fetch;
pub use instructions::InstructionCounts;
pub use mem::Accesses;
pub use sim::Sim;

use serde::{Deserialize, Serialize};

/// Statistics of a single core.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core {
    pub accesses: Accesses,
    pub instructions: InstructionCounts,
    pub fetch: Fetch,
    pub sim: Sim,
}

impl Core {
    /// Instruction instances per active cycle.
    #[must_use]
    pub fn instructions_per_cycle(&self) -> f64 {
        if self.sim.active_cycles == 0 {
            return 0.0;
        }
        self.instructions.inst_instances as f64 / self.sim.active_cycles as f64
    }
}

impl std::ops::AddAssign for Core {
    fn add_assign(&mut self, other: Self) {
        self.accesses += other.accesses;
        self.instructions += other.instructions;
        self.fetch += other.fetch;
        self.sim += other.sim;
    }
}
