use serde::{Deserialize, Serialize};

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sim {
    /// Number of cycles this core was executing at least one block.
    pub active_cycles: u64,
    /// Number of cycles this core executed at least one instruction instance.
    pub not_stalled_cycles: u64,
    pub kernels_completed: u64,
}

impl std::ops::AddAssign for Sim {
    fn add_assign(&mut self, other: Self) {
        self.active_cycles += other.active_cycles;
        self.not_stalled_cycles += other.not_stalled_cycles;
        self.kernels_completed += other.kernels_completed;
    }
}
