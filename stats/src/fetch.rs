use serde::{Deserialize, Serialize};

/// Instruction fetch statistics.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fetch {
    /// Number of instruction cache requests accepted by the instruction port.
    pub inst_cache_requests: u64,
    /// Number of retry signals received from the instruction port.
    pub inst_cache_retries: u64,
}

impl std::ops::AddAssign for Fetch {
    fn add_assign(&mut self, other: Self) {
        self.inst_cache_requests += other.inst_cache_requests;
        self.inst_cache_retries += other.inst_cache_retries;
    }
}
