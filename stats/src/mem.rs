use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(
    Debug,
    strum::EnumIter,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum MemorySpace {
    Local,
    Shared,
    /// Global to all threads in a kernel (read-only).
    ParamKernel,
    /// Local to a thread (read-writable).
    ParamLocal,
    Constant,
    Texture,
    Surface,
    Global,
    /// Generic spaces (global, shared, local).
    Generic,
}

/// Memory access statistics.
///
/// Records the number of loads and stores per memory space.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accesses {
    pub loads: BTreeMap<MemorySpace, u64>,
    pub stores: BTreeMap<MemorySpace, u64>,
}

impl std::ops::AddAssign for Accesses {
    fn add_assign(&mut self, other: Self) {
        for (space, count) in other.loads {
            *self.loads.entry(space).or_insert(0) += count;
        }
        for (space, count) in other.stores {
            *self.stores.entry(space).or_insert(0) += count;
        }
    }
}

impl Accesses {
    pub fn inc_load(&mut self, space: MemorySpace, count: u64) {
        *self.loads.entry(space).or_insert(0) += count;
    }

    pub fn inc_store(&mut self, space: MemorySpace, count: u64) {
        *self.stores.entry(space).or_insert(0) += count;
    }

    #[must_use]
    pub fn num_loads(&self, space: MemorySpace) -> u64 {
        self.loads.get(&space).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn num_stores(&self, space: MemorySpace) -> u64 {
        self.stores.get(&space).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_loads(&self) -> u64 {
        self.loads.values().sum()
    }

    #[must_use]
    pub fn total_stores(&self) -> u64 {
        self.stores.values().sum()
    }
}

impl std::fmt::Debug for Accesses {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let loads = self
            .loads
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(space, count)| (format!("{space:?}[LOAD]"), count));
        let stores = self
            .stores
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(space, count)| (format!("{space:?}[STORE]"), count));
        f.debug_map().entries(loads.chain(stores)).finish()
    }
}
