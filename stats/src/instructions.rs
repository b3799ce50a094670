use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Instruction class as reported by the functional model.
#[derive(
    Debug,
    Copy,
    Clone,
    strum::EnumIter,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum InstructionKind {
    ALU = 1,
    MAD = 2,
    CTRL = 3,
    SFU = 4,
    MEM = 5,
    TEX = 6,
    NOP = 7,
}

impl InstructionKind {
    #[must_use]
    pub fn is_nop(self) -> bool {
        self == InstructionKind::NOP
    }
}

impl TryFrom<u32> for InstructionKind {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use strum::IntoEnumIterator;
        Self::iter().find(|kind| *kind as u32 == value).ok_or(value)
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionCounts {
    pub inner: BTreeMap<InstructionKind, u64>,
    /// Total instruction instances executed by all lanes of the core (excluding NOPs).
    pub inst_instances: u64,
}

impl std::ops::AddAssign for InstructionCounts {
    fn add_assign(&mut self, other: Self) {
        for (k, v) in other.inner {
            *self.inner.entry(k).or_insert(0) += v;
        }
        self.inst_instances += other.inst_instances;
    }
}

impl InstructionCounts {
    /// Count an instruction of the given kind.
    ///
    /// Returns whether the instruction counts as an instance (i.e. is not a NOP).
    pub fn inc(&mut self, kind: InstructionKind) -> bool {
        *self.inner.entry(kind).or_insert(0) += 1;
        if kind.is_nop() {
            return false;
        }
        self.inst_instances += 1;
        true
    }

    #[must_use]
    pub fn get(&self, kind: InstructionKind) -> u64 {
        self.inner.get(&kind).copied().unwrap_or(0)
    }
}

impl std::fmt::Debug for InstructionCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut out = f.debug_struct("InstructionCounts");
        for (kind, count) in self.inner.iter().filter(|(_, &count)| count > 0) {
            out.field(&format!("{kind:?}"), count);
        }
        out.field("inst_instances", &self.inst_instances).finish()
    }
}
