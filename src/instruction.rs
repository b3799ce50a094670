use crate::{address, error::Error};
use bitvec::{array::BitArray, BitArr};
use itertools::Itertools;
use smallvec::SmallVec;

/// Maximum number of lanes a warp instruction can carry.
pub const MAX_WARP_SIZE: usize = 64;

/// Maximum number of bytes a single lane may transfer.
pub const MAX_LANE_ACCESS_SIZE: u32 = 16;

/// Lane active mask.
///
/// Bitmask where a 1 at position i means that lane i is active for the instruction.
pub type ActiveMask = BitArr!(for MAX_WARP_SIZE, in u64);

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, strum::EnumIter)]
pub enum MemorySpace {
    Undefined,
    Register,
    Local,
    Shared,
    ParamUnclassified,
    /// Global to all threads in a kernel (read-only).
    ParamKernel,
    /// Local to a thread (read-writable).
    ParamLocal,
    Constant,
    Texture,
    Surface,
    Global,
    Generic,
    Instruction,
}

impl MemorySpace {
    /// Statistics bucket for a load from this space.
    #[must_use]
    pub fn load_space(self) -> Option<stats::mem::MemorySpace> {
        use stats::mem::MemorySpace as Stats;
        match self {
            Self::Local => Some(Stats::Local),
            Self::Shared => Some(Stats::Shared),
            Self::ParamKernel => Some(Stats::ParamKernel),
            Self::ParamLocal => Some(Stats::ParamLocal),
            Self::Constant => Some(Stats::Constant),
            Self::Texture => Some(Stats::Texture),
            Self::Surface => Some(Stats::Surface),
            Self::Global => Some(Stats::Global),
            Self::Generic => Some(Stats::Generic),
            Self::ParamUnclassified | Self::Undefined | Self::Register | Self::Instruction => None,
        }
    }

    /// Statistics bucket for a store to this space.
    #[must_use]
    pub fn store_space(self) -> Option<stats::mem::MemorySpace> {
        use stats::mem::MemorySpace as Stats;
        match self {
            Self::Local => Some(Stats::Local),
            Self::Shared => Some(Stats::Shared),
            Self::ParamLocal => Some(Stats::ParamLocal),
            Self::Global => Some(Stats::Global),
            Self::Generic => Some(Stats::Generic),
            Self::ParamKernel
            | Self::Constant
            | Self::Texture
            | Self::Surface
            | Self::ParamUnclassified
            | Self::Undefined
            | Self::Register
            | Self::Instruction => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemOp {
    Load,
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lane {
    pub addr: address,
    /// Store payload.
    pub data: SmallVec<[u8; MAX_LANE_ACCESS_SIZE as usize]>,
}

/// A warp instruction as handed over by the functional model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarpInstruction {
    pub uid: u64,
    pub warp_id: usize,
    pub pc: address,
    pub space: MemorySpace,
    pub memory_op: Option<MemOp>,
    /// Bytes per element (`1..=8`).
    pub data_size: u32,
    pub vector_length: u32,
    pub active_mask: ActiveMask,
    lanes: Vec<Option<Lane>>,
}

impl std::fmt::Display for WarpInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}[pc={:#x}, warp={}, uid={}, lanes=[{}]]",
            self.memory_op,
            self.pc,
            self.warp_id,
            self.uid,
            self.active_mask.iter_ones().join(",")
        )
    }
}

impl WarpInstruction {
    #[must_use]
    pub fn new(
        uid: u64,
        warp_id: usize,
        pc: address,
        space: MemorySpace,
        memory_op: Option<MemOp>,
        data_size: u32,
    ) -> Self {
        Self {
            uid,
            warp_id,
            pc,
            space,
            memory_op,
            data_size,
            vector_length: 1,
            active_mask: BitArray::ZERO,
            lanes: Vec::new(),
        }
    }

    #[must_use]
    pub fn load(uid: u64, warp_id: usize, pc: address, space: MemorySpace, data_size: u32) -> Self {
        Self::new(uid, warp_id, pc, space, Some(MemOp::Load), data_size)
    }

    #[must_use]
    pub fn store(uid: u64, warp_id: usize, pc: address, space: MemorySpace, data_size: u32) -> Self {
        Self::new(uid, warp_id, pc, space, Some(MemOp::Store), data_size)
    }

    #[must_use]
    pub fn with_vector_length(mut self, vector_length: u32) -> Self {
        self.vector_length = vector_length;
        self
    }

    /// Activates `lane` with its effective address and store payload.
    #[must_use]
    pub fn with_lane(mut self, lane: usize, addr: address, data: &[u8]) -> Self {
        assert!(lane < MAX_WARP_SIZE, "lane {lane} out of range");
        if self.lanes.len() <= lane {
            self.lanes.resize(lane + 1, None);
        }
        self.lanes[lane] = Some(Lane {
            addr,
            data: SmallVec::from_slice(data),
        });
        self.active_mask.set(lane, true);
        self
    }

    #[must_use]
    pub fn is_load(&self) -> bool {
        self.memory_op == Some(MemOp::Load)
    }

    #[must_use]
    pub fn is_store(&self) -> bool {
        self.memory_op == Some(MemOp::Store)
    }

    #[must_use]
    pub fn is_active(&self, lane: usize) -> bool {
        self.active_mask.get(lane).is_some_and(|bit| *bit)
    }

    /// Active lanes below `warp_size` in increasing order.
    pub fn active_lanes(&self, warp_size: usize) -> impl Iterator<Item = usize> + '_ {
        self.active_mask
            .iter_ones()
            .take_while(move |lane| *lane < warp_size)
    }

    #[must_use]
    pub fn num_active_lanes(&self) -> usize {
        self.active_mask.count_ones()
    }

    #[must_use]
    pub fn addr(&self, lane: usize) -> Option<address> {
        if !self.is_active(lane) {
            return None;
        }
        self.lanes.get(lane)?.as_ref().map(|l| l.addr)
    }

    /// Store payload of `lane`, if the lane carries one.
    #[must_use]
    pub fn data(&self, lane: usize) -> Option<&[u8]> {
        self.lanes.get(lane)?.as_ref().map(|l| l.data.as_slice())
    }

    /// First active lane at or above `warp_size`.
    #[must_use]
    pub fn lane_out_of_range(&self, warp_size: usize) -> Option<usize> {
        self.active_mask.iter_ones().find(|lane| *lane >= warp_size)
    }

    /// Number of bytes each lane transfers.
    ///
    /// # Errors
    /// If the element size is not within `1..=8` bytes or the
    /// vector-scaled size exceeds 16 bytes.
    pub fn access_size(&self) -> Result<u32, Error> {
        let invalid = || Error::InvalidAccessSize {
            size: self.data_size.saturating_mul(self.vector_length),
            data_size: self.data_size,
            vector_length: self.vector_length,
        };
        if !(1..=8).contains(&self.data_size) {
            return Err(invalid());
        }
        let size = self
            .data_size
            .checked_mul(self.vector_length)
            .ok_or_else(invalid)?;
        if size == 0 || size > MAX_LANE_ACCESS_SIZE {
            return Err(invalid());
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::{MemorySpace, WarpInstruction};
    use crate::error::Error;

    #[test]
    fn test_active_lanes() {
        let instr = WarpInstruction::load(0, 1, 0x100, MemorySpace::Global, 4)
            .with_lane(5, 0x2000, &[])
            .with_lane(0, 0x1000, &[])
            .with_lane(2, 0x1800, &[]);
        assert_eq!(instr.active_lanes(32).collect::<Vec<_>>(), vec![0, 2, 5]);
        assert_eq!(instr.active_lanes(4).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(instr.num_active_lanes(), 3);
        assert_eq!(instr.addr(2), Some(0x1800));
        assert_eq!(instr.addr(1), None);
        assert_eq!(instr.addr(40), None);
        assert_eq!(instr.lane_out_of_range(4), Some(5));
        assert_eq!(instr.lane_out_of_range(32), None);

        // an active bit without a lane record has no address
        let mut sparse = instr.clone();
        sparse.active_mask.set(1, true);
        assert_eq!(sparse.addr(1), None);
        assert_eq!(sparse.data(1), None);
        assert_eq!(sparse.data(2), Some(&[][..]));
        assert_eq!(instr.to_string(), "Some(Load)[pc=0x100, warp=1, uid=0, lanes=[0,2,5]]");
    }

    #[test]
    fn test_access_size() {
        let instr = WarpInstruction::store(0, 0, 0, MemorySpace::Global, 4);
        assert_eq!(instr.access_size(), Ok(4));
        assert_eq!(instr.clone().with_vector_length(4).access_size(), Ok(16));
        assert_eq!(
            instr.with_vector_length(8).access_size(),
            Err(Error::InvalidAccessSize {
                size: 32,
                data_size: 4,
                vector_length: 8
            })
        );
        let instr = WarpInstruction::store(0, 0, 0, MemorySpace::Global, 16);
        assert!(instr.access_size().is_err());
        let instr = WarpInstruction::store(0, 0, 0, MemorySpace::Global, 0);
        assert!(instr.access_size().is_err());
    }

    #[test]
    fn test_stats_spaces() {
        use stats::mem::MemorySpace as Stats;
        assert_eq!(MemorySpace::Constant.load_space(), Some(Stats::Constant));
        assert_eq!(MemorySpace::Constant.store_space(), None);
        assert_eq!(MemorySpace::ParamLocal.store_space(), Some(Stats::ParamLocal));
        assert_eq!(MemorySpace::Register.load_space(), None);
        assert_eq!(MemorySpace::Instruction.store_space(), None);
    }

    #[test]
    fn test_store_spaces_are_loadable() {
        use strum::IntoEnumIterator;
        for space in MemorySpace::iter() {
            if let Some(stats_space) = space.store_space() {
                assert_eq!(space.load_space(), Some(stats_space), "{space:?}");
            }
        }
        assert_eq!(MemorySpace::iter().filter_map(MemorySpace::load_space).count(), 9);
    }
}
