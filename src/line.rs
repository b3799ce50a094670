use super::address;

/// Maps byte addresses to the address of their containing cache line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LineMask {
    block_size_bits: u32,
    mask: u64,
}

impl LineMask {
    #[must_use]
    pub fn new(block_size_bits: u32) -> Self {
        debug_assert!(block_size_bits < u64::BITS);
        Self {
            block_size_bits,
            mask: u64::MAX << block_size_bits,
        }
    }

    #[must_use]
    pub fn block_size_bits(&self) -> u32 {
        self.block_size_bits
    }

    #[must_use]
    pub fn block_size(&self) -> u64 {
        1 << self.block_size_bits
    }

    /// Line address of `addr` (block offset bits cleared).
    #[must_use]
    #[inline]
    pub fn line_of(&self, addr: address) -> address {
        addr & self.mask
    }
}
