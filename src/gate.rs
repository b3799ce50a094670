use super::error::Error;

/// Single-slot gate of the register write-back port.
///
/// Holds the lane whose load response was refused because the write-back
/// port was occupied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WritebackGate {
    blocked: Option<usize>,
}

impl WritebackGate {
    #[must_use]
    pub fn blocked(&self) -> Option<usize> {
        self.blocked
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }

    /// Blocks `lane` until the gate is cleared.
    ///
    /// # Errors
    /// If another lane already holds the gate.
    pub fn block(&mut self, lane: usize) -> Result<(), Error> {
        if let Some(blocked) = self.blocked {
            return Err(Error::WritebackAlreadyBlocked { lane, blocked });
        }
        self.blocked = Some(lane);
        Ok(())
    }

    /// Unblocks the gate, returning the lane that was waiting on it.
    pub fn clear(&mut self) -> Option<usize> {
        self.blocked.take()
    }
}
