use super::instruction::WarpInstruction;

/// Functional model of the shader core.
///
/// The timing core only moves requests and responses; everything that
/// touches architectural state goes through this interface.
pub trait Shader {
    /// Opaque handle of an instruction fetch, returned on completion.
    type Fetch;

    fn accept_fetch_response(&mut self, fetch: Self::Fetch);

    /// Claims the register write-back port for a completed load.
    ///
    /// Returns `false` if the port is occupied.
    fn writeback_load(&mut self, instr: &WarpInstruction) -> bool;

    fn write_register(&mut self, instr: &WarpInstruction, warp_size: usize, lane: usize, data: &[u8]);

    fn finish_kernel(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterWrite {
    pub instr_uid: u64,
    pub warp_id: usize,
    pub lane: usize,
    pub data: Vec<u8>,
}

/// Functional model that records every interaction.
#[derive(Debug)]
pub struct Recorder<F> {
    pub fetched: Vec<F>,
    pub register_writes: Vec<RegisterWrite>,
    pub writeback_attempts: usize,
    pub kernels_finished: usize,
    /// Refuse write-backs while set.
    pub writeback_busy: bool,
}

impl<F> Default for Recorder<F> {
    fn default() -> Self {
        Self {
            fetched: Vec::new(),
            register_writes: Vec::new(),
            writeback_attempts: 0,
            kernels_finished: 0,
            writeback_busy: false,
        }
    }
}

impl<F> Shader for Recorder<F>
where
    F: std::fmt::Debug,
{
    type Fetch = F;

    fn accept_fetch_response(&mut self, fetch: F) {
        log::trace!("accept fetch response {fetch:?}");
        self.fetched.push(fetch);
    }

    fn writeback_load(&mut self, _instr: &WarpInstruction) -> bool {
        self.writeback_attempts += 1;
        !self.writeback_busy
    }

    fn write_register(&mut self, instr: &WarpInstruction, _warp_size: usize, lane: usize, data: &[u8]) {
        self.register_writes.push(RegisterWrite {
            instr_uid: instr.uid,
            warp_id: instr.warp_id,
            lane,
            data: data.to_vec(),
        });
    }

    fn finish_kernel(&mut self) {
        self.kernels_finished += 1;
    }
}
