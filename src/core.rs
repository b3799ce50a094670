use super::{
    address,
    blocks::ActiveBlockSet,
    config,
    error::Error,
    fetch,
    gate::WritebackGate,
    instruction::{MemOp, MemorySpace, WarpInstruction},
    line::LineMask,
    packet::{Command, Packet, Request, SenderState},
    port::MasterPort,
    shader::Shader,
    translation::{Mode, TranslationState, Translator},
};
use console::style;
use stats::instructions::InstructionKind;
use std::collections::VecDeque;
use std::sync::Arc;

/// Size of the buffer a load response is copied into before register write-back.
pub const MAX_LOAD_RESPONSE_SIZE: usize = 16;

/// Flow control state of the instruction port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchState {
    /// No fetch is waiting for the instruction port.
    Ready,
    /// At least one fetch waits for the instruction port to signal a retry.
    Stalled,
}

/// Outcome of delivering a lane load response.
#[derive(Debug)]
pub enum RecvStatus {
    Consumed,
    /// The write-back port is occupied.
    ///
    /// The response is handed back and must be re-delivered once the
    /// lane port is asked to retry.
    Blocked(Packet),
}

/// Timing model of a single CUDA core.
pub struct Core<S, T, P>
where
    S: Shader,
{
    pub config: Arc<config::Core>,
    name: String,
    line: LineMask,

    pub shader: S,
    pub itb: T,
    pub inst_port: P,
    pub lsq_ports: Vec<P>,
    pub lsq_control_port: P,

    busy_inst_lines: fetch::Tracker<S::Fetch>,
    retry_inst_packets: VecDeque<Packet>,
    fetch_state: FetchState,
    writeback: WritebackGate,
    signal_kernel_finish: bool,
    blocks: ActiveBlockSet,
    last_active_cycle: Option<u64>,
    next_request_uid: u64,

    stats: stats::Core,
}

#[allow(clippy::missing_fields_in_debug)]
impl<S, T, P> std::fmt::Debug for Core<S, T, P>
where
    S: Shader,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("name", &self.name)
            .field("fetch_state", &self.fetch_state)
            .field("outstanding_fetches", &self.busy_inst_lines.len())
            .field("retry_inst_packets", &self.retry_inst_packets.len())
            .field("writeback_blocked", &self.writeback.blocked())
            .finish()
    }
}

impl<S, T, P> Core<S, T, P>
where
    S: Shader,
    T: Translator,
    P: MasterPort,
{
    /// Creates a core wired to its ports.
    ///
    /// # Errors
    /// If the configuration is invalid or the number of lane ports
    /// differs from the warp size.
    pub fn new(
        config: Arc<config::Core>,
        shader: S,
        itb: T,
        inst_port: P,
        lsq_ports: Vec<P>,
        lsq_control_port: P,
    ) -> Result<Self, Error> {
        config.validate()?;
        let name = config.name();
        if lsq_ports.len() != config.warp_size {
            return Err(Error::LanePortMismatch {
                core: name,
                num_ports: lsq_ports.len(),
                warp_size: config.warp_size,
            });
        }
        let line = config.line_mask();
        Ok(Self {
            config,
            name,
            line,
            shader,
            itb,
            inst_port,
            lsq_ports,
            lsq_control_port,
            busy_inst_lines: fetch::Tracker::new(line),
            retry_inst_packets: VecDeque::new(),
            fetch_state: FetchState::Ready,
            writeback: WritebackGate::default(),
            signal_kernel_finish: false,
            blocks: ActiveBlockSet::default(),
            last_active_cycle: None,
            next_request_uid: 0,
            stats: stats::Core::default(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.config.core_id
    }

    #[must_use]
    pub fn stats(&self) -> stats::Core {
        self.stats.clone()
    }

    #[must_use]
    pub fn fetch_state(&self) -> FetchState {
        self.fetch_state
    }

    #[must_use]
    pub fn num_outstanding_fetches(&self) -> usize {
        self.busy_inst_lines.len()
    }

    #[must_use]
    pub fn num_retry_packets(&self) -> usize {
        self.retry_inst_packets.len()
    }

    /// Fetches waiting for the instruction port, oldest first.
    pub fn retry_inst_packets(&self) -> impl Iterator<Item = &Packet> + '_ {
        self.retry_inst_packets.iter()
    }

    #[must_use]
    pub fn writeback_blocked(&self) -> Option<usize> {
        self.writeback.blocked()
    }

    #[must_use]
    pub fn kernel_finish_pending(&self) -> bool {
        self.signal_kernel_finish
    }

    #[must_use]
    pub fn num_active_blocks(&self) -> usize {
        self.blocks.num_active()
    }

    /// Looks up a port by name (`inst_port`, `lsq_port`, `lsq_ctrl_port`).
    ///
    /// # Errors
    /// If the name is unknown or the lane index is out of range.
    pub fn port(&self, name: &str, idx: Option<usize>) -> Result<&P, Error> {
        let unknown = || Error::UnknownPort {
            core: self.name.clone(),
            name: name.to_string(),
            idx,
        };
        match name {
            "inst_port" => Ok(&self.inst_port),
            "lsq_ctrl_port" => Ok(&self.lsq_control_port),
            "lsq_port" => idx
                .and_then(|idx| self.lsq_ports.get(idx))
                .ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }

    /// Restoring from a checkpoint is a no-op.
    ///
    /// Cores carry no state across kernels, which allows restoring into
    /// any number of cores. Checkpoints cannot be taken during a kernel.
    pub fn unserialize(&mut self) {}

    fn next_uid(&mut self) -> u64 {
        let uid = self.next_request_uid;
        self.next_request_uid += 1;
        uid
    }

    /// Checks whether a fetch for the cache line of `addr` may be issued.
    #[must_use]
    pub fn inst_cache_resource_available(&self, addr: address) -> bool {
        self.busy_inst_lines.is_line_free(addr)
    }

    /// Starts an instruction fetch for the line of `addr`.
    ///
    /// The fetch is translated first and sent once the translation completes.
    ///
    /// # Errors
    /// If a fetch for the same line is outstanding.
    #[tracing::instrument(skip_all)]
    pub fn icache_fetch(
        &mut self,
        addr: address,
        size: u32,
        pc: address,
        fetch: S::Fetch,
    ) -> Result<(), Error> {
        let line_addr = self.line.line_of(addr);
        log::debug!(
            "{}: fetch request, addr: {addr:#x}, size: {size}, line: {line_addr:#x}",
            self.name
        );

        self.busy_inst_lines.begin(addr, fetch)?;

        let uid = self.next_uid();
        let req = Request::inst_fetch(uid, self.id(), line_addr, size, pc);
        self.itb
            .begin_translate_timing(TranslationState::new(req, Mode::Read));
        Ok(())
    }

    /// Completes the translation of an instruction fetch and sends it.
    ///
    /// # Errors
    /// If the translation faulted.
    pub fn finish_translation(&mut self, state: TranslationState) -> Result<(), Error> {
        let TranslationState { req, mode, fault } = state;
        if let Some(fault) = fault {
            return Err(Error::TranslationFault {
                core: self.name.clone(),
                addr: req.vaddr,
                fault,
            });
        }
        if mode != Mode::Read {
            return Err(Error::UnexpectedTranslationMode {
                addr: req.vaddr,
                mode,
            });
        }
        debug_assert!(req.inst_fetch);
        self.send_inst_access(Packet::new(req, Command::ReadReq));
        Ok(())
    }

    fn send_inst_access(&mut self, packet: Packet) {
        if self.fetch_state == FetchState::Stalled {
            // keep program order behind the fetches already waiting
            log::debug!(
                "{}: queue inst read of vaddr {:#x} behind {} waiting",
                self.name,
                packet.req.vaddr,
                self.retry_inst_packets.len()
            );
            self.retry_inst_packets.push_back(packet);
            return;
        }

        log::debug!(
            "{}: sending inst read of {} bytes to vaddr: {:#x}",
            self.name,
            packet.size(),
            packet.req.vaddr
        );

        match self.inst_port.send_timing_req(packet) {
            Ok(()) => self.stats.fetch.inst_cache_requests += 1,
            Err(packet) => {
                self.fetch_state = FetchState::Stalled;
                let vaddr = packet.req.vaddr;
                self.retry_inst_packets.push_back(packet);
                log::debug!(
                    "{}: send failed vaddr: {vaddr:#x}. waiting: {}",
                    self.name,
                    self.retry_inst_packets.len()
                );
            }
        }
    }

    /// Handles a retry signal from the instruction port.
    ///
    /// Replays the oldest waiting fetch, then drains the remaining fetches
    /// in order until the port rejects one again.
    ///
    /// # Errors
    /// If no fetch was waiting or the port rejects the replay.
    pub fn handle_retry(&mut self) -> Result<(), Error> {
        if self.fetch_state != FetchState::Stalled {
            return Err(Error::SpuriousRetry {
                core: self.name.clone(),
            });
        }
        let Some(packet) = self.retry_inst_packets.pop_front() else {
            return Err(Error::SpuriousRetry {
                core: self.name.clone(),
            });
        };
        self.stats.fetch.inst_cache_retries += 1;

        log::debug!(
            "{}: {}, vaddr: {:#x}",
            self.name,
            style("received retry").bold(),
            packet.req.vaddr
        );

        if let Err(packet) = self.inst_port.send_timing_req(packet) {
            return Err(Error::RetryRejected {
                core: self.name.clone(),
                addr: packet.req.vaddr,
            });
        }
        self.stats.fetch.inst_cache_requests += 1;

        // a rejection re-arms the retry of the port
        while let Some(next) = self.retry_inst_packets.pop_front() {
            if let Err(next) = self.inst_port.send_timing_req(next) {
                self.retry_inst_packets.push_front(next);
                break;
            }
            self.stats.fetch.inst_cache_requests += 1;
        }

        self.fetch_state = if self.retry_inst_packets.is_empty() {
            FetchState::Ready
        } else {
            FetchState::Stalled
        };
        Ok(())
    }

    /// Handles an instruction fetch response.
    ///
    /// # Errors
    /// If the response is not an instruction fetch or no fetch is outstanding
    /// for its line.
    pub fn recv_inst_resp(&mut self, packet: Packet) -> Result<(), Error> {
        if !packet.req.inst_fetch || !packet.cmd.is_read() {
            return Err(Error::UnexpectedResponse {
                core: self.name.clone(),
                port: "inst_port".to_string(),
                cmd: packet.cmd,
                addr: packet.req.vaddr,
            });
        }
        let fetch = self.busy_inst_lines.complete(packet.req.vaddr)?;
        log::debug!(
            "{}: finished fetch on vaddr {:#x}",
            self.name,
            packet.req.vaddr
        );
        self.shader.accept_fetch_response(fetch);
        Ok(())
    }

    /// Sends one request per active lane of a global or constant memory instruction.
    ///
    /// All active lane ports are probed before any lane is sent, so a stall
    /// never leaves part of the instruction in flight.
    ///
    /// Returns `true` if the pipeline must stall and re-attempt the whole
    /// instruction later.
    ///
    /// # Errors
    /// If the instruction is not a global/constant load or store or is
    /// malformed (invalid access size, active lanes outside the warp or
    /// without an address, store payloads not matching the access size).
    /// Also if a lane port rejects after an earlier lane was already sent.
    #[tracing::instrument(skip_all)]
    pub fn execute_mem_op(&mut self, instr: &WarpInstruction) -> Result<bool, Error> {
        let unsupported = || Error::UnsupportedInstruction {
            core: self.name.clone(),
            pc: instr.pc,
            space: instr.space,
        };
        if !matches!(instr.space, MemorySpace::Global | MemorySpace::Constant) {
            return Err(unsupported());
        }
        let Some(op) = instr.memory_op else {
            return Err(unsupported());
        };
        let size = instr.access_size()?;
        let warp_size = self.config.warp_size;

        if let Some(lane) = instr.lane_out_of_range(warp_size) {
            return Err(Error::LaneOutOfRange {
                core: self.name.clone(),
                lane,
                warp_size,
            });
        }

        let mut accesses: Vec<(usize, address, &[u8])> = Vec::with_capacity(warp_size);
        for lane in instr.active_lanes(warp_size) {
            let addr = instr.addr(lane).ok_or_else(|| Error::MissingLaneAddress {
                core: self.name.clone(),
                lane,
            })?;
            let data = match op {
                MemOp::Load => &[][..],
                MemOp::Store => match instr.data(lane) {
                    Some(data) if data.len() == size as usize => data,
                    other => {
                        return Err(Error::StorePayloadSize {
                            core: self.name.clone(),
                            lane,
                            len: other.map_or(0, <[u8]>::len),
                            size,
                        })
                    }
                },
            };
            accesses.push((lane, addr, data));
        }

        if let Some(lane) = instr
            .active_lanes(warp_size)
            .find(|&lane| !self.lsq_ports[lane].can_send())
        {
            log::debug!(
                "{}: lane {lane} port busy, stall {}",
                self.name,
                instr
            );
            return Ok(true);
        }

        let mut committed = 0;
        for (lane, addr, data) in accesses {
            log::trace!("{}: got addr {addr:#x} for lane {lane}", self.name);
            if instr.space == MemorySpace::Constant {
                log::trace!("{}: lane {lane} is const", self.name);
            }

            let uid = self.next_uid();
            let req = Request::data(uid, self.id(), instr.warp_id, addr, size, instr.pc);
            let packet = match op {
                MemOp::Load => Packet::new(req, Command::ReadReq).with_sender_state(SenderState {
                    instr: instr.clone(),
                }),
                MemOp::Store => {
                    let mut packet = Packet::new(req, Command::WriteReq);
                    packet.set_data(data);
                    packet
                }
            };

            if let Err(rejected) = self.lsq_ports[lane].send_timing_req(packet) {
                log::debug!("{}: lane {lane} rejected {}", self.name, rejected);
                if committed > 0 {
                    return Err(Error::PartialLaneDispatch {
                        core: self.name.clone(),
                        lane,
                        committed,
                    });
                }
                return Ok(true);
            }
            committed += 1;
        }
        Ok(false)
    }

    /// Handles a load response arriving on lane `lane`.
    ///
    /// # Errors
    /// If the response is not a read, carries no originating instruction,
    /// exceeds the register buffer, or another lane is already blocked on
    /// the write-back port.
    pub fn recv_lsq_data_resp(&mut self, packet: Packet, lane: usize) -> Result<RecvStatus, Error> {
        if !packet.cmd.is_read() {
            return Err(Error::UnexpectedResponse {
                core: self.name.clone(),
                port: format!("lsq_port{lane}"),
                cmd: packet.cmd,
                addr: packet.req.vaddr,
            });
        }

        log::debug!(
            "{}: got a response for lane {lane} address {:#x}",
            self.name,
            packet.req.vaddr
        );

        let Some(SenderState { ref instr }) = packet.sender_state else {
            return Err(Error::MissingSenderState {
                lane,
                addr: packet.req.vaddr,
            });
        };

        if packet.size() > MAX_LOAD_RESPONSE_SIZE {
            return Err(Error::ResponseTooLarge {
                size: packet.size(),
                max: MAX_LOAD_RESPONSE_SIZE,
            });
        }

        if !self.shader.writeback_load(instr) {
            self.writeback.block(lane)?;
            log::debug!(
                "{}: {} on lane {lane}",
                self.name,
                style("writeback blocked").bold()
            );
            return Ok(RecvStatus::Blocked(packet));
        }

        let mut data = [0u8; MAX_LOAD_RESPONSE_SIZE];
        let len = packet.write_data(&mut data);
        log::trace!("{}: loaded data {:?}", self.name, &data[..len]);
        self.shader
            .write_register(instr, self.config.warp_size, lane, &data[..len]);
        Ok(RecvStatus::Consumed)
    }

    /// Lane ports never signal retries.
    ///
    /// # Errors
    /// Always.
    pub fn recv_lsq_retry(&mut self, lane: usize) -> Result<(), Error> {
        Err(Error::UnexpectedRetry {
            core: self.name.clone(),
            port: format!("lsq_port{lane}"),
        })
    }

    /// Handles a response on the control port.
    ///
    /// # Errors
    /// If the response is not a flush.
    pub fn recv_lsq_control_resp(&mut self, packet: Packet) -> Result<(), Error> {
        if !packet.cmd.is_flush() {
            return Err(Error::UnexpectedResponse {
                core: self.name.clone(),
                port: "lsq_ctrl_port".to_string(),
                cmd: packet.cmd,
                addr: packet.req.vaddr,
            });
        }
        log::debug!("{}: got flush response", self.name);
        if self.signal_kernel_finish {
            self.shader.finish_kernel();
            self.signal_kernel_finish = false;
        }
        Ok(())
    }

    /// The control port never signals retries.
    ///
    /// # Errors
    /// Always.
    pub fn recv_lsq_control_retry(&mut self) -> Result<(), Error> {
        Err(Error::UnexpectedRetry {
            core: self.name.clone(),
            port: "lsq_ctrl_port".to_string(),
        })
    }

    /// Frees the write-back port for this cycle.
    ///
    /// A lane blocked on write-back is asked to re-deliver its response.
    pub fn writeback_clear(&mut self) {
        if let Some(lane) = self.writeback.clear() {
            log::debug!("{}: writeback clear, retry lane {lane}", self.name);
            self.lsq_ports[lane].send_retry_resp();
        }
    }

    /// Sends a flush on the control port.
    ///
    /// # Errors
    /// If the control port rejects the flush.
    pub fn flush(&mut self) -> Result<(), Error> {
        let uid = self.next_uid();
        let packet = Packet::new(Request::flush(uid, self.id()), Command::FlushReq);
        log::debug!("{}: sending flush request", self.name);
        self.lsq_control_port
            .send_timing_req(packet)
            .map_err(|_| Error::FlushRejected {
                core: self.name.clone(),
            })
    }

    /// Finishes the current kernel.
    ///
    /// Kernel completion is signalled to the functional model once the
    /// flush response arrives.
    ///
    /// # Errors
    /// If the control port rejects the flush.
    pub fn finish_kernel(&mut self) -> Result<(), Error> {
        if self.signal_kernel_finish {
            log::debug!("{}: kernel finish already pending", self.name);
            return Ok(());
        }
        self.flush()?;
        self.stats.sim.kernels_completed += 1;
        self.signal_kernel_finish = true;
        Ok(())
    }

    /// Counts a load from `space`.
    ///
    /// # Errors
    /// If loads from `space` are not possible.
    pub fn record_ld(&mut self, space: MemorySpace) -> Result<(), Error> {
        let space = space.load_space().ok_or(Error::InvalidLoadSpace(space))?;
        self.stats.accesses.inc_load(space, 1);
        Ok(())
    }

    /// Counts a store to `space`.
    ///
    /// # Errors
    /// If stores to `space` are not possible.
    pub fn record_st(&mut self, space: MemorySpace) -> Result<(), Error> {
        let space = space.store_space().ok_or(Error::InvalidStoreSpace(space))?;
        self.stats.accesses.inc_store(space, 1);
        Ok(())
    }

    pub fn record_inst(&mut self, kind: InstructionKind, tick: u64) {
        if self.stats.instructions.inc(kind) {
            let cycle = self.config.cycle(tick);
            if self.last_active_cycle != Some(cycle) {
                self.last_active_cycle = Some(cycle);
                self.stats.sim.not_stalled_cycles += 1;
            }
        }
    }

    /// # Errors
    /// If the block is already active.
    pub fn record_block_issue(&mut self, block: usize, tick: u64) -> Result<(), Error> {
        let cycle = self.config.cycle(tick);
        self.blocks.issue(block, tick, cycle)
    }

    /// # Errors
    /// If the block is not active.
    pub fn record_block_commit(&mut self, block: usize, tick: u64) -> Result<(), Error> {
        let cycle = self.config.cycle(tick);
        if let Some(active_cycles) = self.blocks.commit(block, tick, cycle)? {
            self.stats.sim.active_cycles += active_cycles;
        }
        Ok(())
    }

    pub fn print_block_stats(&self, out: &mut impl std::io::Write, tick: u64) -> std::io::Result<()> {
        self.blocks.write_stats(out, self.id(), tick)
    }
}
