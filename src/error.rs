use crate::{address, instruction::MemorySpace, translation::Fault};

/// Fatal simulation defects.
///
/// None of these are recoverable: they signal a broken invariant in the
/// simulated hardware or in the component driving the core.
/// Flow control (port backpressure, a busy write-back port) is never
/// reported through this type.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{core}: lsq port count {num_ports} != warp size {warp_size}")]
    LanePortMismatch {
        core: String,
        num_ports: usize,
        warp_size: usize,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid block size of {block_size_bits} bits (must be within 2..=12)")]
    InvalidBlockSize { block_size_bits: u32 },

    #[error("{core}: unknown port {name}[{idx:?}]")]
    UnknownPort {
        core: String,
        name: String,
        idx: Option<usize>,
    },

    #[error("fetch for line {line:#x} (addr {addr:#x}) while line is busy")]
    FetchLineBusy { addr: address, line: address },

    #[error("response for line {line:#x} (addr {addr:#x}) has no outstanding fetch")]
    UnmatchedFetchResponse { addr: address, line: address },

    #[error("{core}: instruction translation encountered fault ({fault}) for address {addr:#x}")]
    TranslationFault {
        core: String,
        addr: address,
        fault: Fault,
    },

    #[error("instruction translation for address {addr:#x} completed with mode {mode:?}")]
    UnexpectedTranslationMode {
        addr: address,
        mode: crate::translation::Mode,
    },

    #[error("{core}: received retry for inst port without stalled fetches")]
    SpuriousRetry { core: String },

    #[error("{core}: access should never fail on a retry (addr {addr:#x})")]
    RetryRejected { core: String, addr: address },

    #[error("{core}: received retry on {port} which does not support retries")]
    UnexpectedRetry { core: String, port: String },

    #[error("{core}: unsupported instruction (pc={pc:#x}, space={space:?})")]
    UnsupportedInstruction {
        core: String,
        pc: address,
        space: MemorySpace,
    },

    #[error("invalid access size of {size} bytes (data size {data_size}, vector length {vector_length})")]
    InvalidAccessSize {
        size: u32,
        data_size: u32,
        vector_length: u32,
    },

    #[error("{core}: active lane {lane} outside of warp size {warp_size}")]
    LaneOutOfRange {
        core: String,
        lane: usize,
        warp_size: usize,
    },

    #[error("{core}: active lane {lane} has no address")]
    MissingLaneAddress { core: String, lane: usize },

    #[error("{core}: store payload of {len} bytes on lane {lane} does not match access size {size}")]
    StorePayloadSize {
        core: String,
        lane: usize,
        len: usize,
        size: u32,
    },

    #[error("{core}: lane {lane} rejected after {committed} lane(s) were already sent")]
    PartialLaneDispatch {
        core: String,
        lane: usize,
        committed: usize,
    },

    #[error("lane {lane} blocked on write-back while lane {blocked} is already blocked")]
    WritebackAlreadyBlocked { lane: usize, blocked: usize },

    #[error("{core}: unexpected response {cmd:?} for addr {addr:#x} on {port}")]
    UnexpectedResponse {
        core: String,
        port: String,
        cmd: crate::packet::Command,
        addr: address,
    },

    #[error("load response for lane {lane} (addr {addr:#x}) carries no originating instruction")]
    MissingSenderState { lane: usize, addr: address },

    #[error("load response of {size} bytes exceeds the {max} byte register buffer")]
    ResponseTooLarge { size: usize, max: usize },

    #[error("{core}: flush requests should never fail")]
    FlushRejected { core: String },

    #[error("load from invalid space {0:?}")]
    InvalidLoadSpace(MemorySpace),

    #[error("store to invalid space {0:?}")]
    InvalidStoreSpace(MemorySpace),

    #[error("block {block} issued while already active")]
    BlockAlreadyActive { block: usize },

    #[error("block {block} committed while not active")]
    BlockNotActive { block: usize },
}
