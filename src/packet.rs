use super::{address, instruction::WarpInstruction};
use smallvec::SmallVec;

/// Requestor a request is issued on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Master {
    Inst,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {
    ReadReq,
    ReadResp,
    WriteReq,
    WriteResp,
    FlushReq,
    FlushResp,
}

impl Command {
    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, Command::ReadReq | Command::ReadResp)
    }

    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(self, Command::WriteReq | Command::WriteResp)
    }

    #[must_use]
    pub fn is_flush(self) -> bool {
        matches!(self, Command::FlushReq | Command::FlushResp)
    }

    /// The response command answering this request.
    #[must_use]
    pub fn response(self) -> Option<Command> {
        match self {
            Command::ReadReq => Some(Command::ReadResp),
            Command::WriteReq => Some(Command::WriteResp),
            Command::FlushReq => Some(Command::FlushResp),
            Command::ReadResp | Command::WriteResp | Command::FlushResp => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Transaction id, unique per core.
    pub uid: u64,
    pub vaddr: address,
    /// Physical address, once translated.
    pub paddr: Option<address>,
    pub size: u32,
    pub pc: address,
    pub master: Master,
    pub core_id: usize,
    pub warp_id: Option<usize>,
    pub inst_fetch: bool,
}

impl Request {
    #[must_use]
    pub fn inst_fetch(uid: u64, core_id: usize, line_addr: address, size: u32, pc: address) -> Self {
        Self {
            uid,
            vaddr: line_addr,
            paddr: None,
            size,
            pc,
            master: Master::Inst,
            core_id,
            warp_id: None,
            inst_fetch: true,
        }
    }

    #[must_use]
    pub fn data(
        uid: u64,
        core_id: usize,
        warp_id: usize,
        addr: address,
        size: u32,
        pc: address,
    ) -> Self {
        Self {
            uid,
            vaddr: addr,
            paddr: None,
            size,
            pc,
            master: Master::Data,
            core_id,
            warp_id: Some(warp_id),
            inst_fetch: false,
        }
    }

    #[must_use]
    pub fn flush(uid: u64, core_id: usize) -> Self {
        Self {
            uid,
            vaddr: 0,
            paddr: None,
            size: 0,
            pc: 0,
            master: Master::Data,
            core_id,
            warp_id: None,
            inst_fetch: false,
        }
    }
}

/// Bookkeeping attached to a load so its response can be routed back
/// to the register write-back of the originating instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderState {
    pub instr: WarpInstruction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub req: Request,
    pub cmd: Command,
    pub data: SmallVec<[u8; 16]>,
    pub sender_state: Option<SenderState>,
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}[uid={}, vaddr={:#x}, size={}]",
            self.cmd, self.req.uid, self.req.vaddr, self.req.size
        )
    }
}

impl Packet {
    /// Creates a packet with a zeroed payload of the request size.
    ///
    /// Flushes carry no payload.
    #[must_use]
    pub fn new(req: Request, cmd: Command) -> Self {
        let size = if cmd.is_flush() { 0 } else { req.size as usize };
        Self {
            data: SmallVec::from_elem(0, size),
            req,
            cmd,
            sender_state: None,
        }
    }

    #[must_use]
    pub fn with_sender_state(mut self, state: SenderState) -> Self {
        self.sender_state = Some(state);
        self
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Copies `data` into the payload, truncated to the payload size.
    pub fn set_data(&mut self, data: &[u8]) {
        let n = data.len().min(self.data.len());
        self.data[..n].copy_from_slice(&data[..n]);
    }

    /// Copies the payload into `out`, returning the number of bytes written.
    pub fn write_data(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.data.len());
        out[..n].copy_from_slice(&self.data[..n]);
        n
    }

    /// Turns the request into its response in place.
    ///
    /// Write responses drop their payload.
    pub fn make_response(&mut self) {
        if let Some(cmd) = self.cmd.response() {
            self.cmd = cmd;
            if cmd.is_write() {
                self.data.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, Packet, Request};

    #[test]
    fn test_read_packet() {
        let req = Request::data(0, 1, 2, 0x1000, 8, 0x40);
        let mut packet = Packet::new(req, Command::ReadReq);
        assert_eq!(packet.size(), 8);
        assert!(packet.cmd.is_read());
        assert!(packet.cmd.response().is_some());

        packet.make_response();
        assert_eq!(packet.cmd, Command::ReadResp);
        packet.set_data(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let mut out = [0u8; 16];
        assert_eq!(packet.write_data(&mut out), 8);
        assert_eq!(&out[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&out[8..], &[0; 8]);
    }

    #[test]
    fn test_write_and_flush_packets() {
        let mut packet = Packet::new(Request::data(0, 0, 0, 0x80, 4, 0), Command::WriteReq);
        packet.set_data(&[0xAA, 0xBB]);
        assert_eq!(packet.data.as_slice(), &[0xAA, 0xBB, 0, 0]);
        packet.make_response();
        assert_eq!(packet.cmd, Command::WriteResp);
        assert_eq!(packet.size(), 0);

        let mut flush = Packet::new(Request::flush(1, 0), Command::FlushReq);
        assert_eq!(flush.size(), 0);
        flush.make_response();
        assert!(flush.cmd.is_flush() && flush.cmd.response().is_none());
        // responses stay responses
        flush.make_response();
        assert_eq!(flush.cmd, Command::FlushResp);
    }
}
