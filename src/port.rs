use super::{fifo::Fifo, packet::Packet};
use console::style;

/// Requesting side of a timing port.
///
/// Responses and retry signals travel the other way and are delivered by
/// calling the matching `recv_*` entry point of the core.
pub trait MasterPort: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Whether the port can currently accept a request.
    fn can_send(&self) -> bool {
        true
    }

    /// Sends a timing request.
    ///
    /// A rejected packet is handed back to the sender, who keeps ownership
    /// until the peer signals that it can accept more.
    fn send_timing_req(&mut self, packet: Packet) -> Result<(), Packet>;

    /// Asks the peer to re-deliver the response that was last refused.
    fn send_retry_resp(&mut self);
}

/// Port backed by a bounded queue of accepted requests.
///
/// The memory model on the other side drains the queue with [`QueuePort::pop`].
#[derive(Debug)]
pub struct QueuePort {
    name: String,
    queue: Fifo<Packet>,
    accepting: bool,
    fail_next: usize,
    /// A send was rejected and the sender waits for a retry.
    retry_pending: bool,
    num_rejected: u64,
    num_retry_resp: u64,
}

impl QueuePort {
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: Option<usize>) -> Self {
        Self {
            name: name.into(),
            queue: Fifo::new(capacity),
            accepting: true,
            fail_next: 0,
            retry_pending: false,
            num_rejected: 0,
            num_retry_resp: 0,
        }
    }

    /// Accept or refuse all further requests.
    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }

    /// Rejects the next `n` requests even though [`MasterPort::can_send`]
    /// keeps reporting capacity.
    pub fn fail_next_sends(&mut self, n: usize) {
        self.fail_next = n;
    }

    /// Signals a retry to the sender once capacity is back after a rejection.
    ///
    /// Returns `true` at most once per rejected send burst.
    pub fn take_retry(&mut self) -> bool {
        if self.retry_pending && self.can_send() {
            self.retry_pending = false;
            return true;
        }
        false
    }

    pub fn pop(&mut self) -> Option<Packet> {
        self.queue.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub fn num_rejected(&self) -> u64 {
        self.num_rejected
    }

    /// Number of response retries the core asked for.
    #[must_use]
    pub fn num_retry_resp(&self) -> u64 {
        self.num_retry_resp
    }
}

impl MasterPort for QueuePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_send(&self) -> bool {
        self.accepting && !self.queue.full()
    }

    fn send_timing_req(&mut self, packet: Packet) -> Result<(), Packet> {
        let result = if self.fail_next > 0 {
            self.fail_next -= 1;
            Err(packet)
        } else if !self.accepting {
            Err(packet)
        } else {
            log::trace!("{}: {}", style(format!("{} PUSH", self.name)).bold(), packet);
            self.queue.try_push_back(packet)
        };
        if result.is_err() {
            self.num_rejected += 1;
            self.retry_pending = true;
        }
        result
    }

    fn send_retry_resp(&mut self) {
        log::trace!("{}", style(format!("{} RETRY RESP", self.name)).bold());
        self.num_retry_resp += 1;
    }
}
