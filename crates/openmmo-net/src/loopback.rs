//! In-process transport for tests and headless tooling.
//!
//! [`loopback_pair`] returns a [`LoopbackTransport`] to hand to a session and
//! a [`LoopbackServer`] that scripts the other end: accepting the connection,
//! pushing envelopes, and inspecting what the client sent. Both halves share
//! state on the current thread, so nothing here is `Send`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::messages::{Envelope, Payload, decode_envelope, encode_envelope, now_millis};
use crate::transport::{Transport, TransportError, TransportEvent, parse_address};

#[derive(Debug, Default)]
struct Shared {
    addresses: Vec<String>,
    pending: bool,
    open: bool,
    auto_accept: bool,
    refuse_next: bool,
    fail_next_open: bool,
    inbound: VecDeque<TransportEvent>,
    outbound: Vec<Vec<u8>>,
    server_sequence: u64,
    closes: usize,
}

/// Client half of a loopback connection.
#[derive(Debug)]
pub struct LoopbackTransport {
    shared: Rc<RefCell<Shared>>,
}

/// Scripted server half of a loopback connection.
#[derive(Debug, Clone)]
pub struct LoopbackServer {
    shared: Rc<RefCell<Shared>>,
}

/// Creates a connected pair of loopback halves.
pub fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let shared = Rc::new(RefCell::new(Shared::default()));
    (
        LoopbackTransport {
            shared: Rc::clone(&shared),
        },
        LoopbackServer { shared },
    )
}

impl Transport for LoopbackTransport {
    fn open(&mut self, addr: &str) -> Result<(), TransportError> {
        parse_address(addr)?;
        let mut shared = self.shared.borrow_mut();
        if shared.fail_next_open {
            shared.fail_next_open = false;
            return Err(TransportError::OpenFailed("connection refused".to_string()));
        }
        shared.addresses.push(addr.to_string());
        shared.inbound.clear();
        shared.open = false;
        shared.pending = true;
        if shared.refuse_next {
            shared.refuse_next = false;
            shared.pending = false;
            shared
                .inbound
                .push_back(TransportEvent::Failed("connection refused".to_string()));
        } else if shared.auto_accept {
            shared.pending = false;
            shared.open = true;
            shared.inbound.push_back(TransportEvent::Opened);
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.shared.borrow_mut().inbound.pop_front()
    }

    fn send(&mut self, message: Vec<u8>) -> Result<(), TransportError> {
        let mut shared = self.shared.borrow_mut();
        if !shared.open {
            return Err(TransportError::NotOpen);
        }
        shared.outbound.push(message);
        Ok(())
    }

    fn close(&mut self) {
        let mut shared = self.shared.borrow_mut();
        if shared.open || shared.pending {
            shared.closes += 1;
        }
        shared.open = false;
        shared.pending = false;
        shared.inbound.clear();
    }
}

impl LoopbackServer {
    /// Accept every future connection attempt immediately.
    pub fn set_auto_accept(&self, enabled: bool) {
        self.shared.borrow_mut().auto_accept = enabled;
    }

    /// Completes a pending connection attempt. Returns `false` if none.
    pub fn accept(&self) -> bool {
        let mut shared = self.shared.borrow_mut();
        if !shared.pending {
            return false;
        }
        shared.pending = false;
        shared.open = true;
        shared.inbound.push_back(TransportEvent::Opened);
        true
    }

    /// Makes the next `open` fail synchronously.
    pub fn fail_next_open(&self) {
        self.shared.borrow_mut().fail_next_open = true;
    }

    /// Makes the next `open` start, then report [`TransportEvent::Failed`].
    pub fn refuse_next(&self) {
        self.shared.borrow_mut().refuse_next = true;
    }

    /// Delivers `payload` to the client in a fresh envelope.
    pub fn push(&self, payload: Payload) {
        let mut shared = self.shared.borrow_mut();
        let envelope = Envelope {
            sequence_id: shared.server_sequence,
            timestamp: now_millis(),
            payload,
        };
        shared.server_sequence += 1;
        match encode_envelope(&envelope) {
            Ok(bytes) => shared.inbound.push_back(TransportEvent::Frame(bytes)),
            Err(e) => tracing::error!("loopback encode failed: {e}"),
        }
    }

    /// Delivers arbitrary bytes as one inbound message.
    pub fn push_raw(&self, bytes: impl Into<Vec<u8>>) {
        self.shared
            .borrow_mut()
            .inbound
            .push_back(TransportEvent::Frame(bytes.into()));
    }

    /// Closes the connection from the server side.
    pub fn disconnect(&self, reason: &str) {
        let mut shared = self.shared.borrow_mut();
        shared.open = false;
        shared
            .inbound
            .push_back(TransportEvent::Closed(reason.to_string()));
    }

    /// Reports a network failure on the open connection.
    pub fn fail(&self, reason: &str) {
        let mut shared = self.shared.borrow_mut();
        shared.open = false;
        shared
            .inbound
            .push_back(TransportEvent::Failed(reason.to_string()));
    }

    /// Removes and decodes everything the client sent so far.
    pub fn take_sent(&self) -> Vec<Envelope> {
        self.take_sent_raw()
            .iter()
            .filter_map(|bytes| decode_envelope(bytes).ok())
            .collect()
    }

    /// Removes everything the client sent so far, undecoded.
    pub fn take_sent_raw(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.shared.borrow_mut().outbound)
    }

    /// Whether the client side currently holds an open connection.
    pub fn is_open(&self) -> bool {
        self.shared.borrow().open
    }

    /// Addresses passed to `open`, oldest first.
    pub fn addresses(&self) -> Vec<String> {
        self.shared.borrow().addresses.clone()
    }

    /// Number of times the client closed a live or pending connection.
    pub fn close_count(&self) -> usize {
        self.shared.borrow().closes
    }
}
