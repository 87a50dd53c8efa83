//! Message transport abstraction.
//!
//! A [`Transport`] moves whole encoded envelopes. It never blocks the caller:
//! [`Transport::open`] starts connecting and returns, and everything that
//! happens afterwards is reported through [`Transport::poll_event`].

/// Something that happened on the transport since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established.
    Opened,
    /// One complete inbound message.
    Frame(Vec<u8>),
    /// The peer or the network closed the connection.
    Closed(String),
    /// Connecting or I/O failed.
    Failed(String),
}

/// Transport failures reported synchronously.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The address could not be parsed.
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    /// The connection could not be started.
    #[error("failed to open connection: {0}")]
    OpenFailed(String),

    /// No connection is open.
    #[error("transport is not open")]
    NotOpen,

    /// The outbound path is gone.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Bidirectional message pipe to one server.
pub trait Transport {
    /// Starts connecting to `addr` (`host:port`). Returns once the attempt is
    /// under way; completion arrives as [`TransportEvent::Opened`] or
    /// [`TransportEvent::Failed`].
    fn open(&mut self, addr: &str) -> Result<(), TransportError>;

    /// Returns the next pending event without blocking.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Queues one encoded message for delivery.
    fn send(&mut self, message: Vec<u8>) -> Result<(), TransportError>;

    /// Drops the connection. No further events are reported for it.
    fn close(&mut self);
}

/// Splits `host:port`, rejecting empty hosts and bad ports.
pub fn parse_address(addr: &str) -> Result<(&str, u16), TransportError> {
    let invalid = || TransportError::InvalidAddress(addr.to_string());
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host, port))
}
