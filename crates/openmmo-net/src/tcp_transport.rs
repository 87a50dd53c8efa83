//! TCP transport driven by a tokio runtime.
//!
//! Socket I/O runs on background tasks spawned onto a runtime [`Handle`].
//! Inbound frames are handed back through a bounded channel that the owning
//! thread drains with [`Transport::poll_event`], so the caller never awaits.
//! A [`watch`] channel signals the tasks to exit on close.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use crate::framing::{FrameConfig, FrameError, encode_frame, read_frame};
use crate::transport::{Transport, TransportError, TransportEvent, parse_address};

/// Default bound on undelivered inbound events.
pub const DEFAULT_INBOUND_CAPACITY: usize = 1024;

struct Link {
    events_rx: mpsc::Receiver<TransportEvent>,
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Length-prefixed JSON envelopes over a TCP stream.
pub struct TcpTransport {
    runtime: Handle,
    frames: FrameConfig,
    inbound_capacity: usize,
    link: Option<Link>,
}

impl TcpTransport {
    /// Creates a closed transport that will spawn its I/O onto `runtime`.
    pub fn new(runtime: Handle, frames: FrameConfig) -> Self {
        Self {
            runtime,
            frames,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            link: None,
        }
    }

    /// Overrides the inbound queue bound. Readers stall while it is full.
    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    async fn run(
        host: String,
        port: u16,
        frames: FrameConfig,
        events_tx: mpsc::Sender<TransportEvent>,
        outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let connected = tokio::select! {
            result = TcpStream::connect((host.as_str(), port)) => result,
            _ = shutdown_rx.changed() => return,
        };
        let stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Connection to {host}:{port} failed: {e}");
                let _ = events_tx.send(TransportEvent::Failed(e.to_string())).await;
                return;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("TCP_NODELAY not applied: {e}");
        }
        tracing::info!("Connected to {host}:{port}");
        if events_tx.send(TransportEvent::Opened).await.is_err() {
            return;
        }

        let (reader, writer) = stream.into_split();
        tokio::spawn(Self::write_loop(
            writer,
            outbound_rx,
            events_tx.clone(),
            shutdown_rx.clone(),
        ));
        Self::read_loop(reader, frames, events_tx, shutdown_rx).await;
    }

    async fn read_loop(
        mut reader: OwnedReadHalf,
        frames: FrameConfig,
        events_tx: mpsc::Sender<TransportEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            let result = tokio::select! {
                result = read_frame(&mut reader, &frames) => result,
                _ = shutdown_rx.changed() => break,
            };
            let (event, terminal) = match result {
                Ok(bytes) => (TransportEvent::Frame(bytes), false),
                Err(FrameError::ConnectionClosed) => (
                    TransportEvent::Closed("connection closed by server".to_string()),
                    true,
                ),
                Err(e) => (TransportEvent::Failed(e.to_string()), true),
            };
            if !Self::deliver(&events_tx, event, &mut shutdown_rx).await || terminal {
                break;
            }
        }
    }

    /// Waits for room in the inbound channel. `false` once closed.
    async fn deliver(
        events_tx: &mpsc::Sender<TransportEvent>,
        event: TransportEvent,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> bool {
        tokio::select! {
            sent = events_tx.send(event) => sent.is_ok(),
            _ = shutdown_rx.changed() => false,
        }
    }

    async fn write_loop<W: AsyncWrite + Unpin>(
        mut writer: W,
        mut outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        events_tx: mpsc::Sender<TransportEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            let frame = tokio::select! {
                frame = outbound_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                _ = shutdown_rx.changed() => break,
            };
            let written = match writer.write_all(&frame).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                tracing::warn!("Write failed: {e}");
                Self::deliver(&events_tx, TransportEvent::Failed(e.to_string()), &mut shutdown_rx)
                    .await;
                break;
            }
        }
        let _ = writer.shutdown().await;
    }
}

impl Transport for TcpTransport {
    fn open(&mut self, addr: &str) -> Result<(), TransportError> {
        let (host, port) = parse_address(addr)?;
        self.close();

        let (events_tx, events_rx) = mpsc::channel(self.inbound_capacity);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.runtime.spawn(Self::run(
            host.to_string(),
            port,
            self.frames.clone(),
            events_tx,
            outbound_rx,
            shutdown_rx,
        ));
        self.link = Some(Link {
            events_rx,
            outbound_tx,
            shutdown_tx,
        });
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.link.as_mut()?.events_rx.try_recv().ok()
    }

    fn send(&mut self, message: Vec<u8>) -> Result<(), TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::NotOpen)?;
        let frame = encode_frame(&message, &self.frames)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        link.outbound_tx
            .send(frame)
            .map_err(|_| TransportError::SendFailed("writer task has exited".to_string()))
    }

    fn close(&mut self) {
        if let Some(link) = self.link.take() {
            let _ = link.shutdown_tx.send(true);
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
