//! Client connection session.
//!
//! [`ConnectionSession`] owns the one connection to the game server. It runs
//! the lifecycle `Disconnected → Connecting → Connected` (or `Error`), stamps
//! every outgoing payload with the next sequence number, and turns inbound
//! envelopes into [`SessionEvent`]s. Nothing here blocks: call
//! [`ConnectionSession::poll`] once per tick and drain the events.

use std::time::{Duration, Instant};

use openmmo_events::EventQueue;

use crate::ids::{checked_id, sanitize_id};
use crate::messages::{
    CharacterInfo, Envelope, HandshakeRequest, MessageError, Payload, Ping, Pong, WorldSnapshot,
    decode_envelope, encode_envelope, now_millis,
};
use crate::transport::{Transport, TransportError, TransportEvent};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    Disconnected,
    /// Waiting for the transport to open.
    Connecting,
    /// Open; payloads may be sent.
    Connected,
    /// The last connection ended in a failure.
    Error,
}

/// Session parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sent in the handshake.
    pub client_version: String,
    /// Sent in the handshake.
    pub protocol_version: String,
    /// Feature bits sent in the handshake.
    pub supported_features: u32,
    /// Interval between heartbeat pings. Zero disables the heartbeat.
    pub ping_interval: Duration,
    /// Bound on undrained session events.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_version: "0.1.0".to_string(),
            protocol_version: "1.0".to_string(),
            supported_features: 0,
            ping_interval: Duration::from_secs(5),
            event_capacity: openmmo_events::DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// What the session observed since the last drain.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The connection opened. Raised once per connection.
    Connected,
    /// The connection ended, locally or remotely.
    Disconnected {
        /// Why the connection ended.
        reason: String,
    },
    /// A transport failure.
    Error(String),
    /// The server accepted our version.
    HandshakeAccepted {
        /// Server build version.
        server_version: String,
        /// Greeting.
        message: String,
    },
    /// The server refused our version. The session is now in `Error`.
    HandshakeRejected {
        /// Rejection reason.
        message: String,
    },
    /// Authentication outcome.
    AuthResult {
        /// Whether the credentials were accepted.
        success: bool,
        /// Server status message.
        message: String,
        /// Validated player id.
        player_id: Option<u64>,
    },
    /// The account's characters.
    CharacterList(Vec<CharacterInfo>),
    /// Character creation outcome.
    CharacterCreated {
        /// Whether creation succeeded.
        success: bool,
        /// The new character.
        character: Option<CharacterInfo>,
        /// Failure reason.
        error: Option<String>,
    },
    /// Character selection outcome; `None` means refused.
    CharacterSelected {
        /// The selected character.
        character: Option<CharacterInfo>,
        /// Failure reason.
        error: Option<String>,
    },
    /// A fresh authoritative snapshot with validated ids.
    WorldSnapshot(WorldSnapshot),
    /// Heartbeat round trip.
    Pong {
        /// Round trip in milliseconds.
        rtt_ms: u64,
    },
    /// The server reported an error.
    ServerError(String),
}

/// Session failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `send` was called outside the `Connected` state.
    #[error("cannot send while {0:?}")]
    NotConnected(ConnectionState),

    /// The transport rejected the operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The payload could not be encoded.
    #[error(transparent)]
    Encode(#[from] MessageError),
}

/// The single persistent connection to the game server.
pub struct ConnectionSession<T: Transport> {
    transport: T,
    config: SessionConfig,
    state: ConnectionState,
    next_sequence: u64,
    session_token: Option<String>,
    player_id: Option<u64>,
    server_version: Option<String>,
    last_ping: Option<Instant>,
    events: EventQueue<SessionEvent>,
}

impl<T: Transport> ConnectionSession<T> {
    /// Creates a disconnected session over `transport`.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let events = EventQueue::new(config.event_capacity);
        Self {
            transport,
            config,
            state: ConnectionState::Disconnected,
            next_sequence: 0,
            session_token: None,
            player_id: None,
            server_version: None,
            last_ping: None,
            events,
        }
    }

    /// Starts connecting to `addr` (`host:port`) and returns immediately.
    ///
    /// Any previous connection is dropped without raising `Disconnected`.
    pub fn connect(&mut self, addr: &str) -> Result<(), SessionError> {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!("Dropping previous connection ({:?})", self.state);
            self.transport.close();
        }
        self.reset_identity();
        self.next_sequence = 0;

        if let Err(e) = self.transport.open(addr) {
            tracing::warn!("Failed to start connection to {addr}: {e}");
            self.state = ConnectionState::Error;
            return Err(e.into());
        }
        tracing::info!("Connecting to {addr}");
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Drains the transport and runs the heartbeat.
    pub fn poll(&mut self) {
        self.poll_at(Instant::now());
    }

    /// [`poll`](Self::poll) with an explicit clock.
    pub fn poll_at(&mut self, now: Instant) {
        while let Some(event) = self.transport.poll_event() {
            match event {
                TransportEvent::Opened => self.on_opened(now),
                TransportEvent::Frame(bytes) => self.on_frame(&bytes),
                TransportEvent::Closed(reason) => self.on_remote_close(reason),
                TransportEvent::Failed(reason) => self.fail(reason),
            }
        }
        self.heartbeat(now);
    }

    /// Wraps `payload` in the next envelope and sends it. Returns the
    /// sequence number used.
    pub fn send(&mut self, payload: Payload) -> Result<u64, SessionError> {
        if self.state != ConnectionState::Connected {
            return Err(SessionError::NotConnected(self.state));
        }
        let envelope = Envelope {
            sequence_id: self.next_sequence,
            timestamp: now_millis(),
            payload,
        };
        let bytes = encode_envelope(&envelope)?;
        self.next_sequence += 1;
        tracing::trace!(
            sequence_id = envelope.sequence_id,
            "Sending {}",
            envelope.payload.kind()
        );
        if let Err(e) = self.transport.send(bytes) {
            tracing::warn!("Send failed: {e}");
            self.events.push(SessionEvent::Error(e.to_string()));
            return Err(e.into());
        }
        Ok(envelope.sequence_id)
    }

    /// Closes the connection. Safe to call in any state; raises
    /// `Disconnected` on every call.
    pub fn close(&mut self) {
        self.transport.close();
        if self.state != ConnectionState::Disconnected {
            tracing::info!("Connection closed by client");
        }
        self.state = ConnectionState::Disconnected;
        self.reset_identity();
        self.events.push(SessionEvent::Disconnected {
            reason: "closed by client".to_string(),
        });
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Shorthand for `state() == Connected`.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Token from the last successful authentication.
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Validated player id from the last authentication.
    pub fn player_id(&self) -> Option<u64> {
        self.player_id
    }

    /// Server version from the accepted handshake.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Sequence number the next `send` will use.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Drains events raised since the last call.
    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.events.drain()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn reset_identity(&mut self) {
        self.session_token = None;
        self.player_id = None;
        self.server_version = None;
        self.last_ping = None;
    }

    fn on_opened(&mut self, now: Instant) {
        if self.state != ConnectionState::Connecting {
            tracing::debug!("Ignoring open notification in {:?}", self.state);
            return;
        }
        self.state = ConnectionState::Connected;
        self.last_ping = Some(now);
        self.events.push(SessionEvent::Connected);

        let handshake = Payload::HandshakeRequest(HandshakeRequest {
            client_version: self.config.client_version.clone(),
            protocol_version: self.config.protocol_version.clone(),
            supported_features: self.config.supported_features,
        });
        if let Err(e) = self.send(handshake) {
            self.fail(format!("handshake send failed: {e}"));
        }
    }

    fn on_remote_close(&mut self, reason: String) {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return;
        }
        tracing::info!("Connection closed: {reason}");
        self.transport.close();
        self.state = ConnectionState::Disconnected;
        self.reset_identity();
        self.events.push(SessionEvent::Disconnected { reason });
    }

    fn fail(&mut self, reason: String) {
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Error
        ) {
            return;
        }
        tracing::error!("Connection error: {reason}");
        self.transport.close();
        self.state = ConnectionState::Error;
        self.reset_identity();
        self.events.push(SessionEvent::Error(reason));
    }

    fn heartbeat(&mut self, now: Instant) {
        if self.state != ConnectionState::Connected || self.config.ping_interval.is_zero() {
            return;
        }
        let due = self
            .last_ping
            .is_none_or(|last| now.saturating_duration_since(last) >= self.config.ping_interval);
        if due {
            self.last_ping = Some(now);
            let _ = self.send(Payload::Ping(Ping {
                timestamp: now_millis(),
            }));
        }
    }

    fn on_frame(&mut self, bytes: &[u8]) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let envelope = match decode_envelope(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Dropping undecodable message: {e}");
                return;
            }
        };
        let kind = envelope.payload.kind();
        tracing::trace!(sequence_id = envelope.sequence_id, "Received {kind}");

        match envelope.payload {
            Payload::HandshakeResponse(response) => {
                if response.accepted {
                    tracing::info!(
                        "Handshake accepted by server {}: {}",
                        response.server_version,
                        response.message
                    );
                    self.server_version = Some(response.server_version.clone());
                    self.events.push(SessionEvent::HandshakeAccepted {
                        server_version: response.server_version,
                        message: response.message,
                    });
                } else {
                    tracing::error!("Handshake rejected: {}", response.message);
                    self.transport.close();
                    self.state = ConnectionState::Error;
                    self.reset_identity();
                    self.events.push(SessionEvent::HandshakeRejected {
                        message: response.message,
                    });
                }
            }
            Payload::AuthResponse(response) => {
                self.player_id = response.player_id.and_then(checked_id);
                self.session_token = if response.success {
                    response.session_token
                } else {
                    None
                };
                self.events.push(SessionEvent::AuthResult {
                    success: response.success,
                    message: response.message,
                    player_id: self.player_id,
                });
            }
            Payload::CharacterListResponse(response) => {
                let characters = response.characters.into_iter().map(sanitize_character).collect();
                self.events.push(SessionEvent::CharacterList(characters));
            }
            Payload::CharacterCreateResponse(response) => {
                self.events.push(SessionEvent::CharacterCreated {
                    success: response.success,
                    character: response.character.map(sanitize_character),
                    error: response.error_message,
                });
            }
            Payload::CharacterSelectResponse(response) => {
                self.events.push(SessionEvent::CharacterSelected {
                    character: response.character.map(sanitize_character),
                    error: response.error_message,
                });
            }
            Payload::WorldSnapshot(mut snapshot) => {
                snapshot.player_entity_id = sanitize_id(snapshot.player_entity_id);
                for entity in &mut snapshot.entities {
                    entity.id = sanitize_id(entity.id);
                }
                self.events.push(SessionEvent::WorldSnapshot(snapshot));
            }
            Payload::Ping(ping) => {
                let _ = self.send(Payload::Pong(Pong {
                    timestamp: ping.timestamp,
                }));
            }
            Payload::Pong(pong) => {
                let rtt_ms = now_millis().saturating_sub(pong.timestamp);
                tracing::debug!("Heartbeat round trip {rtt_ms} ms");
                self.events.push(SessionEvent::Pong { rtt_ms });
            }
            Payload::Error(error) => {
                tracing::warn!("Server error: {}", error.message);
                self.events.push(SessionEvent::ServerError(error.message));
            }
            Payload::Disconnect(notice) => {
                let reason = if notice.message.is_empty() {
                    format!("{:?}", notice.reason)
                } else {
                    notice.message
                };
                self.on_remote_close(reason);
            }
            Payload::HandshakeRequest(_)
            | Payload::AuthRequest(_)
            | Payload::CharacterListRequest(_)
            | Payload::CharacterCreateRequest(_)
            | Payload::CharacterSelectRequest(_)
            | Payload::MovementIntent(_) => {
                tracing::warn!("Dropping unexpected {kind} from server");
            }
        }
    }
}

fn sanitize_character(mut character: CharacterInfo) -> CharacterInfo {
    character.id = sanitize_id(character.id);
    character
}
