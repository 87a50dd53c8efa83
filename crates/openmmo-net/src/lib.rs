//! Client networking: wire protocol, framing, transports, identifier
//! validation and the connection session state machine.

pub mod framing;
pub mod ids;
pub mod loopback;
pub mod messages;
pub mod session;
pub mod tcp_transport;
pub mod transport;

pub use framing::{FrameConfig, FrameError, encode_frame, read_frame, write_frame};
pub use ids::{INVALID_ID, MAX_VALID_ID, checked_id, sanitize_id};
pub use loopback::{LoopbackServer, LoopbackTransport, loopback_pair};
pub use messages::{
    AuthRequest, AuthResponse, CharacterCreateRequest, CharacterCreateResponse, CharacterInfo,
    CharacterListRequest, CharacterListResponse, CharacterSelectRequest, CharacterSelectResponse,
    Disconnect, DisconnectReason, EntityKind, EntityRecord, EntityStateData, Envelope,
    ErrorMessage, HandshakeRequest, HandshakeResponse, MessageError, MovementIntent, Payload, Ping,
    Pong, Vector3, WorldSnapshot, decode_envelope, encode_envelope, now_millis,
};
pub use session::{ConnectionSession, ConnectionState, SessionConfig, SessionError, SessionEvent};
pub use tcp_transport::TcpTransport;
pub use transport::{Transport, TransportError, TransportEvent, parse_address};
