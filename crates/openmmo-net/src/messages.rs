//! Wire message types and envelope encoding.
//!
//! Every message is an [`Envelope`] carrying exactly one [`Payload`] variant.
//! Envelopes are encoded as JSON with an externally tagged payload
//! (`{"payload": {"AuthRequest": {...}}}`), which is what the server speaks.
//! Use [`encode_envelope`] and [`decode_envelope`] for encoding/decoding.

use std::time::{SystemTime, UNIX_EPOCH};

use glam::Vec3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One logical message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Per-connection sequence number, starting at 0.
    pub sequence_id: u64,
    /// Sender wall clock, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// The message body.
    pub payload: Payload,
}

/// Closed set of payloads exchanged with the server. The variant name is the
/// type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Payload {
    // --- Handshake ---
    /// Client announces its version; first message on every connection.
    HandshakeRequest(HandshakeRequest),
    /// Server accepts or rejects the client version.
    HandshakeResponse(HandshakeResponse),

    // --- Auth ---
    /// Client submits credentials.
    AuthRequest(AuthRequest),
    /// Server reports the authentication outcome.
    AuthResponse(AuthResponse),

    // --- Characters ---
    /// Client asks for the account's characters.
    CharacterListRequest(CharacterListRequest),
    /// Server lists the account's characters.
    CharacterListResponse(CharacterListResponse),
    /// Client asks for a new character.
    CharacterCreateRequest(CharacterCreateRequest),
    /// Server reports the creation outcome.
    CharacterCreateResponse(CharacterCreateResponse),
    /// Client enters the world with a character.
    CharacterSelectRequest(CharacterSelectRequest),
    /// Server confirms (character present) or refuses (character absent).
    CharacterSelectResponse(CharacterSelectResponse),

    // --- World ---
    /// Client movement intent.
    MovementIntent(MovementIntent),
    /// Server-authoritative view of every relevant entity.
    WorldSnapshot(WorldSnapshot),

    // --- System ---
    /// Heartbeat ping. Sender expects a Pong in response.
    Ping(Ping),
    /// Heartbeat pong echoing the ping timestamp.
    Pong(Pong),
    /// Server-side error report.
    Error(ErrorMessage),
    /// Server is closing the connection.
    Disconnect(Disconnect),
}

impl Payload {
    /// Type tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::HandshakeRequest(_) => "HandshakeRequest",
            Payload::HandshakeResponse(_) => "HandshakeResponse",
            Payload::AuthRequest(_) => "AuthRequest",
            Payload::AuthResponse(_) => "AuthResponse",
            Payload::CharacterListRequest(_) => "CharacterListRequest",
            Payload::CharacterListResponse(_) => "CharacterListResponse",
            Payload::CharacterCreateRequest(_) => "CharacterCreateRequest",
            Payload::CharacterCreateResponse(_) => "CharacterCreateResponse",
            Payload::CharacterSelectRequest(_) => "CharacterSelectRequest",
            Payload::CharacterSelectResponse(_) => "CharacterSelectResponse",
            Payload::MovementIntent(_) => "MovementIntent",
            Payload::WorldSnapshot(_) => "WorldSnapshot",
            Payload::Ping(_) => "Ping",
            Payload::Pong(_) => "Pong",
            Payload::Error(_) => "Error",
            Payload::Disconnect(_) => "Disconnect",
        }
    }
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// Client version announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeRequest {
    /// Client build version.
    pub client_version: String,
    /// Wire protocol version.
    pub protocol_version: String,
    /// Feature bit set.
    pub supported_features: u32,
}

/// Server answer to [`HandshakeRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeResponse {
    /// `false` is fatal for the connection.
    pub accepted: bool,
    /// Server build version.
    pub server_version: String,
    /// Protocol version the server speaks.
    pub protocol_version: String,
    /// Server feature bit set.
    pub server_features: u32,
    /// Human-readable greeting or rejection reason.
    pub message: String,
}

/// Login or registration credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthRequest {
    /// Account name.
    pub username: String,
    /// Password digest; hashing happens before it reaches this core.
    pub password_hash: String,
    /// Character name, set when registering.
    pub character_name: Option<String>,
}

/// Authentication outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    /// Whether the credentials were accepted.
    pub success: bool,
    /// Opaque session token.
    #[serde(default)]
    pub session_token: Option<String>,
    /// Player identifier. Validated on receipt.
    #[serde(default)]
    pub player_id: Option<u64>,
    /// Human-readable status message.
    pub message: String,
}

/// Character list request (no fields).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CharacterListRequest {}

/// Summary of one character.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterInfo {
    /// Character identifier. Validated on receipt.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Character class.
    pub class: String,
    /// Experience level.
    pub level: u32,
}

/// Characters on the account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterListResponse {
    /// Ordered as the server lists them.
    pub characters: Vec<CharacterInfo>,
}

/// New character request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterCreateRequest {
    /// Desired name.
    pub name: String,
    /// Desired class.
    pub class: String,
}

/// Creation outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterCreateResponse {
    /// Whether the character was created.
    pub success: bool,
    /// The new character on success.
    #[serde(default)]
    pub character: Option<CharacterInfo>,
    /// Reason on failure.
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Enter-world request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterSelectRequest {
    /// Character to play.
    pub character_id: u64,
}

/// Enter-world outcome. An absent character means the selection failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterSelectResponse {
    /// The selected character.
    #[serde(default)]
    pub character: Option<CharacterInfo>,
    /// Reason on failure.
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Plain three-component vector as sent on the wire.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vector3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl From<Vec3> for Vector3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vector3> for Vec3 {
    fn from(v: Vector3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// Client movement intent. The server may accept, modify or reject it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementIntent {
    /// Where the client wants to move to.
    pub target_position: Vector3,
    /// Speed multiplier (1.0 = normal).
    pub speed_modifier: f32,
    /// `true` asks the server to halt at `target_position`.
    pub stop_movement: bool,
    /// Facing angle around the vertical axis, radians.
    pub rotation_y: f32,
}

/// Broad entity category.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Another player's character (or our own).
    Player,
    /// Hostile creature.
    Mob,
    /// Non-player character.
    Npc,
    /// Anything else; unknown tags land here.
    #[default]
    #[serde(other)]
    Object,
}

/// Free-form state carried with each entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EntityStateData {
    /// Name shown above the entity.
    pub display_name: String,
    /// Movement animation state (e.g. "Idle", "Walking").
    pub movement_state: String,
    /// Health as a percentage of maximum.
    pub health_percent: f32,
    /// Character class, for players.
    pub class: Option<String>,
}

/// One entity inside a [`WorldSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    /// Entity identifier. Validated on receipt.
    pub id: u64,
    /// Entity category.
    #[serde(default, alias = "entity_type")]
    pub kind: EntityKind,
    /// World position.
    pub position: Vector3,
    /// Euler rotation; `y` is the yaw.
    #[serde(default)]
    pub rotation: Vector3,
    /// Display and animation state.
    #[serde(default)]
    pub state: EntityStateData,
    /// Optional gender tag for player models.
    #[serde(default)]
    pub gender: Option<String>,
}

/// Full replacement view of the entities relevant to this client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldSnapshot {
    /// Zone identifier.
    #[serde(default)]
    pub zone_id: u32,
    /// Zone display name.
    pub zone_name: String,
    /// Entity controlled by this client. Validated on receipt.
    pub player_entity_id: u64,
    /// Every entity currently in view.
    pub entities: Vec<EntityRecord>,
}

/// Heartbeat ping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ping {
    /// Sender timestamp in milliseconds.
    pub timestamp: u64,
}

/// Heartbeat pong (response to [`Ping`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pong {
    /// Echoed ping timestamp.
    pub timestamp: u64,
}

/// Server error report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorMessage {
    /// Human-readable description.
    pub message: String,
}

/// Why the server closed the connection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Unspecified.
    #[default]
    Unknown,
    /// The client asked to leave.
    ClientRequest,
    /// The server is shutting down.
    ServerShutdown,
    /// The client stopped responding.
    Timeout,
    /// Removed by an operator.
    Kicked,
    /// Account banned.
    Banned,
}

/// Server-initiated disconnect notice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Disconnect {
    /// Reason code.
    #[serde(default)]
    pub reason: DisconnectReason,
    /// Human-readable explanation.
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The frame carried no bytes.
    #[error("empty payload")]
    EmptyPayload,

    /// JSON encoding or decoding failed, including unknown payload tags.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize an [`Envelope`] to JSON bytes.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, MessageError> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Deserialize JSON bytes into an [`Envelope`].
///
/// Unknown payload tags fail here, so they never reach the dispatch table.
pub fn decode_envelope(data: &[u8]) -> Result<Envelope, MessageError> {
    if data.is_empty() {
        return Err(MessageError::EmptyPayload);
    }
    Ok(serde_json::from_slice(data)?)
}

/// Wall-clock milliseconds since the Unix epoch (0 if the clock is before it).
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
