//! End-to-end client flows against a scripted loopback server.

use std::time::{Duration, Instant};

use openmmo_client::{ClientContext, ClientError};
use openmmo_config::Config;
use openmmo_input::RawInput;
use openmmo_multiplayer::ReplicationEvent;
use openmmo_net::{
    AuthResponse, CharacterCreateResponse, CharacterInfo, CharacterListResponse,
    CharacterSelectResponse, ConnectionState, Disconnect, DisconnectReason, EntityKind,
    EntityRecord, EntityStateData, ErrorMessage, HandshakeResponse, LoopbackServer,
    LoopbackTransport, Payload, Vector3, WorldSnapshot, loopback_pair,
};
use openmmo_ui::{LoadingPurpose, Screen, UiEvent, WatchdogKind};
use winit::event::ElementState;
use winit::keyboard::KeyCode;

const DT: f32 = 1.0 / 60.0;

struct Harness {
    client: ClientContext<LoopbackTransport>,
    server: LoopbackServer,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        let (transport, server) = loopback_pair();
        server.set_auto_accept(true);
        Self {
            client: ClientContext::new(transport, &config),
            server,
            now: Instant::now(),
        }
    }

    fn tick(&mut self) {
        self.now += Duration::from_millis(16);
        self.client.tick(DT, self.now);
    }

    fn advance(&mut self, by: Duration) {
        self.now += by;
        self.client.tick(DT, self.now);
    }

    fn sent_kinds(&self) -> Vec<&'static str> {
        self.server
            .take_sent()
            .iter()
            .map(|e| e.payload.kind())
            .filter(|kind| *kind != "Ping")
            .collect()
    }

    fn accept_handshake(&self) {
        self.server.push(Payload::HandshakeResponse(HandshakeResponse {
            accepted: true,
            server_version: "0.3.0".to_string(),
            protocol_version: "1".to_string(),
            server_features: 0,
            message: "welcome".to_string(),
        }));
    }

    fn auth_response(&self, success: bool, message: &str) {
        self.server.push(Payload::AuthResponse(AuthResponse {
            success,
            session_token: success.then(|| "token-1".to_string()),
            player_id: success.then_some(42),
            message: message.to_string(),
        }));
    }

    fn character_list(&self, characters: Vec<CharacterInfo>) {
        self.server
            .push(Payload::CharacterListResponse(CharacterListResponse {
                characters,
            }));
    }

    /// Drives a fresh client through login and onto the character list.
    fn logged_in(characters: Vec<CharacterInfo>) -> Self {
        let mut h = Self::new();
        h.client.submit_login("alice", "pw1", h.now).unwrap();
        h.tick();
        h.accept_handshake();
        h.auth_response(true, "ok");
        h.tick();
        h.character_list(characters);
        h.tick();
        assert_eq!(h.client.ui().screen(), Screen::CharacterSelect);
        h.server.take_sent();
        h.client.drain_ui_events().for_each(drop);
        h
    }

    /// Drives a fresh client into the world as character 7.
    fn in_world() -> Self {
        let mut h = Self::logged_in(vec![character(7, "Aria")]);
        h.client.submit_select_character(7, h.now).unwrap();
        h.server
            .push(Payload::CharacterSelectResponse(CharacterSelectResponse {
                character: Some(character(7, "Aria")),
                error_message: None,
            }));
        h.tick();
        assert_eq!(h.client.ui().screen(), Screen::Connected);
        h.server.take_sent();
        h
    }
}

fn character(id: u64, name: &str) -> CharacterInfo {
    CharacterInfo {
        id,
        name: name.to_string(),
        class: "Warrior".to_string(),
        level: 1,
    }
}

fn entity(id: u64, kind: EntityKind, x: f32, z: f32) -> EntityRecord {
    EntityRecord {
        id,
        kind,
        position: Vector3 { x, y: 0.0, z },
        rotation: Vector3::default(),
        state: EntityStateData::default(),
        gender: None,
    }
}

fn snapshot(player_entity_id: u64, entities: Vec<EntityRecord>) -> Payload {
    Payload::WorldSnapshot(WorldSnapshot {
        zone_id: 1,
        zone_name: "Meadow".to_string(),
        player_entity_id,
        entities,
    })
}

fn key(key: KeyCode, state: ElementState) -> RawInput {
    RawInput::Key {
        key,
        state,
        repeat: false,
    }
}

#[test]
fn test_bad_credentials_return_to_login() {
    let mut h = Harness::new();
    h.client.submit_login("alice", "pw1", h.now).unwrap();
    assert_eq!(
        h.client.ui().screen(),
        Screen::Loading(LoadingPurpose::Authenticating)
    );

    h.tick();
    let sent = h.server.take_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].sequence_id, 0);
    assert!(matches!(sent[0].payload, Payload::HandshakeRequest(_)));
    assert_eq!(sent[1].sequence_id, 1);
    match &sent[1].payload {
        Payload::AuthRequest(request) => {
            assert_eq!(request.username, "alice");
            assert_eq!(request.password_hash, "pw1");
            assert_eq!(request.character_name, None);
        }
        other => panic!("expected AuthRequest, got {other:?}"),
    }

    h.accept_handshake();
    h.auth_response(false, "bad credentials");
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert_eq!(h.client.ui().error_message(), Some("bad credentials"));
    assert!(!h.client.ui().watchdogs().any_armed());
    // Failed credentials keep the connection for the next attempt.
    assert!(h.client.session().is_connected());
}

#[test]
fn test_retry_after_failure_reuses_connection() {
    let mut h = Harness::new();
    h.client.submit_login("alice", "pw1", h.now).unwrap();
    h.tick();
    h.auth_response(false, "bad credentials");
    h.tick();
    h.server.take_sent();

    h.client.submit_login("alice", "pw2", h.now).unwrap();
    let sent = h.server.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sequence_id, 2);
    assert_eq!(h.server.addresses().len(), 1);
}

#[test]
fn test_happy_path_into_world() {
    let mut h = Harness::new();
    h.client.submit_login("alice", "pw1", h.now).unwrap();
    h.tick();
    h.accept_handshake();
    h.auth_response(true, "ok");
    h.tick();
    assert_eq!(h.client.session().player_id(), Some(42));
    assert_eq!(
        h.sent_kinds(),
        vec!["HandshakeRequest", "AuthRequest", "CharacterListRequest"]
    );

    h.character_list(vec![character(7, "Aria"), character(8, "Bo")]);
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::CharacterSelect);
    assert_eq!(h.client.ui().characters().len(), 2);
    assert!(h.client.highlight_character(8));

    h.client.submit_select_character(8, h.now).unwrap();
    assert_eq!(h.sent_kinds(), vec!["CharacterSelectRequest"]);
    h.server
        .push(Payload::CharacterSelectResponse(CharacterSelectResponse {
            character: Some(character(8, "Bo")),
            error_message: None,
        }));
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::Connected);
    assert_eq!(h.client.selected_character().map(|c| c.id), Some(8));

    let screens: Vec<Screen> = h
        .client
        .drain_ui_events()
        .filter_map(|e| match e {
            UiEvent::StateChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(
        screens,
        vec![
            Screen::Loading(LoadingPurpose::Authenticating),
            Screen::CharacterSelect,
            Screen::Loading(LoadingPurpose::SelectingCharacter),
            Screen::Connected,
        ]
    );
}

#[test]
fn test_first_snapshot_places_local_player_then_movement_is_sent() {
    let mut h = Harness::in_world();

    // No intents before the server has told us where we are.
    h.client.handle_input(key(KeyCode::KeyW, ElementState::Pressed));
    h.tick();
    assert!(h.sent_kinds().is_empty());
    h.client.handle_input(key(KeyCode::KeyW, ElementState::Released));
    h.tick();

    h.server.push(snapshot(
        7,
        vec![
            entity(7, EntityKind::Player, 1.0, 2.0),
            entity(9, EntityKind::Mob, 5.0, 5.0),
        ],
    ));
    h.tick();
    assert_eq!(h.client.store().len(), 2);
    assert_eq!(h.client.store().local_player_id(), Some(7));
    assert_eq!(
        h.client.predictor().position(),
        glam::Vec3::new(1.0, 0.0, 2.0)
    );

    h.client.handle_input(key(KeyCode::KeyW, ElementState::Pressed));
    h.tick();
    let sent = h.server.take_sent();
    let intent = sent
        .iter()
        .find_map(|e| match &e.payload {
            Payload::MovementIntent(intent) => Some(intent.clone()),
            _ => None,
        })
        .expect("movement intent");
    assert!(!intent.stop_movement);
    assert!(intent.target_position.z > 2.0);

    h.client.handle_input(key(KeyCode::KeyW, ElementState::Released));
    h.tick();
    let sent = h.server.take_sent();
    assert!(sent.iter().any(|e| matches!(
        &e.payload,
        Payload::MovementIntent(intent) if intent.stop_movement
    )));
}

#[test]
fn test_snapshot_removes_missing_entities() {
    let mut h = Harness::in_world();
    h.server.push(snapshot(
        1,
        vec![
            entity(1, EntityKind::Player, 0.0, 0.0),
            entity(2, EntityKind::Npc, 1.0, 0.0),
            entity(3, EntityKind::Mob, 2.0, 0.0),
        ],
    ));
    h.tick();
    h.client.drain_replication_events().for_each(drop);

    h.server.push(snapshot(
        1,
        vec![
            entity(1, EntityKind::Player, 0.0, 0.0),
            entity(3, EntityKind::Mob, 2.0, 0.0),
        ],
    ));
    h.tick();
    assert!(h.client.store().get(2).is_none());
    assert!(h.client.store().get(1).is_some());
    assert!(h.client.store().get(3).is_some());
    let events: Vec<ReplicationEvent> = h.client.drain_replication_events().collect();
    assert!(events.contains(&ReplicationEvent::Despawned(2)));
}

#[test]
fn test_large_drift_is_corrected_toward_server() {
    let mut h = Harness::in_world();
    h.server
        .push(snapshot(7, vec![entity(7, EntityKind::Player, 0.0, 0.0)]));
    h.tick();

    h.server
        .push(snapshot(7, vec![entity(7, EntityKind::Player, 10.0, 0.0)]));
    h.tick();
    let x = h.client.predictor().position().x;
    assert!(x > 0.0 && x < 10.0, "blended toward server, got {x}");
}

#[test]
fn test_connection_watchdog_fires() {
    let mut h = Harness::new();
    h.server.set_auto_accept(false);
    h.client.submit_login("alice", "pw1", h.now).unwrap();
    h.tick();
    assert_eq!(
        h.client.session().state(),
        ConnectionState::Connecting
    );

    h.advance(Duration::from_secs(11));
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert_eq!(h.client.ui().error_message(), Some("Connection timed out"));
    assert_eq!(
        h.client.session().state(),
        ConnectionState::Disconnected
    );
    assert!(!h.server.accept());

    let timeouts: Vec<WatchdogKind> = h
        .client
        .drain_ui_events()
        .filter_map(|e| match e {
            UiEvent::TimedOut(kind) => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(timeouts, vec![WatchdogKind::Connection]);

    // Nothing else fires later.
    h.advance(Duration::from_secs(60));
    assert_eq!(h.client.ui().error_message(), Some("Connection timed out"));
}

#[test]
fn test_auth_watchdog_fires_without_response() {
    let mut h = Harness::new();
    h.client.submit_login("alice", "pw1", h.now).unwrap();
    h.tick();
    h.advance(Duration::from_secs(11));
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert_eq!(
        h.client.ui().error_message(),
        Some("Authentication timed out")
    );

    // A late response after the timeout is ignored.
    h.auth_response(true, "ok");
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::Login);
}

#[test]
fn test_connect_failure_reports_immediately() {
    let mut h = Harness::new();
    h.server.fail_next_open();
    assert!(h.client.submit_login("alice", "pw1", h.now).is_err());
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert!(
        h.client
            .ui()
            .error_message()
            .is_some_and(|m| m.contains("Unable to connect"))
    );
    assert!(!h.client.ui().watchdogs().any_armed());
}

#[test]
fn test_refused_connection_returns_to_login() {
    let mut h = Harness::new();
    h.server.refuse_next();
    h.client.submit_login("alice", "pw1", h.now).unwrap();
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert_eq!(h.client.ui().error_message(), Some("connection refused"));
}

#[test]
fn test_handshake_rejected() {
    let mut h = Harness::new();
    h.client.submit_login("alice", "pw1", h.now).unwrap();
    h.tick();
    h.server.push(Payload::HandshakeResponse(HandshakeResponse {
        accepted: false,
        server_version: "9.0.0".to_string(),
        protocol_version: "9".to_string(),
        server_features: 0,
        message: "client too old".to_string(),
    }));
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert_eq!(h.client.ui().error_message(), Some("client too old"));
    assert!(!h.client.session().is_connected());
}

#[test]
fn test_server_disconnect_in_world() {
    let mut h = Harness::in_world();
    h.server
        .push(snapshot(7, vec![entity(7, EntityKind::Player, 0.0, 0.0)]));
    h.tick();
    assert_eq!(h.client.store().len(), 1);

    h.server.push(Payload::Disconnect(Disconnect {
        reason: DisconnectReason::ServerShutdown,
        message: "maintenance".to_string(),
    }));
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert_eq!(
        h.client.ui().error_message(),
        Some("Disconnected: maintenance")
    );
    assert!(h.client.store().is_empty());
    assert!(h.client.ui().characters().is_empty());
}

#[test]
fn test_create_character_flow() {
    let mut h = Harness::logged_in(vec![]);
    h.client.open_character_create().unwrap();

    h.client
        .submit_create_character("Aria", "Warrior", h.now)
        .unwrap();
    h.server
        .push(Payload::CharacterCreateResponse(CharacterCreateResponse {
            success: false,
            character: None,
            error_message: Some("name taken".to_string()),
        }));
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::CharacterCreate);
    assert_eq!(h.client.ui().error_message(), Some("name taken"));

    h.client
        .submit_create_character("Aria2", "Warrior", h.now)
        .unwrap();
    h.server
        .push(Payload::CharacterCreateResponse(CharacterCreateResponse {
            success: true,
            character: Some(character(11, "Aria2")),
            error_message: None,
        }));
    h.tick();
    assert_eq!(
        h.sent_kinds(),
        vec![
            "CharacterCreateRequest",
            "CharacterCreateRequest",
            "CharacterListRequest"
        ]
    );
    h.character_list(vec![character(11, "Aria2")]);
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::CharacterSelect);
    assert_eq!(h.client.ui().characters()[0].name, "Aria2");
}

#[test]
fn test_loading_watchdog_fires_while_creating() {
    let mut h = Harness::logged_in(vec![]);
    h.client.open_character_create().unwrap();
    h.client
        .submit_create_character("Aria", "Warrior", h.now)
        .unwrap();
    h.tick();
    assert_eq!(
        h.client.ui().screen(),
        Screen::Loading(LoadingPurpose::CreatingCharacter)
    );

    h.advance(Duration::from_secs(31));
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert_eq!(
        h.client.ui().error_message(),
        Some("Loading took too long")
    );
    assert_eq!(
        h.client.session().state(),
        ConnectionState::Disconnected
    );
    assert!(!h.server.is_open());

    let timeouts: Vec<WatchdogKind> = h
        .client
        .drain_ui_events()
        .filter_map(|e| match e {
            UiEvent::TimedOut(kind) => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(timeouts, vec![WatchdogKind::Loading]);
}

#[test]
fn test_repeat_create_submit_is_refused() {
    let mut h = Harness::logged_in(vec![]);
    h.client.open_character_create().unwrap();
    h.client
        .submit_create_character("Aria", "Warrior", h.now)
        .unwrap();

    let repeat = h.client.submit_create_character("Aria", "Warrior", h.now);
    assert!(matches!(repeat, Err(ClientError::AlreadyPending(_))));
    assert_eq!(h.sent_kinds(), vec!["CharacterCreateRequest"]);
    assert_eq!(
        h.client.ui().screen(),
        Screen::Loading(LoadingPurpose::CreatingCharacter)
    );
}

#[test]
fn test_repeat_login_while_connecting_keeps_connection() {
    let mut h = Harness::new();
    h.server.set_auto_accept(false);
    h.client.submit_login("alice", "pw1", h.now).unwrap();
    h.tick();

    let repeat = h.client.submit_login("alice", "pw1", h.now);
    assert!(matches!(repeat, Err(ClientError::AlreadyPending(_))));
    assert_eq!(h.server.addresses().len(), 1);
    assert_eq!(h.server.close_count(), 0);
    assert_eq!(
        h.client.session().state(),
        ConnectionState::Connecting
    );

    // The first attempt still completes.
    assert!(h.server.accept());
    h.tick();
    assert_eq!(h.sent_kinds(), vec!["HandshakeRequest", "AuthRequest"]);
}

#[test]
fn test_cancel_create_keeps_list() {
    let mut h = Harness::logged_in(vec![character(1, "A")]);
    h.client.open_character_create().unwrap();
    h.client.cancel_character_create().unwrap();
    assert_eq!(h.client.ui().screen(), Screen::CharacterSelect);
    assert_eq!(h.client.ui().characters().len(), 1);
}

#[test]
fn test_select_refused_returns_to_list() {
    let mut h = Harness::logged_in(vec![character(3, "Bo")]);
    h.client.submit_select_character(3, h.now).unwrap();
    h.server
        .push(Payload::CharacterSelectResponse(CharacterSelectResponse {
            character: None,
            error_message: Some("Character not found".to_string()),
        }));
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::CharacterSelect);
    assert_eq!(h.client.ui().error_message(), Some("Character not found"));
}

#[test]
fn test_server_error_while_loading_falls_back() {
    let mut h = Harness::logged_in(vec![character(3, "Bo")]);
    h.client.submit_select_character(3, h.now).unwrap();
    h.server.push(Payload::Error(ErrorMessage {
        message: "zone offline".to_string(),
    }));
    h.tick();
    assert_eq!(h.client.ui().screen(), Screen::CharacterSelect);
    assert_eq!(h.client.ui().error_message(), Some("zone offline"));
}

#[test]
fn test_register_sends_character_name() {
    let mut h = Harness::new();
    h.client.open_register().unwrap();
    h.client
        .submit_register("carol", "pw", Some("Cara"), h.now)
        .unwrap();
    h.tick();
    let sent = h.server.take_sent();
    match &sent[1].payload {
        Payload::AuthRequest(request) => {
            assert_eq!(request.username, "carol");
            assert_eq!(request.character_name.as_deref(), Some("Cara"));
        }
        other => panic!("expected AuthRequest, got {other:?}"),
    }
    assert_eq!(h.client.ui().username(), "carol");
}

#[test]
fn test_illegal_action_is_refused() {
    let mut h = Harness::new();
    assert!(h.client.open_character_create().is_err());
    assert!(h.client.submit_select_character(1, h.now).is_err());
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert!(h.server.addresses().is_empty());
}

#[test]
fn test_logout_closes_quietly() {
    let mut h = Harness::in_world();
    h.client.logout();
    assert_eq!(h.client.ui().screen(), Screen::Login);
    assert_eq!(h.client.ui().error_message(), None);
    assert!(!h.server.is_open());

    h.tick();
    assert_eq!(h.client.ui().error_message(), None);
}

#[test]
fn test_mouse_look_turns_facing() {
    let mut h = Harness::new();
    h.client.handle_input(RawInput::Capture(true));
    h.client.handle_input(RawInput::Motion { dx: 100.0, dy: 0.0 });
    h.tick();
    assert!(h.client.facing() != 0.0);
}
