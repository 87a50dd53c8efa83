//! The client context: one object owning every component of a game session.
//!
//! [`ClientContext`] is built once from the [`Config`] and a transport. The
//! host feeds it raw input and user actions, calls [`ClientContext::tick`]
//! once per fixed step, and reads the UI screen, the entity table and the
//! predicted pose back out. All cross-component wiring lives here: session
//! events drive the UI flow, snapshots feed the entity store and reconcile
//! the predictor, and predictor intents go out through the session.

use std::time::Instant;

use glam::Vec3;
use openmmo_config::Config;
use openmmo_input::{InputEvent, InputTranslator, RawInput};
use openmmo_multiplayer::{
    EntityReplicationStore, MovementPredictor, ReconcileOutcome, ReplicationEvent,
};
use openmmo_net::{
    AuthRequest, CharacterCreateRequest, CharacterInfo, CharacterListRequest,
    CharacterSelectRequest, ConnectionSession, Payload, SessionError, SessionEvent, Transport,
    WorldSnapshot,
};
use openmmo_ui::{LoadingPurpose, Screen, TransitionError, UiEvent, UiFlowController, WatchdogKind};

use crate::settings;

/// Yaw change per unit of scaled mouse motion, radians.
pub const LOOK_RADIANS_PER_UNIT: f32 = 0.0025;

/// Failures of user-initiated actions.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The action is not available on the current screen.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The session refused the request.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The same request is already waiting for the server.
    #[error("a request is already pending on {0:?}")]
    AlreadyPending(Screen),
}

/// Every client component, wired together.
pub struct ClientContext<T: Transport> {
    session: ConnectionSession<T>,
    store: EntityReplicationStore,
    predictor: MovementPredictor,
    ui: UiFlowController,
    input: InputTranslator,
    server_address: String,
    pending_auth: Option<AuthRequest>,
    selected_character: Option<CharacterInfo>,
    awaiting_first_snapshot: bool,
    last_authoritative: Option<(Vec3, Instant)>,
    facing_yaw: f32,
}

impl<T: Transport> ClientContext<T> {
    /// Builds the context. Nothing connects until a login is submitted.
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            session: ConnectionSession::new(transport, settings::session_config(config)),
            store: EntityReplicationStore::default(),
            predictor: MovementPredictor::new(settings::predictor_config(config)),
            ui: UiFlowController::new(settings::watchdog_config(config)),
            input: settings::input_translator(config),
            server_address: config.server_endpoint(),
            pending_auth: None,
            selected_character: None,
            awaiting_first_snapshot: false,
            last_authoritative: None,
            facing_yaw: 0.0,
        }
    }

    // -----------------------------------------------------------------------
    // User actions
    // -----------------------------------------------------------------------

    /// Submits the Login screen.
    pub fn submit_login(
        &mut self,
        username: &str,
        password_hash: &str,
        now: Instant,
    ) -> Result<(), ClientError> {
        self.submit_auth(
            AuthRequest {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                character_name: None,
            },
            now,
        )
    }

    /// Submits the Register screen. The server creates the account.
    pub fn submit_register(
        &mut self,
        username: &str,
        password_hash: &str,
        character_name: Option<&str>,
        now: Instant,
    ) -> Result<(), ClientError> {
        self.submit_auth(
            AuthRequest {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                character_name: character_name.map(str::to_string),
            },
            now,
        )
    }

    fn submit_auth(&mut self, request: AuthRequest, now: Instant) -> Result<(), ClientError> {
        self.enter_loading(LoadingPurpose::Authenticating)?;
        self.ui.set_username(request.username.clone());
        self.ui.arm_watchdog(WatchdogKind::Loading, now);

        if self.session.is_connected() {
            self.send_auth(request, now)?;
            return Ok(());
        }

        self.pending_auth = Some(request);
        self.ui.arm_watchdog(WatchdogKind::Connection, now);
        if let Err(e) = self.session.connect(&self.server_address) {
            self.pending_auth = None;
            self.ui.reset_to_login(Some(format!("Unable to connect: {e}")));
            return Err(e.into());
        }
        Ok(())
    }

    /// Shows the loading screen, refusing a repeat submit while one is shown.
    fn enter_loading(&mut self, purpose: LoadingPurpose) -> Result<(), ClientError> {
        if self.ui.go_to_loading(purpose)? {
            Ok(())
        } else {
            Err(ClientError::AlreadyPending(self.ui.screen()))
        }
    }

    fn send_auth(&mut self, request: AuthRequest, now: Instant) -> Result<u64, SessionError> {
        tracing::info!("Authenticating as {}", request.username);
        let sequence = self.session.send(Payload::AuthRequest(request))?;
        self.ui.arm_watchdog(WatchdogKind::Auth, now);
        Ok(sequence)
    }

    /// Login ⇄ Register toggle.
    pub fn open_register(&mut self) -> Result<(), ClientError> {
        self.ui.go_to_register()?;
        Ok(())
    }

    /// Register → Login.
    pub fn back_to_login(&mut self) -> Result<(), ClientError> {
        self.ui.go_to_login(None)?;
        Ok(())
    }

    /// CharacterSelect → CharacterCreate.
    pub fn open_character_create(&mut self) -> Result<(), ClientError> {
        self.ui.go_to_character_create(None)?;
        Ok(())
    }

    /// CharacterCreate → CharacterSelect without creating anything.
    pub fn cancel_character_create(&mut self) -> Result<(), ClientError> {
        self.ui.go_to_character_select(None, None)?;
        Ok(())
    }

    /// Highlights a listed character.
    pub fn highlight_character(&mut self, id: u64) -> bool {
        self.ui.highlight_character(id)
    }

    /// Submits the CharacterCreate form.
    pub fn submit_create_character(
        &mut self,
        name: &str,
        class: &str,
        now: Instant,
    ) -> Result<(), ClientError> {
        self.enter_loading(LoadingPurpose::CreatingCharacter)?;
        self.ui.arm_watchdog(WatchdogKind::Loading, now);
        self.session
            .send(Payload::CharacterCreateRequest(CharacterCreateRequest {
                name: name.to_string(),
                class: class.to_string(),
            }))?;
        Ok(())
    }

    /// Enters the world with character `id`.
    pub fn submit_select_character(&mut self, id: u64, now: Instant) -> Result<(), ClientError> {
        self.enter_loading(LoadingPurpose::SelectingCharacter)?;
        self.ui.arm_watchdog(WatchdogKind::Loading, now);
        self.session
            .send(Payload::CharacterSelectRequest(CharacterSelectRequest {
                character_id: id,
            }))?;
        Ok(())
    }

    /// Leaves the game and returns to Login.
    pub fn logout(&mut self) {
        self.abort_session();
        self.ui.reset_to_login(None);
    }

    /// Feeds one raw input event.
    pub fn handle_input(&mut self, input: RawInput) {
        self.input.process(input);
    }

    /// Sets the camera yaw used for movement, radians.
    pub fn set_facing(&mut self, yaw: f32) {
        self.facing_yaw = yaw;
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advances every component by one step of `dt` seconds.
    pub fn tick(&mut self, dt: f32, now: Instant) {
        self.session.poll_at(now);
        let events: Vec<SessionEvent> = self.session.drain_events().collect();
        for event in events {
            self.on_session_event(event, now);
        }

        if let Some(kind) = self.ui.check_timeouts(now) {
            tracing::warn!("{kind:?} timed out, dropping connection");
            self.abort_session();
        }

        let inputs: Vec<InputEvent> = self.input.drain_events().collect();
        for event in inputs {
            match event {
                InputEvent::Look(delta) => self.facing_yaw += delta.x * LOOK_RADIANS_PER_UNIT,
                InputEvent::Action(action) => tracing::debug!(?action, "Action"),
                InputEvent::MovementChanged(_) | InputEvent::JumpChanged(_) => {}
            }
        }

        if self.ui.screen() == Screen::Connected
            && self.session.is_connected()
            && !self.awaiting_first_snapshot
            && let Some(intent) =
                self.predictor
                    .update(self.input.movement(), self.facing_yaw, dt, now)
        {
            let _ = self.session.send(Payload::MovementIntent(intent));
        }
    }

    fn on_session_event(&mut self, event: SessionEvent, now: Instant) {
        match event {
            SessionEvent::Connected => {
                self.ui.cancel_watchdog(WatchdogKind::Connection);
                if let Some(request) = self.pending_auth.take() {
                    let _ = self.send_auth(request, now);
                }
            }
            SessionEvent::HandshakeAccepted { server_version, .. } => {
                tracing::debug!("Server version {server_version}");
            }
            SessionEvent::HandshakeRejected { message } => {
                self.reset_session_state();
                self.ui.reset_to_login(Some(message));
            }
            SessionEvent::AuthResult {
                success, message, ..
            } => {
                self.ui.cancel_watchdog(WatchdogKind::Auth);
                if self.ui.screen() != Screen::Loading(LoadingPurpose::Authenticating) {
                    tracing::warn!("Ignoring authentication result on {:?}", self.ui.screen());
                } else if success {
                    tracing::info!("Authenticated: {message}");
                    let _ = self
                        .session
                        .send(Payload::CharacterListRequest(CharacterListRequest {}));
                } else {
                    tracing::info!("Authentication failed: {message}");
                    let _ = self.ui.go_to_login(Some(message));
                }
            }
            SessionEvent::CharacterList(characters) => match self.ui.screen() {
                Screen::Loading(LoadingPurpose::Authenticating)
                | Screen::Loading(LoadingPurpose::CreatingCharacter)
                | Screen::CharacterSelect => {
                    let _ = self.ui.go_to_character_select(Some(characters), None);
                }
                other => tracing::warn!("Ignoring character list on {other:?}"),
            },
            SessionEvent::CharacterCreated {
                success,
                character,
                error,
            } => {
                if self.ui.screen() != Screen::Loading(LoadingPurpose::CreatingCharacter) {
                    tracing::warn!("Ignoring character creation result on {:?}", self.ui.screen());
                } else if success {
                    if let Some(character) = character {
                        tracing::info!("Created character {}", character.name);
                    }
                    let _ = self
                        .session
                        .send(Payload::CharacterListRequest(CharacterListRequest {}));
                } else {
                    let message = error.unwrap_or_else(|| "Character creation failed".to_string());
                    let _ = self.ui.go_to_character_create(Some(message));
                }
            }
            SessionEvent::CharacterSelected { character, error } => {
                if self.ui.screen() != Screen::Loading(LoadingPurpose::SelectingCharacter) {
                    tracing::warn!("Ignoring character selection on {:?}", self.ui.screen());
                    return;
                }
                match character {
                    Some(character) => {
                        tracing::info!("Entering world as {}", character.name);
                        self.selected_character = Some(character);
                        self.awaiting_first_snapshot = true;
                        let _ = self.ui.go_to_connected();
                    }
                    None => {
                        let message =
                            error.unwrap_or_else(|| "Character selection failed".to_string());
                        let _ = self.ui.go_to_character_select(None, Some(message));
                    }
                }
            }
            SessionEvent::WorldSnapshot(snapshot) => self.on_snapshot(&snapshot, now),
            SessionEvent::Pong { rtt_ms } => tracing::trace!(rtt_ms, "Pong"),
            SessionEvent::ServerError(message) => match self.ui.screen() {
                Screen::Loading(LoadingPurpose::Authenticating) => {
                    let _ = self.ui.go_to_login(Some(message));
                }
                Screen::Loading(LoadingPurpose::CreatingCharacter) => {
                    let _ = self.ui.go_to_character_create(Some(message));
                }
                Screen::Loading(LoadingPurpose::SelectingCharacter) => {
                    let _ = self.ui.go_to_character_select(None, Some(message));
                }
                _ => {}
            },
            SessionEvent::Disconnected { reason } => {
                self.reset_session_state();
                self.ui.reset_to_login(Some(format!("Disconnected: {reason}")));
            }
            SessionEvent::Error(message) => {
                self.abort_session();
                self.ui.reset_to_login(Some(message));
            }
        }
    }

    fn on_snapshot(&mut self, snapshot: &WorldSnapshot, now: Instant) {
        if self.ui.screen() != Screen::Connected {
            tracing::debug!("Ignoring snapshot on {:?}", self.ui.screen());
            return;
        }
        self.store.apply_snapshot(snapshot);
        let Some(local) = self.store.get_local_player() else {
            return;
        };
        let (position, yaw) = (local.position, local.rotation.y);

        if self.awaiting_first_snapshot {
            self.awaiting_first_snapshot = false;
            self.facing_yaw = yaw;
            self.predictor.reset(position, yaw);
        } else {
            let velocity = match self.last_authoritative {
                Some((previous, at)) => {
                    let elapsed = now.saturating_duration_since(at).as_secs_f32();
                    if elapsed > 0.0 {
                        (position - previous) / elapsed
                    } else {
                        Vec3::ZERO
                    }
                }
                None => Vec3::ZERO,
            };
            let outcome = self.predictor.reconcile(position, velocity);
            if let ReconcileOutcome::Snapped { drift } | ReconcileOutcome::Blended { drift, .. } =
                outcome
            {
                tracing::debug!(drift, "Corrected local prediction");
            }
        }
        self.last_authoritative = Some((position, now));
    }

    /// Closes the session without reporting the close to the UI.
    fn abort_session(&mut self) {
        self.session.close();
        self.session.drain_events().for_each(drop);
        self.reset_session_state();
    }

    fn reset_session_state(&mut self) {
        self.pending_auth = None;
        self.selected_character = None;
        self.awaiting_first_snapshot = false;
        self.last_authoritative = None;
        self.store.clear();
        self.input.reset();
    }

    // -----------------------------------------------------------------------
    // Read access for the presentation layer
    // -----------------------------------------------------------------------

    /// Connection session.
    pub fn session(&self) -> &ConnectionSession<T> {
        &self.session
    }

    /// Screen flow.
    pub fn ui(&self) -> &UiFlowController {
        &self.ui
    }

    /// Replicated entities.
    pub fn store(&self) -> &EntityReplicationStore {
        &self.store
    }

    /// Local prediction.
    pub fn predictor(&self) -> &MovementPredictor {
        &self.predictor
    }

    /// Input state.
    pub fn input(&self) -> &InputTranslator {
        &self.input
    }

    /// Character chosen on the select screen.
    pub fn selected_character(&self) -> Option<&CharacterInfo> {
        self.selected_character.as_ref()
    }

    /// Camera yaw used for movement.
    pub fn facing(&self) -> f32 {
        self.facing_yaw
    }

    /// Drains UI events raised since the last call.
    pub fn drain_ui_events(&mut self) -> impl Iterator<Item = UiEvent> + '_ {
        self.ui.drain_events()
    }

    /// Drains entity table changes raised since the last call.
    pub fn drain_replication_events(&mut self) -> impl Iterator<Item = ReplicationEvent> + '_ {
        self.store.drain_events()
    }
}
