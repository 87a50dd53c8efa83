//! Screens and the legal transitions between them.

/// Why the client is showing the loading screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingPurpose {
    /// Waiting for connection, authentication and the character list.
    Authenticating,
    /// Waiting for a character-create response.
    CreatingCharacter,
    /// Waiting for a character-select response.
    SelectingCharacter,
}

/// One client screen. Exactly one is shown at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Credentials entry.
    Login,
    /// Account registration.
    Register,
    /// Character list.
    CharacterSelect,
    /// New character form.
    CharacterCreate,
    /// Waiting on the server.
    Loading(LoadingPurpose),
    /// In the world.
    Connected,
}

impl Screen {
    /// Whether this is any loading screen.
    pub fn is_loading(self) -> bool {
        matches!(self, Screen::Loading(_))
    }
}

/// Returns `true` if the flow may move from `from` to `to`.
///
/// Staying on the same screen is not a transition and returns `false`.
pub fn is_legal_transition(from: Screen, to: Screen) -> bool {
    use LoadingPurpose::*;
    use Screen::*;

    matches!(
        (from, to),
        (Login, Register)
            | (Register, Login)
            | (Login | Register, Loading(Authenticating))
            | (Loading(_), Login)
            | (Loading(Authenticating), CharacterSelect)
            | (CharacterSelect, CharacterCreate)
            | (CharacterCreate, CharacterSelect)
            | (CharacterCreate, Loading(CreatingCharacter))
            | (Loading(CreatingCharacter), CharacterSelect | CharacterCreate)
            | (CharacterSelect, Loading(SelectingCharacter))
            | (Loading(SelectingCharacter), Connected | CharacterSelect)
    )
}
