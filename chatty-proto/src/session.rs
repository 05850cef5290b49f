//! Client-side session state and request framing.
//!
//! The server keeps no per-connection state besides its routing index, so a
//! client echoes who it is and which chat it has open on every request. This
//! module owns that contract: [`ClientSession::frame`] turns what a user typed
//! into the exact line the server expects.

use crate::chat::ChatKind;
use crate::command::CommandKind;

/// Placeholder sent as the related name when no chat is open.
pub const NO_CHAT: &str = "none";

/// What a connected client remembers between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSession {
    username: Option<String>,
    chat: Option<(ChatKind, String)>,
}

impl ClientSession {
    /// A fresh, logged-out session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful login.
    pub fn log_in(&mut self, username: impl Into<String>) {
        self.username = Some(username.into());
    }

    /// Forgets the user and any open chat.
    pub fn log_out(&mut self) {
        self.username = None;
        self.chat = None;
    }

    /// Records that a personal chat or group is now open.
    pub fn enter_chat(&mut self, kind: ChatKind, related: impl Into<String>) {
        self.chat = match kind {
            ChatKind::NotInChat => None,
            kind => Some((kind, related.into())),
        };
    }

    /// Records that the open chat was closed.
    pub fn leave_chat(&mut self) {
        self.chat = None;
    }

    /// Logged-in username.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Kind of the chat currently open.
    #[must_use]
    pub fn chat_kind(&self) -> ChatKind {
        self.chat.as_ref().map_or(ChatKind::NotInChat, |(kind, _)| *kind)
    }

    /// Friend username or group name of the open chat.
    #[must_use]
    pub fn related(&self) -> Option<&str> {
        self.chat.as_ref().map(|(_, name)| name.as_str())
    }

    /// Appends the protocol fields the server needs to a typed line.
    ///
    /// `send` and `close-chat` get `<username> <related> <kind>`; any other
    /// command gets `<username>` when logged in. Logged-out input is sent
    /// verbatim.
    #[must_use]
    pub fn frame(&self, input: &str) -> String {
        let Some(username) = self.username.as_deref() else {
            return input.to_string();
        };

        let name = input.split(' ').next().unwrap_or_default();
        match CommandKind::of(name) {
            CommandKind::SendMessage | CommandKind::CloseChat => format!(
                "{input} {username} {} {}",
                self.related().unwrap_or(NO_CHAT),
                self.chat_kind()
            ),
            _ => format!("{input} {username}"),
        }
    }
}
