//! Command line parsing for the Chatty text protocol.
//!
//! A request is one line of space-delimited text: `<name> <arg1> <arg2> ...`.
//! The `send` command carries its free-text message as a single `"..."`
//! quoted span, which may contain spaces. The parser lifts that span out
//! before tokenizing the rest and always places it at argument position 0,
//! so positional contracts downstream hold no matter where the quotes were.

use std::fmt;

/// Errors produced while turning a raw line into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The line could not be tokenized (bad quoting on `send`).
    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

/// Every command the server understands, plus an `Unknown` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Register,
    Login,
    Logout,
    AddFriend,
    RemoveFriend,
    CheckRequests,
    AcceptRequest,
    DeclineRequest,
    ListFriends,
    Block,
    Unblock,
    ListBlocked,
    OpenChat,
    CloseChat,
    SendMessage,
    CreateGroup,
    DeleteGroup,
    AddToGroup,
    RemoveFromGroup,
    LeaveGroup,
    OpenGroup,
    ListGroups,
    CheckInbox,
    Help,
    Unknown,
}

impl CommandKind {
    /// All known kinds, `Unknown` last.
    pub const ALL: [Self; 25] = [
        Self::Register,
        Self::Login,
        Self::Logout,
        Self::AddFriend,
        Self::RemoveFriend,
        Self::CheckRequests,
        Self::AcceptRequest,
        Self::DeclineRequest,
        Self::ListFriends,
        Self::Block,
        Self::Unblock,
        Self::ListBlocked,
        Self::OpenChat,
        Self::CloseChat,
        Self::SendMessage,
        Self::CreateGroup,
        Self::DeleteGroup,
        Self::AddToGroup,
        Self::RemoveFromGroup,
        Self::LeaveGroup,
        Self::OpenGroup,
        Self::ListGroups,
        Self::CheckInbox,
        Self::Help,
        Self::Unknown,
    ];

    /// The command name as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::AddFriend => "add-friend",
            Self::RemoveFriend => "remove-friend",
            Self::CheckRequests => "check-requests",
            Self::AcceptRequest => "accept",
            Self::DeclineRequest => "decline",
            Self::ListFriends => "list-friends",
            Self::Block => "block",
            Self::Unblock => "unblock",
            Self::ListBlocked => "list-blocked",
            Self::OpenChat => "open-chat",
            Self::CloseChat => "close-chat",
            Self::SendMessage => "send",
            Self::CreateGroup => "create-group",
            Self::DeleteGroup => "delete-group",
            Self::AddToGroup => "add-to-group",
            Self::RemoveFromGroup => "remove-from-group",
            Self::LeaveGroup => "leave",
            Self::OpenGroup => "open-group",
            Self::ListGroups => "list-groups",
            Self::CheckInbox => "check-inbox",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }

    /// Resolves a wire name to its kind. Unrecognized names map to
    /// [`CommandKind::Unknown`] rather than failing.
    #[must_use]
    pub fn of(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<String>,
}

impl Command {
    /// Parses one request line.
    ///
    /// A trailing line ending is ignored. For `send`, exactly one quoted span
    /// must be present, starting and ending on token boundaries; its contents
    /// become the first argument.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedCommand`] when a `send` line does not
    /// contain exactly one well-formed quoted span.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let first = line.split(' ').next().unwrap_or_default();

        let mut tokens = if CommandKind::of(first) == CommandKind::SendMessage {
            split_send(line)?
        } else {
            split_tokens(line)
        };

        let name = if tokens.is_empty() {
            String::new()
        } else {
            tokens.remove(0)
        };

        Ok(Self { name, args: tokens })
    }

    /// The raw command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved command kind.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        CommandKind::of(&self.name)
    }

    /// Positional arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Argument at `index`, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Splits on single spaces, dropping trailing empty tokens.
fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text.split(' ').map(str::to_string).collect();
    while tokens.last().is_some_and(String::is_empty) {
        tokens.pop();
    }
    tokens
}

/// Tokenizes a `send` line: the quoted message goes right after the name.
fn split_send(line: &str) -> Result<Vec<String>, ParseError> {
    let quotes: Vec<usize> = line.match_indices('"').map(|(i, _)| i).collect();
    let [open, close] = quotes[..] else {
        return Err(ParseError::MalformedCommand(format!(
            "expected one quoted message, found {} quote characters",
            quotes.len()
        )));
    };

    let before = &line[..open];
    let after = &line[close + 1..];

    if !before.ends_with(' ') {
        return Err(ParseError::MalformedCommand(
            "quoted message must start a new argument".to_string(),
        ));
    }
    if !(after.is_empty() || after.starts_with(' ')) {
        return Err(ParseError::MalformedCommand(
            "quoted message must end an argument".to_string(),
        ));
    }

    let message = line[open + 1..close].to_string();
    let remainder = format!("{}{after}", before.trim_end_matches(' '));

    let mut tokens = split_tokens(&remainder);
    tokens.insert(1.min(tokens.len()), message);
    Ok(tokens)
}
