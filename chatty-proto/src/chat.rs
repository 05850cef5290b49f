//! Conversation identity types.
//!
//! A conversation is either a personal chat between two users or a named
//! group. Personal chats are keyed by an unordered pair: [`PersonalKey`]
//! stores the two usernames in canonical (lexicographic) order so that
//! `(alice, bob)` and `(bob, alice)` are the same key.

use std::fmt;
use std::str::FromStr;

/// The chat-kind tag clients append to `send` and `close-chat` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    /// Personal chat with a friend (`1`).
    Personal,
    /// Group chat (`2`).
    Group,
    /// Not currently in a chat (`3`).
    NotInChat,
}

impl ChatKind {
    /// The numeric wire tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Personal => 1,
            Self::Group => 2,
            Self::NotInChat => 3,
        }
    }
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Error for an unrecognized chat-kind tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid chat kind tag: {0:?}")]
pub struct InvalidChatKind(pub String);

impl FromStr for ChatKind {
    type Err = InvalidChatKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Self::Personal),
            "2" => Ok(Self::Group),
            "3" => Ok(Self::NotInChat),
            other => Err(InvalidChatKind(other.to_string())),
        }
    }
}

/// Unordered pair of usernames identifying a personal chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersonalKey {
    low: String,
    high: String,
}

impl PersonalKey {
    /// Creates the key for the pair, regardless of argument order.
    #[must_use]
    pub fn new(left: &str, right: &str) -> Self {
        let (low, high) = if left <= right {
            (left, right)
        } else {
            (right, left)
        };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    /// Both usernames, smallest first.
    #[must_use]
    pub fn users(&self) -> (&str, &str) {
        (&self.low, &self.high)
    }

    /// Whether `username` is one of the two participants.
    #[must_use]
    pub fn contains(&self, username: &str) -> bool {
        self.low == username || self.high == username
    }
}

impl fmt::Display for PersonalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}

/// Identity of a conversation that connections can have open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Conversation {
    /// A personal chat between two users.
    Personal(PersonalKey),
    /// A group chat, matched by exact (case-sensitive) name.
    Group(String),
}

impl Conversation {
    /// Personal conversation between two users, in either order.
    #[must_use]
    pub fn personal(left: &str, right: &str) -> Self {
        Self::Personal(PersonalKey::new(left, right))
    }

    /// Group conversation by name.
    #[must_use]
    pub fn group(name: &str) -> Self {
        Self::Group(name.to_string())
    }

    /// Resolves the conversation from the protocol-appended trailing fields
    /// `<actor> <related> <kind>`.
    ///
    /// For a personal chat the key is `{actor, related}`; for a group the
    /// related field is the group name. Returns `None` when the tag is not a
    /// chat (`3`), is not a valid tag, or fewer than three fields exist.
    #[must_use]
    pub fn from_trailing(fields: &[String]) -> Option<Self> {
        let [.., actor, related, kind] = fields else {
            return None;
        };
        match kind.parse::<ChatKind>().ok()? {
            ChatKind::Personal => Some(Self::personal(actor, related)),
            ChatKind::Group => Some(Self::group(related)),
            ChatKind::NotInChat => None,
        }
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Personal(key) => write!(f, "personal:{key}"),
            Self::Group(name) => write!(f, "group:{name}"),
        }
    }
}
