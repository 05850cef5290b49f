//! Response payload types for the Chatty protocol.
//!
//! These are the JSON bodies the server returns for queries such as
//! `login`, `list-friends`, `open-chat` and `check-inbox`. Field names are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    /// First and last name joined by a space.
    pub full_name: String,
    /// Unique login name.
    pub username: String,
}

impl UserDto {
    /// Creates a user view.
    #[must_use]
    pub fn new(full_name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            username: username.into(),
        }
    }
}

/// One message in a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Username of the author.
    pub sender: String,
    /// Message text.
    pub text: String,
}

impl ChatMessage {
    /// Creates a transcript entry.
    #[must_use]
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.sender, self.text)
    }
}

/// Category of a pending notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// A personal message arrived while the user was not viewing the chat.
    PersonalMessage,
    /// A group message arrived.
    GroupMessage,
    /// Someone sent a friend request.
    FriendRequest,
    /// Anything else (accepted requests, blocks, group membership changes).
    Other,
}

/// A notification waiting for its user to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Category.
    pub kind: NotificationKind,
    /// Human-readable text.
    pub content: String,
}

impl Notification {
    /// Creates a notification.
    #[must_use]
    pub fn new(kind: NotificationKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

/// Returned by a successful `login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDto {
    /// The logged-in user.
    pub user: UserDto,
    /// Notifications pending at login time.
    pub notifications: Vec<Notification>,
}

/// Returned by `open-chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalChatDto {
    /// Username of the other participant.
    pub friend: String,
    /// Transcript, oldest first.
    pub messages: Vec<ChatMessage>,
}

/// Returned by `open-group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChatDto {
    /// Group name.
    pub name: String,
    /// Member usernames, admin first.
    pub users: Vec<String>,
    /// Transcript, oldest first.
    pub messages: Vec<ChatMessage>,
}
