//! Command execution.
//!
//! Maps a parsed [`Command`] onto the injected services and produces the
//! one-line (or JSON) reply text. The executor never touches the network;
//! the server decides what to do with the [`Reply`] and its status.

use chatty_proto::chat::ChatKind;
use chatty_proto::codec;
use chatty_proto::command::{Command, CommandKind};
use chatty_proto::dto::ChatMessage;
use serde::Serialize;

use crate::service::{ServiceError, ServiceResult, Services};

/// Reply to any command whose arguments do not fit its shape.
pub const INCORRECT_FORMAT: &str = "Input is not in correct format";

/// Reply to a command name the server does not know.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// Reply to `close-chat`.
pub const CLOSED: &str = "closed";

/// Reply to `help`.
pub const HELP_TEXT: &str = "\
Available commands:
  register <first-name> <last-name> <username> <password>
  login <username> <password>
  logout
  add-friend <username>
  remove-friend <username>
  check-requests
  accept <username>
  decline <username>
  list-friends
  block <username>
  unblock <username>
  list-blocked
  open-chat <username>
  close-chat
  send \"<message>\"
  create-group <name>
  delete-group <name>
  add-to-group <username> <group>
  remove-from-group <username> <group>
  leave <group>
  open-group <group>
  list-groups
  check-inbox
  help";

/// Whether the command went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// The command was valid and the services accepted it.
    Accepted,
    /// Bad shape, unknown command, or a service refused it.
    Rejected,
}

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    text: String,
    status: ReplyStatus,
}

impl Reply {
    /// An accepted reply.
    #[must_use]
    pub fn accepted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: ReplyStatus::Accepted,
        }
    }

    /// A rejected reply.
    #[must_use]
    pub fn rejected(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: ReplyStatus::Rejected,
        }
    }

    /// The fixed reply for a badly shaped command.
    #[must_use]
    pub fn incorrect_format() -> Self {
        Self::rejected(INCORRECT_FORMAT)
    }

    /// The wire payload.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn status(&self) -> ReplyStatus {
        self.status
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == ReplyStatus::Accepted
    }
}

impl From<ServiceResult<String>> for Reply {
    fn from(result: ServiceResult<String>) -> Self {
        match result {
            Ok(text) => Self::accepted(text),
            Err(e) => Self::rejected(e.to_string()),
        }
    }
}

/// Turns commands into service calls.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    services: Services,
}

impl CommandExecutor {
    #[must_use]
    pub const fn new(services: Services) -> Self {
        Self { services }
    }

    /// Executes one command and returns its reply.
    ///
    /// Arguments are positional and include the fields the client appends
    /// (the acting username last, and for `send` the chat target and kind).
    #[must_use]
    pub fn execute(&self, command: &Command) -> Reply {
        let kind = command.kind();
        let reply = self.dispatch(kind, command.args());
        tracing::debug!(command = %kind, status = ?reply.status(), "command executed");
        reply
    }

    fn dispatch(&self, kind: CommandKind, args: &[String]) -> Reply {
        let s = &self.services;
        match (kind, args) {
            (CommandKind::Register, [first, last, username, password]) => s
                .users
                .register(first, last, username, password)
                .map(|()| "Successful registration".to_string())
                .into(),
            (CommandKind::Login, [username, password]) => self.login(username, password),
            (CommandKind::Logout, _) => Reply::accepted("Logged out"),
            (CommandKind::AddFriend, [target, me]) => match s.friendships.add_friend(me, target) {
                Ok(()) => Reply::accepted(format!("Friend request sent to {target}")),
                Err(ServiceError::NotFound(_)) => Reply::rejected("No such user exists"),
                Err(e) => Reply::rejected(e.to_string()),
            },
            (CommandKind::RemoveFriend, [target, me]) => s
                .friendships
                .remove_friend(me, target)
                .map(|()| "Friend removed successfully".to_string())
                .into(),
            (CommandKind::CheckRequests, [me]) => match s.friendships.requests_of(me) {
                Ok(requests) => json_or(&requests, "You have no requests at this moment"),
                Err(e) => Reply::rejected(e.to_string()),
            },
            (CommandKind::AcceptRequest, [target, me]) => s
                .friendships
                .accept_request(me, target)
                .map(|()| format!("You are now friends with {target}"))
                .into(),
            (CommandKind::DeclineRequest, [target, me]) => s
                .friendships
                .decline_request(me, target)
                .map(|()| "Request declined".to_string())
                .into(),
            (CommandKind::ListFriends, [me]) => match s.friendships.friends_of(me) {
                Ok(friends) => json_or(&friends, "You have no friends at this moment"),
                Err(e) => Reply::rejected(e.to_string()),
            },
            (CommandKind::Block, [target, me]) => s
                .blocks
                .block(me, target)
                .map(|()| format!("{target} blocked"))
                .into(),
            (CommandKind::Unblock, [target, me]) => s
                .blocks
                .unblock(me, target)
                .map(|()| format!("{target} unblocked"))
                .into(),
            (CommandKind::ListBlocked, [me]) => match s.blocks.blocked_by(me) {
                Ok(blocked) => json_or(&blocked, "You have not blocked anyone"),
                Err(e) => Reply::rejected(e.to_string()),
            },
            (CommandKind::OpenChat, [friend, me]) => match s.chats.personal_chat(me, friend) {
                Ok(chat) => json(&chat),
                Err(e) => Reply::rejected(e.to_string()),
            },
            (CommandKind::CloseChat, _) => Reply::accepted(CLOSED),
            (CommandKind::SendMessage, [text, me, target, tag]) => self.send(text, me, target, tag),
            (CommandKind::CreateGroup, [name, me]) => s
                .chats
                .create_group(name, me)
                .map(|()| format!("Group chat created with admin {me}"))
                .into(),
            (CommandKind::DeleteGroup, [name, me]) => s
                .chats
                .delete_group(name, me)
                .map(|()| "Group chat deleted".to_string())
                .into(),
            (CommandKind::AddToGroup, [user, group, me]) => s
                .chats
                .add_to_group(group, me, user)
                .map(|()| format!("{user} added to {group}"))
                .into(),
            (CommandKind::RemoveFromGroup, [user, group, me]) => s
                .chats
                .remove_from_group(group, me, user)
                .map(|()| format!("{user} kicked from {group}"))
                .into(),
            (CommandKind::LeaveGroup, [group, me]) => s
                .chats
                .leave_group(group, me)
                .map(|()| format!("You left {group}"))
                .into(),
            (CommandKind::OpenGroup, [group, me]) => match s.chats.group_chat(group, me) {
                Ok(chat) => json(&chat),
                Err(e) => Reply::rejected(e.to_string()),
            },
            (CommandKind::ListGroups, [me]) => match s.chats.groups_of(me) {
                Ok(groups) => json_or(&groups, "You are not in any group"),
                Err(e) => Reply::rejected(e.to_string()),
            },
            (CommandKind::CheckInbox, [me]) => {
                let inbox = s.notifications.notifications_of(me);
                let reply = json(&inbox);
                if reply.is_accepted() {
                    s.notifications.clear_notifications(me);
                }
                reply
            }
            (CommandKind::Help, _) => Reply::accepted(HELP_TEXT),
            (CommandKind::Unknown, _) => Reply::rejected(UNKNOWN_COMMAND),
            (
                CommandKind::Register
                | CommandKind::Login
                | CommandKind::AddFriend
                | CommandKind::RemoveFriend
                | CommandKind::CheckRequests
                | CommandKind::AcceptRequest
                | CommandKind::DeclineRequest
                | CommandKind::ListFriends
                | CommandKind::Block
                | CommandKind::Unblock
                | CommandKind::ListBlocked
                | CommandKind::OpenChat
                | CommandKind::SendMessage
                | CommandKind::CreateGroup
                | CommandKind::DeleteGroup
                | CommandKind::AddToGroup
                | CommandKind::RemoveFromGroup
                | CommandKind::LeaveGroup
                | CommandKind::OpenGroup
                | CommandKind::ListGroups
                | CommandKind::CheckInbox,
                _,
            ) => Reply::incorrect_format(),
        }
    }

    fn login(&self, username: &str, password: &str) -> Reply {
        match self.services.users.login(username, password) {
            Ok(session) => {
                let reply = json(&session);
                if reply.is_accepted() {
                    self.services.notifications.clear_notifications(username);
                }
                reply
            }
            Err(e) => Reply::rejected(e.to_string()),
        }
    }

    fn send(&self, text: &str, me: &str, target: &str, tag: &str) -> Reply {
        let chats = &self.services.chats;
        let result = match tag.parse::<ChatKind>() {
            Ok(ChatKind::Personal) => chats.send_personal(me, target, text),
            Ok(ChatKind::Group) => chats.send_group(target, me, text),
            Ok(ChatKind::NotInChat) | Err(_) => return Reply::incorrect_format(),
        };
        result
            .map(|()| ChatMessage::new(me, text).to_string())
            .into()
    }
}

fn json<T: Serialize + ?Sized>(value: &T) -> Reply {
    match codec::encode(value) {
        Ok(text) => Reply::accepted(text),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode reply");
            Reply::rejected(e.to_string())
        }
    }
}

fn json_or<T: Serialize>(items: &[T], empty: &str) -> Reply {
    if items.is_empty() {
        Reply::accepted(empty)
    } else {
        json(items)
    }
}
