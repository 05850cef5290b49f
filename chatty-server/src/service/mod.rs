//! Business services consumed by the command executor.
//!
//! The executor only sees these traits. [`Services`] bundles one
//! implementation of each so it can be injected at construction time;
//! [`Services::in_memory`] wires them all to a single [`MemoryBackend`].

mod memory;

use std::sync::Arc;

use chatty_proto::dto::{GroupChatDto, Notification, PersonalChatDto, SessionDto, UserDto};

pub use memory::MemoryBackend;

/// Domain errors raised by the services.
///
/// The `Display` text of each variant is what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// A referenced user, chat, group or request does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The actor is not allowed to perform the operation.
    #[error("{0}")]
    AccessDenied(String),
    /// The username is taken.
    #[error("{0}")]
    AlreadyExists(String),
    /// The two users are already friends.
    #[error("{0}")]
    FriendshipExists(String),
    /// A friend request between the two users is already pending.
    #[error("{0}")]
    RequestAlreadySent(String),
    /// One user has blocked the other.
    #[error("{0}")]
    Blocked(String),
    /// The user is already a member of the group.
    #[error("{0}")]
    AlreadyInGroup(String),
    /// An argument failed validation.
    #[error("{0}")]
    Invalid(String),
}

/// Shorthand result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Account registration and login.
pub trait UserService: Send + Sync {
    /// Creates an account.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Invalid`] for a bad username or weak password,
    /// [`ServiceError::AlreadyExists`] for a taken username.
    fn register(
        &self,
        first_name: &str,
        last_name: &str,
        username: &str,
        password: &str,
    ) -> ServiceResult<()>;

    /// Checks credentials and returns the session with pending notifications.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown user or wrong password.
    fn login(&self, username: &str, password: &str) -> ServiceResult<SessionDto>;
}

/// Friend requests and friendships.
pub trait FriendshipService: Send + Sync {
    /// Sends a friend request from `sender` to `target`.
    ///
    /// # Errors
    ///
    /// Fails if either user is missing, they are already friends, a request
    /// is pending in either direction, or either has blocked the other.
    fn add_friend(&self, sender: &str, target: &str) -> ServiceResult<()>;

    /// Ends a friendship.
    ///
    /// # Errors
    ///
    /// Fails if either user is missing or they are not friends.
    fn remove_friend(&self, remover: &str, target: &str) -> ServiceResult<()>;

    /// Users with a pending request to `username`.
    ///
    /// # Errors
    ///
    /// Fails if the user is missing.
    fn requests_of(&self, username: &str) -> ServiceResult<Vec<UserDto>>;

    /// Accepts the request `target` sent to `accepter`.
    ///
    /// # Errors
    ///
    /// Fails if either user is missing or no such request is pending.
    fn accept_request(&self, accepter: &str, target: &str) -> ServiceResult<()>;

    /// Declines the request `target` sent to `decliner`.
    ///
    /// # Errors
    ///
    /// Fails if either user is missing or no such request is pending.
    fn decline_request(&self, decliner: &str, target: &str) -> ServiceResult<()>;

    /// Friends of `username`.
    ///
    /// # Errors
    ///
    /// Fails if the user is missing.
    fn friends_of(&self, username: &str) -> ServiceResult<Vec<UserDto>>;
}

/// Blocking between users.
pub trait BlockService: Send + Sync {
    /// `blocker` blocks `blocked`, ending any friendship and personal chat.
    ///
    /// # Errors
    ///
    /// Fails if either user is missing or the block already exists.
    fn block(&self, blocker: &str, blocked: &str) -> ServiceResult<()>;

    /// Lifts a block.
    ///
    /// # Errors
    ///
    /// Fails if either user is missing or there is no such block.
    fn unblock(&self, unblocker: &str, unblocked: &str) -> ServiceResult<()>;

    /// Users `username` has blocked.
    ///
    /// # Errors
    ///
    /// Fails if the user is missing.
    fn blocked_by(&self, username: &str) -> ServiceResult<Vec<UserDto>>;
}

/// Personal and group chats.
pub trait ChatService: Send + Sync {
    /// Transcript of the personal chat between two friends.
    ///
    /// # Errors
    ///
    /// Fails if either user is missing or they are not friends.
    fn personal_chat(&self, me: &str, friend: &str) -> ServiceResult<PersonalChatDto>;

    /// Appends a message to a personal chat and notifies the receiver.
    ///
    /// # Errors
    ///
    /// Fails if either user is missing or no personal chat exists.
    fn send_personal(&self, sender: &str, receiver: &str, text: &str) -> ServiceResult<()>;

    /// Creates a group administered by `admin`.
    ///
    /// # Errors
    ///
    /// Fails if the user is missing or a group with that name exists.
    fn create_group(&self, name: &str, admin: &str) -> ServiceResult<()>;

    /// Deletes a group. Only its admin may do this.
    ///
    /// # Errors
    ///
    /// Fails if the user or group is missing, or `actor` is not the admin.
    fn delete_group(&self, name: &str, actor: &str) -> ServiceResult<()>;

    /// Transcript and members of a group `username` belongs to.
    ///
    /// # Errors
    ///
    /// Fails if the user or group is missing, or the user is not a member.
    fn group_chat(&self, name: &str, username: &str) -> ServiceResult<GroupChatDto>;

    /// Names of the groups `username` belongs to, sorted.
    ///
    /// # Errors
    ///
    /// Fails if the user is missing.
    fn groups_of(&self, username: &str) -> ServiceResult<Vec<String>>;

    /// The admin adds `added` to the group.
    ///
    /// # Errors
    ///
    /// Fails if a user or the group is missing, `adder` is not the admin, or
    /// `added` is already a member.
    fn add_to_group(&self, name: &str, adder: &str, added: &str) -> ServiceResult<()>;

    /// The admin removes `removed` from the group.
    ///
    /// # Errors
    ///
    /// Fails if a user or the group is missing, `remover` is not the admin,
    /// or `removed` is not a member.
    fn remove_from_group(&self, name: &str, remover: &str, removed: &str) -> ServiceResult<()>;

    /// A member leaves the group.
    ///
    /// # Errors
    ///
    /// Fails if the user or group is missing, or the user is not a member.
    fn leave_group(&self, name: &str, username: &str) -> ServiceResult<()>;

    /// Appends a message to a group and notifies the other members.
    ///
    /// # Errors
    ///
    /// Fails if the user or group is missing, or the sender is not a member.
    fn send_group(&self, name: &str, sender: &str, text: &str) -> ServiceResult<()>;
}

/// Pending notifications polled by clients.
pub trait NotificationService: Send + Sync {
    /// Pending notifications for `username`, oldest first.
    fn notifications_of(&self, username: &str) -> Vec<Notification>;

    /// Drops every pending notification for `username`.
    fn clear_notifications(&self, username: &str);
}

/// The collaborators a [`crate::executor::CommandExecutor`] is built from.
#[derive(Clone)]
pub struct Services {
    pub users: Arc<dyn UserService>,
    pub friendships: Arc<dyn FriendshipService>,
    pub blocks: Arc<dyn BlockService>,
    pub chats: Arc<dyn ChatService>,
    pub notifications: Arc<dyn NotificationService>,
}

impl Services {
    /// Wires every service to one shared in-memory backend.
    #[must_use]
    pub fn in_memory(backend: Arc<MemoryBackend>) -> Self {
        Self {
            users: backend.clone(),
            friendships: backend.clone(),
            blocks: backend.clone(),
            chats: backend.clone(),
            notifications: backend,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
