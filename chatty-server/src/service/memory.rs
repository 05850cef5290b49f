//! In-memory implementation of every service trait.
//!
//! All entities live in one [`State`] behind a [`RwLock`]; notifications
//! live in a separate [`NotificationStore`]. Nothing survives a restart.

use std::collections::{BTreeSet, HashMap, HashSet};

use chatty_proto::chat::PersonalKey;
use chatty_proto::dto::{
    ChatMessage, GroupChatDto, Notification, NotificationKind, PersonalChatDto, SessionDto,
    UserDto,
};
use parking_lot::RwLock;

use super::{
    BlockService, ChatService, FriendshipService, NotificationService, ServiceError,
    ServiceResult, UserService,
};
use crate::notifications::NotificationStore;

const USER_NOT_FOUND: &str = "User not found";
const GROUP_NOT_FOUND: &str = "Group chat does not exist";
const NO_FRIENDSHIP: &str = "Friendship between users does not exist.";

#[derive(Debug)]
struct User {
    first_name: String,
    last_name: String,
    password_hash: blake3::Hash,
}

impl User {
    fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug)]
struct Group {
    admin: String,
    members: Vec<String>,
    messages: Vec<ChatMessage>,
}

impl Group {
    fn has_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m == username)
    }
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, User>,
    friendships: HashSet<PersonalKey>,
    /// Pending requests as `(sender, receiver)`.
    requests: BTreeSet<(String, String)>,
    /// Blocks as `(blocker, blocked)`.
    blocks: BTreeSet<(String, String)>,
    personal_chats: HashMap<PersonalKey, Vec<ChatMessage>>,
    groups: HashMap<String, Group>,
}

impl State {
    fn user(&self, username: &str) -> ServiceResult<&User> {
        self.users
            .get(username)
            .ok_or_else(|| ServiceError::NotFound(USER_NOT_FOUND.to_string()))
    }

    fn ensure_users(&self, left: &str, right: &str) -> ServiceResult<()> {
        self.user(left)?;
        self.user(right)?;
        Ok(())
    }

    fn dto(&self, username: &str) -> Option<UserDto> {
        self.users
            .get(username)
            .map(|u| UserDto::new(u.full_name(), username))
    }

    fn dtos<'a>(&self, usernames: impl Iterator<Item = &'a str>) -> Vec<UserDto> {
        let mut dtos: Vec<UserDto> = usernames.filter_map(|name| self.dto(name)).collect();
        dtos.sort();
        dtos
    }

    fn are_friends(&self, left: &str, right: &str) -> bool {
        self.friendships.contains(&PersonalKey::new(left, right))
    }

    fn has_request(&self, sender: &str, receiver: &str) -> bool {
        self.requests
            .contains(&(sender.to_string(), receiver.to_string()))
    }

    fn has_block(&self, blocker: &str, blocked: &str) -> bool {
        self.blocks
            .contains(&(blocker.to_string(), blocked.to_string()))
    }

    fn group(&self, name: &str) -> ServiceResult<&Group> {
        self.groups
            .get(name)
            .ok_or_else(|| ServiceError::NotFound(GROUP_NOT_FOUND.to_string()))
    }

    fn group_mut(&mut self, name: &str) -> ServiceResult<&mut Group> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| ServiceError::NotFound(GROUP_NOT_FOUND.to_string()))
    }

    /// The group, if `username` is a member. Non-members get the same
    /// error as for a missing group.
    fn member_group(&self, name: &str, username: &str) -> ServiceResult<&Group> {
        let group = self.group(name)?;
        if group.has_member(username) {
            Ok(group)
        } else {
            Err(ServiceError::NotFound(GROUP_NOT_FOUND.to_string()))
        }
    }

    fn admin_group_mut(&mut self, name: &str, actor: &str, action: &str) -> ServiceResult<&mut Group> {
        let group = self.group_mut(name)?;
        if group.admin != actor {
            return Err(ServiceError::AccessDenied(format!(
                "You do not have permissions to {action} {name}"
            )));
        }
        Ok(group)
    }
}

/// Shared in-memory backend for all services.
pub struct MemoryBackend {
    state: RwLock<State>,
    notifications: NotificationStore,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend with the default notification queue limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_notifications(NotificationStore::new())
    }

    /// Creates an empty backend using the given notification store.
    #[must_use]
    pub fn with_notifications(notifications: NotificationStore) -> Self {
        Self {
            state: RwLock::new(State::default()),
            notifications,
        }
    }

    fn push(&self, username: &str, kind: NotificationKind, content: String) {
        self.notifications
            .enqueue(username, Notification::new(kind, content));
    }
}

fn hash_password(password: &str) -> blake3::Hash {
    blake3::hash(password.as_bytes())
}

fn validate_name(name: &str) -> ServiceResult<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
        Ok(())
    } else {
        Err(ServiceError::Invalid(
            "Name must contain only alphabetic and dash".to_string(),
        ))
    }
}

fn validate_username(username: &str) -> ServiceResult<()> {
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ServiceError::Invalid(
            "Username must contain only alphanumeric, underscore, dash and dot".to_string(),
        ))
    }
}

fn validate_password(password: &str) -> ServiceResult<()> {
    let valid = password.len() >= 8
        && password.chars().all(|c| c.is_ascii_alphanumeric())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ServiceError::Invalid(
            "Password must be at least 8 characters, 1 upper, 1 lower and 1 digit".to_string(),
        ))
    }
}

impl UserService for MemoryBackend {
    fn register(
        &self,
        first_name: &str,
        last_name: &str,
        username: &str,
        password: &str,
    ) -> ServiceResult<()> {
        validate_name(first_name)?;
        validate_name(last_name)?;
        validate_username(username)?;
        validate_password(password)?;

        let mut state = self.state.write();
        if state.users.contains_key(username) {
            return Err(ServiceError::AlreadyExists("User already exists".to_string()));
        }
        state.users.insert(
            username.to_string(),
            User {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                password_hash: hash_password(password),
            },
        );
        drop(state);

        tracing::info!(username = %username, "user registered");
        Ok(())
    }

    fn login(&self, username: &str, password: &str) -> ServiceResult<SessionDto> {
        let state = self.state.read();
        let user = state
            .users
            .get(username)
            .filter(|u| u.password_hash == hash_password(password))
            .ok_or_else(|| ServiceError::NotFound("Invalid username or password".to_string()))?;

        Ok(SessionDto {
            user: UserDto::new(user.full_name(), username),
            notifications: self.notifications.pending(username),
        })
    }
}

impl FriendshipService for MemoryBackend {
    fn add_friend(&self, sender: &str, target: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.ensure_users(sender, target)?;

        if sender == target {
            return Err(ServiceError::Invalid("You cannot befriend yourself".to_string()));
        }
        if state.are_friends(sender, target) {
            return Err(ServiceError::FriendshipExists(format!(
                "You are already friends with {target}"
            )));
        }
        if state.has_request(sender, target) {
            return Err(ServiceError::RequestAlreadySent(format!(
                "You have already sent friend request to {target}"
            )));
        }
        if state.has_request(target, sender) {
            return Err(ServiceError::RequestAlreadySent(format!(
                "You already have a friend request from {target}"
            )));
        }
        if state.has_block(target, sender) {
            return Err(ServiceError::Blocked("Sender blocked by target user".to_string()));
        }
        if state.has_block(sender, target) {
            return Err(ServiceError::Blocked("Sender has blocked target user".to_string()));
        }

        state
            .requests
            .insert((sender.to_string(), target.to_string()));
        let full_name = state.user(sender)?.full_name();
        drop(state);

        self.push(
            target,
            NotificationKind::FriendRequest,
            format!("From {full_name} [{sender}]"),
        );
        Ok(())
    }

    fn remove_friend(&self, remover: &str, target: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.ensure_users(remover, target)?;

        let key = PersonalKey::new(remover, target);
        if !state.friendships.remove(&key) {
            return Err(ServiceError::NotFound(NO_FRIENDSHIP.to_string()));
        }
        state.personal_chats.remove(&key);
        Ok(())
    }

    fn requests_of(&self, username: &str) -> ServiceResult<Vec<UserDto>> {
        let state = self.state.read();
        state.user(username)?;

        let senders = state
            .requests
            .iter()
            .filter(|(_, receiver)| receiver == username)
            .map(|(sender, _)| sender.as_str());
        Ok(state.dtos(senders))
    }

    fn accept_request(&self, accepter: &str, target: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.ensure_users(accepter, target)?;

        if !state
            .requests
            .remove(&(target.to_string(), accepter.to_string()))
        {
            return Err(ServiceError::NotFound(format!(
                "You have no friend request from {target}"
            )));
        }

        let key = PersonalKey::new(accepter, target);
        state.friendships.insert(key.clone());
        state.personal_chats.entry(key).or_default();
        let full_name = state.user(accepter)?.full_name();
        drop(state);

        self.push(
            target,
            NotificationKind::Other,
            format!("{full_name} accepted your friend request"),
        );
        Ok(())
    }

    fn decline_request(&self, decliner: &str, target: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.ensure_users(decliner, target)?;

        if state
            .requests
            .remove(&(target.to_string(), decliner.to_string()))
        {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!(
                "You have no friend request from {target}"
            )))
        }
    }

    fn friends_of(&self, username: &str) -> ServiceResult<Vec<UserDto>> {
        let state = self.state.read();
        state.user(username)?;

        let friends = state
            .friendships
            .iter()
            .filter(|key| key.contains(username))
            .map(|key| {
                let (low, high) = key.users();
                if low == username { high } else { low }
            });
        Ok(state.dtos(friends))
    }
}

impl BlockService for MemoryBackend {
    fn block(&self, blocker: &str, blocked: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.ensure_users(blocker, blocked)?;

        if blocker == blocked {
            return Err(ServiceError::Invalid("You cannot block yourself".to_string()));
        }
        if !state
            .blocks
            .insert((blocker.to_string(), blocked.to_string()))
        {
            return Err(ServiceError::Blocked(format!("{blocked} is already blocked")));
        }

        let key = PersonalKey::new(blocker, blocked);
        state.friendships.remove(&key);
        state.personal_chats.remove(&key);
        state
            .requests
            .retain(|(s, r)| !PersonalKey::new(s, r).eq(&key));
        let full_name = state.user(blocker)?.full_name();
        drop(state);

        self.push(blocked, NotificationKind::Other, format!("{full_name} blocked you"));
        Ok(())
    }

    fn unblock(&self, unblocker: &str, unblocked: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.ensure_users(unblocker, unblocked)?;

        if !state
            .blocks
            .remove(&(unblocker.to_string(), unblocked.to_string()))
        {
            return Err(ServiceError::NotFound(format!("{unblocked} is not blocked")));
        }
        let full_name = state.user(unblocker)?.full_name();
        drop(state);

        self.push(
            unblocked,
            NotificationKind::Other,
            format!("{full_name} unblocked you"),
        );
        Ok(())
    }

    fn blocked_by(&self, username: &str) -> ServiceResult<Vec<UserDto>> {
        let state = self.state.read();
        state.user(username)?;

        let blocked = state
            .blocks
            .iter()
            .filter(|(blocker, _)| blocker == username)
            .map(|(_, blocked)| blocked.as_str());
        Ok(state.dtos(blocked))
    }
}

impl ChatService for MemoryBackend {
    fn personal_chat(&self, me: &str, friend: &str) -> ServiceResult<PersonalChatDto> {
        let state = self.state.read();
        state.ensure_users(me, friend)?;

        if !state.are_friends(me, friend) {
            return Err(ServiceError::NotFound(NO_FRIENDSHIP.to_string()));
        }
        let messages = state
            .personal_chats
            .get(&PersonalKey::new(me, friend))
            .ok_or_else(|| ServiceError::NotFound("Personal chat not available".to_string()))?;

        Ok(PersonalChatDto {
            friend: friend.to_string(),
            messages: messages.clone(),
        })
    }

    fn send_personal(&self, sender: &str, receiver: &str, text: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.ensure_users(sender, receiver)?;

        let chat = state
            .personal_chats
            .get_mut(&PersonalKey::new(sender, receiver))
            .ok_or_else(|| ServiceError::NotFound("Personal chat does not exist".to_string()))?;
        chat.push(ChatMessage::new(sender, text));
        drop(state);

        self.push(
            receiver,
            NotificationKind::PersonalMessage,
            format!("[{sender}] {text}"),
        );
        Ok(())
    }

    fn create_group(&self, name: &str, admin: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.user(admin)?;

        if state.groups.contains_key(name) {
            return Err(ServiceError::AlreadyExists(format!(
                "A group named {name} already exists"
            )));
        }
        state.groups.insert(
            name.to_string(),
            Group {
                admin: admin.to_string(),
                members: vec![admin.to_string()],
                messages: Vec::new(),
            },
        );
        drop(state);

        tracing::info!(group = %name, admin = %admin, "group created");
        Ok(())
    }

    fn delete_group(&self, name: &str, actor: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.user(actor)?;
        state.admin_group_mut(name, actor, "delete")?;
        state.groups.remove(name);
        Ok(())
    }

    fn group_chat(&self, name: &str, username: &str) -> ServiceResult<GroupChatDto> {
        let state = self.state.read();
        state.user(username)?;
        let group = state.member_group(name, username)?;

        Ok(GroupChatDto {
            name: name.to_string(),
            users: group.members.clone(),
            messages: group.messages.clone(),
        })
    }

    fn groups_of(&self, username: &str) -> ServiceResult<Vec<String>> {
        let state = self.state.read();
        state.user(username)?;

        let mut names: Vec<String> = state
            .groups
            .iter()
            .filter(|(_, group)| group.has_member(username))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn add_to_group(&self, name: &str, adder: &str, added: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.ensure_users(adder, added)?;

        let group = state.admin_group_mut(name, adder, "manage")?;
        if group.has_member(added) {
            return Err(ServiceError::AlreadyInGroup(format!(
                "{added} is already in this group"
            )));
        }
        group.members.push(added.to_string());
        drop(state);

        self.push(
            added,
            NotificationKind::Other,
            format!("{adder} added you to group {name}"),
        );
        Ok(())
    }

    fn remove_from_group(&self, name: &str, remover: &str, removed: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.ensure_users(remover, removed)?;

        let group = state.admin_group_mut(name, remover, "manage")?;
        if removed == group.admin {
            return Err(ServiceError::Invalid(format!(
                "The admin cannot be removed from {name}"
            )));
        }
        if !group.has_member(removed) {
            return Err(ServiceError::NotFound(format!("{removed} is not in {name}")));
        }
        group.members.retain(|m| m != removed);
        drop(state);

        self.push(
            removed,
            NotificationKind::Other,
            format!("You have been kicked from {name}"),
        );
        Ok(())
    }

    fn leave_group(&self, name: &str, username: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.user(username)?;
        state.member_group(name, username)?;

        let group = state.group_mut(name)?;
        group.members.retain(|m| m != username);
        match group.members.first().cloned() {
            None => {
                state.groups.remove(name);
                tracing::info!(group = %name, "last member left, group removed");
            }
            Some(next) if group.admin == username => group.admin = next,
            Some(_) => {}
        }
        Ok(())
    }

    fn send_group(&self, name: &str, sender: &str, text: &str) -> ServiceResult<()> {
        let mut state = self.state.write();
        state.user(sender)?;
        state.member_group(name, sender)?;

        let group = state.group_mut(name)?;
        group.messages.push(ChatMessage::new(sender, text));
        let receivers: Vec<String> = group
            .members
            .iter()
            .filter(|m| *m != sender)
            .cloned()
            .collect();
        drop(state);

        let content = format!("{name} -> [{sender}] {text}");
        for receiver in receivers {
            self.push(&receiver, NotificationKind::GroupMessage, content.clone());
        }
        Ok(())
    }
}

impl NotificationService for MemoryBackend {
    fn notifications_of(&self, username: &str) -> Vec<Notification> {
        self.notifications.pending(username)
    }

    fn clear_notifications(&self, username: &str) {
        self.notifications.drain(username);
    }
}
