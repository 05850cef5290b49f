//! Chat routing index.
//!
//! Tracks which live connections currently have which conversation open, so
//! a message sent to a conversation can be pushed to everyone viewing it.
//! The index is owned by the router task alone and is therefore not
//! synchronized.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chatty_proto::chat::{Conversation, PersonalKey};

/// Opaque handle for one live client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Conversation identity to the set of connections viewing it.
#[derive(Debug, Default)]
pub struct RoutingIndex {
    personal: HashMap<PersonalKey, HashSet<ConnectionId>>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

impl RoutingIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `handle` has the personal chat between `left` and
    /// `right` open. Argument order does not matter.
    pub fn register_to_chat(&mut self, handle: ConnectionId, left: &str, right: &str) {
        self.personal
            .entry(PersonalKey::new(left, right))
            .or_default()
            .insert(handle);
    }

    /// Records that `handle` has `group` open.
    pub fn register_to_group(&mut self, handle: ConnectionId, group: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(handle);
    }

    /// Records that `handle` has `conversation` open.
    pub fn register(&mut self, handle: ConnectionId, conversation: &Conversation) {
        match conversation {
            Conversation::Personal(key) => {
                self.personal.entry(key.clone()).or_default().insert(handle);
            }
            Conversation::Group(name) => self.register_to_group(handle, name),
        }
    }

    /// Removes `handle` from one conversation.
    ///
    /// Returns `true` if the handle was registered there. Unknown handles or
    /// conversations are a no-op. Empty entries are dropped.
    pub fn unregister(&mut self, handle: ConnectionId, conversation: &Conversation) -> bool {
        match conversation {
            Conversation::Personal(key) => remove_from(&mut self.personal, key, handle),
            Conversation::Group(name) => remove_from(&mut self.groups, name, handle),
        }
    }

    /// Removes `handle` from every conversation, returning how many entries
    /// it was removed from.
    pub fn disconnect(&mut self, handle: ConnectionId) -> usize {
        let removed = purge(&mut self.personal, handle) + purge(&mut self.groups, handle);
        if removed > 0 {
            tracing::debug!(conn = %handle, entries = removed, "connection removed from routing index");
        }
        removed
    }

    /// Drops the whole entry for `group`, returning how many connections
    /// were viewing it.
    pub fn remove_group(&mut self, group: &str) -> usize {
        self.groups.remove(group).map_or(0, |viewers| viewers.len())
    }

    /// Connections viewing `conversation`, in ascending order.
    #[must_use]
    pub fn participants_of(&self, conversation: &Conversation) -> Vec<ConnectionId> {
        let set = match conversation {
            Conversation::Personal(key) => self.personal.get(key),
            Conversation::Group(name) => self.groups.get(name),
        };
        let mut handles: Vec<ConnectionId> =
            set.map(|s| s.iter().copied().collect()).unwrap_or_default();
        handles.sort_unstable();
        handles
    }

    /// Number of conversations with at least one viewer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.personal.len() + self.groups.len()
    }

    /// Whether no conversation has a viewer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.personal.is_empty() && self.groups.is_empty()
    }
}

fn remove_from<K, Q>(map: &mut HashMap<K, HashSet<ConnectionId>>, key: &Q, handle: ConnectionId) -> bool
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    let Some(set) = map.get_mut(key) else {
        return false;
    };
    let removed = set.remove(&handle);
    if set.is_empty() {
        map.remove(key);
    }
    removed
}

fn purge<K>(map: &mut HashMap<K, HashSet<ConnectionId>>, handle: ConnectionId) -> usize {
    let mut removed = 0;
    map.retain(|_, set| {
        if set.remove(&handle) {
            removed += 1;
        }
        !set.is_empty()
    });
    removed
}
