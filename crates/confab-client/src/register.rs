//! The personal conversation register.
//!
//! Where the server holds every conversation, a client holds only the
//! subset its user participates in, as mirrors keyed by conversation
//! number. The register is owned exclusively by the client process.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::debug;

use confab_core::{CoreError, Result};
use confab_proto::ConversationSnapshot;

use crate::mirror::ConversationMirror;

/// The local user's set of conversation mirrors.
#[derive(Debug)]
pub struct PersonalRegister {
    username: String,
    mirrors: HashMap<u64, ConversationMirror>,
}

impl PersonalRegister {
    pub fn new(username: impl Into<String>) -> Result<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(CoreError::InvalidArgument("empty username".into()));
        }
        Ok(Self {
            username,
            mirrors: HashMap::new(),
        })
    }

    /// The local user this register belongs to.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Build and track a mirror from a freshly fetched snapshot.
    ///
    /// The snapshot must list the local user as a member -- a register
    /// never mirrors conversations its user is not part of. Subscribing
    /// to a conversation already held replaces the old mirror (and its
    /// observers) with one built from the newer snapshot.
    pub fn track(&mut self, snapshot: ConversationSnapshot) -> Result<&mut ConversationMirror> {
        if !snapshot.members.iter().any(|m| m.username == self.username) {
            return Err(CoreError::NotMember(self.username.clone()));
        }

        let number = snapshot.conversation_number;
        debug!(conversation = number, user = %self.username, "tracking conversation");
        let mirror = ConversationMirror::from_snapshot(snapshot);
        Ok(match self.mirrors.entry(number) {
            Entry::Occupied(mut entry) => {
                entry.insert(mirror);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(mirror),
        })
    }

    /// Drop a mirror (the local user left, or the conversation was
    /// deleted server-side).
    pub fn forget(&mut self, conversation_number: u64) -> Result<()> {
        self.mirrors
            .remove(&conversation_number)
            .map(|_| ())
            .ok_or(CoreError::ConversationNotFound(conversation_number))
    }

    pub fn mirror(&self, conversation_number: u64) -> Option<&ConversationMirror> {
        self.mirrors.get(&conversation_number)
    }

    pub fn mirror_mut(&mut self, conversation_number: u64) -> Option<&mut ConversationMirror> {
        self.mirrors.get_mut(&conversation_number)
    }

    /// Tracked conversation numbers, ascending.
    pub fn conversation_numbers(&self) -> Vec<u64> {
        let mut numbers: Vec<u64> = self.mirrors.keys().copied().collect();
        numbers.sort_unstable();
        numbers
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::Conversation;

    fn snapshot(number: u64, members: &[&str]) -> ConversationSnapshot {
        let conversation = Conversation::new(number, "", members.to_vec()).unwrap();
        ConversationSnapshot::capture(&conversation)
    }

    #[test]
    fn tracks_only_own_conversations() {
        let mut register = PersonalRegister::new("alice").unwrap();
        register.track(snapshot(1, &["alice", "bob"])).unwrap();

        let err = register.track(snapshot(2, &["bob", "carol"])).unwrap_err();
        assert!(matches!(err, CoreError::NotMember(name) if name == "alice"));

        assert_eq!(register.conversation_numbers(), [1]);
    }

    #[test]
    fn forget_removes_the_mirror() {
        let mut register = PersonalRegister::new("alice").unwrap();
        register.track(snapshot(1, &["alice"])).unwrap();

        register.forget(1).unwrap();
        assert!(register.is_empty());
        assert!(register.mirror(1).is_none());

        let err = register.forget(1).unwrap_err();
        assert!(matches!(err, CoreError::ConversationNotFound(1)));
    }

    #[test]
    fn retrack_replaces_the_mirror() {
        let mut register = PersonalRegister::new("alice").unwrap();
        register.track(snapshot(1, &["alice"])).unwrap();
        register.track(snapshot(1, &["alice", "bob"])).unwrap();

        assert_eq!(register.len(), 1);
        assert_eq!(register.mirror(1).unwrap().member_count(), 2);
    }

    #[test]
    fn empty_username_rejected() {
        assert!(matches!(
            PersonalRegister::new(""),
            Err(CoreError::InvalidArgument(_))
        ));
    }
}
