//! The authoritative conversation register.
//!
//! Holds every conversation on this server, each behind its own mutex.
//! Per-conversation mutual exclusion is the unit of concurrency control:
//! two conversations mutate fully in parallel, while two operations on
//! the same conversation (even on different dates) serialize, so a
//! membership change is always visible to concurrent message validation.
//! The register's own lock is held only for lookup, create and delete.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::info;

use confab_core::{Conversation, CoreError, Result};

/// A conversation slot handed out by the register. Lock it for the
/// duration of each operation, delta queries included -- a read taken
/// mid-mutation would see a torn registry.
pub type SharedConversation = Arc<Mutex<Conversation>>;

/// All conversations known to this server.
///
/// Constructed once in `main` and passed by `Arc` into every connection
/// handler; there is no ambient global register.
pub struct SharedRegistry {
    inner: RwLock<RegistryInner>,
}

struct RegistryInner {
    last_conversation_number: u64,
    conversations: HashMap<u64, SharedConversation>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                last_conversation_number: 0,
                conversations: HashMap::new(),
            }),
        }
    }

    /// Create a conversation and assign it the next number.
    ///
    /// Numbers are sequential and never reused, even after deletion.
    pub fn create_conversation<I, S>(&self, name: impl Into<String>, initial_members: I) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let number = inner.last_conversation_number + 1;
        let conversation = Conversation::new(number, name, initial_members)?;

        inner.last_conversation_number = number;
        inner
            .conversations
            .insert(number, Arc::new(Mutex::new(conversation)));
        info!(conversation = number, "conversation created");
        Ok(number)
    }

    /// Look up a conversation slot by number.
    pub fn conversation(&self, number: u64) -> Result<SharedConversation> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .conversations
            .get(&number)
            .cloned()
            .ok_or(CoreError::ConversationNotFound(number))
    }

    /// Remove a conversation as a whole unit.
    pub fn remove_conversation(&self, number: u64) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .conversations
            .remove(&number)
            .map(|_| info!(conversation = number, "conversation deleted"))
            .ok_or(CoreError::ConversationNotFound(number))
    }

    /// Numbers of the conversations `username` is an active member of,
    /// ascending. This is the personal subset a client mirrors.
    pub fn numbers_for(&self, username: &str) -> Vec<u64> {
        let slots: Vec<(u64, SharedConversation)> = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            inner
                .conversations
                .iter()
                .map(|(number, slot)| (*number, slot.clone()))
                .collect()
        };

        let mut numbers: Vec<u64> = slots
            .into_iter()
            .filter(|(_, slot)| {
                let conversation = slot.lock().unwrap_or_else(PoisonError::into_inner);
                conversation.members().is_active(username)
            })
            .map(|(number, _)| number)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    /// Number of registered conversations.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .conversations
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use confab_core::Message;

    #[test]
    fn numbers_are_sequential_and_never_reused() {
        let registry = SharedRegistry::new();
        let first = registry.create_conversation("", ["alice"]).unwrap();
        let second = registry.create_conversation("", ["bob"]).unwrap();
        assert_eq!((first, second), (1, 2));

        registry.remove_conversation(1).unwrap();
        let third = registry.create_conversation("", ["carol"]).unwrap();
        assert_eq!(third, 3);
    }

    #[test]
    fn lookup_after_delete_fails() {
        let registry = SharedRegistry::new();
        let number = registry.create_conversation("", ["alice"]).unwrap();
        registry.remove_conversation(number).unwrap();

        let err = registry.conversation(number).unwrap_err();
        assert!(matches!(err, CoreError::ConversationNotFound(n) if n == number));

        let err = registry.remove_conversation(number).unwrap_err();
        assert!(matches!(err, CoreError::ConversationNotFound(_)));
    }

    #[test]
    fn creation_validates_member_list() {
        let registry = SharedRegistry::new();
        let err = registry
            .create_conversation("", Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn personal_subset_tracks_membership() {
        let registry = SharedRegistry::new();
        let a = registry.create_conversation("", ["alice", "bob"]).unwrap();
        let b = registry.create_conversation("", ["bob", "carol"]).unwrap();
        registry.create_conversation("", ["carol"]).unwrap();

        assert_eq!(registry.numbers_for("bob"), [a, b]);
        assert_eq!(registry.numbers_for("alice"), [a]);
        assert!(registry.numbers_for("mallory").is_empty());

        let slot = registry.conversation(a).unwrap();
        slot.lock()
            .unwrap()
            .remove_member("bob", "alice")
            .unwrap();
        assert_eq!(registry.numbers_for("bob"), [b]);
    }

    #[test]
    fn different_conversations_mutate_in_parallel() {
        let registry = Arc::new(SharedRegistry::new());
        let a = registry.create_conversation("", ["alice"]).unwrap();
        let b = registry.create_conversation("", ["bob"]).unwrap();

        let today = Utc::now().date_naive();
        let mut handles = Vec::new();
        for (number, sender) in [(a, "alice"), (b, "bob")] {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                let slot = registry.conversation(number).unwrap();
                for i in 0..100u32 {
                    let message = Message::new(
                        sender,
                        format!("message {i}"),
                        today,
                        NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                    )
                    .unwrap();
                    slot.lock().unwrap().add_message(message).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        for number in [a, b] {
            let slot = registry.conversation(number).unwrap();
            let conversation = slot.lock().unwrap();
            assert_eq!(conversation.log(today).unwrap().len(), 100);
            assert_eq!(conversation.log(today).unwrap().last_message_number(), 100);
        }
    }
}
