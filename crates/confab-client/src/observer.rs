//! Observer registration and notification.
//!
//! Observers are plain callbacks invoked synchronously, on the thread
//! that applied the delta. Subscribing returns a [`SubscriptionHandle`];
//! dropping deliveries is an explicit `unsubscribe`, never a side effect.
//! A callback that panics is a programming error in the observer, not a
//! condition this layer recovers from.

use confab_core::{Member, Message};

/// One applied delta: the changed item, and whether it was a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    MessageAdded(Message),
    MessageRemoved(Message),
    MemberAdded(Member),
    MemberRemoved(Member),
    Renamed(String),
}

impl ConversationEvent {
    /// Whether this delta removed something from the mirror.
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            ConversationEvent::MessageRemoved(_) | ConversationEvent::MemberRemoved(_)
        )
    }
}

/// Proof of a registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: u64,
}

type Callback = Box<dyn Fn(&ConversationEvent) + Send>;

/// The set of observers attached to one mirror.
pub struct Observers {
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

impl Observers {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }

    /// Register a callback; every later delta is delivered to it until
    /// the returned handle is unsubscribed.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&ConversationEvent) + Send + 'static,
    {
        self.next_id += 1;
        let id = self.next_id;
        self.callbacks.push((id, Box::new(callback)));
        SubscriptionHandle { id }
    }

    /// Remove a registration. Returns `false` if the handle was already
    /// unsubscribed.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(id, _)| *id != handle.id);
        self.callbacks.len() != before
    }

    /// Whether a handle is still registered.
    pub fn is_subscribed(&self, handle: SubscriptionHandle) -> bool {
        self.callbacks.iter().any(|(id, _)| *id == handle.id)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Deliver one event to every registered observer, in registration
    /// order, on the calling thread.
    pub fn notify(&self, event: &ConversationEvent) {
        for (_, callback) in &self.callbacks {
            callback(event);
        }
    }
}

impl Default for Observers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn every_observer_sees_every_event() {
        let mut observers = Observers::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c1 = first.clone();
        observers.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = second.clone();
        observers.subscribe(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        observers.notify(&ConversationEvent::Renamed("standup".into()));
        observers.notify(&ConversationEvent::Renamed("retro".into()));

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut observers = Observers::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let handle = observers.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(observers.is_subscribed(handle));
        observers.notify(&ConversationEvent::Renamed("one".into()));

        assert!(observers.unsubscribe(handle));
        assert!(!observers.is_subscribed(handle));
        observers.notify(&ConversationEvent::Renamed("two".into()));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        // Double unsubscribe is a no-op, not an error.
        assert!(!observers.unsubscribe(handle));
    }

    #[test]
    fn removal_flag_tracks_event_kind() {
        let member = Member {
            username: "bob".into(),
            member_number: 2,
        };
        assert!(ConversationEvent::MemberRemoved(member.clone()).is_removal());
        assert!(!ConversationEvent::MemberAdded(member).is_removal());
        assert!(!ConversationEvent::Renamed("x".into()).is_removal());
    }
}
