//! The client-held conversation replica.
//!
//! A [`ConversationMirror`] is a read-mostly cache of one server-side
//! conversation. It is built exactly once from a snapshot and from then
//! on advanced only by `apply_*` calls carrying server-confirmed deltas;
//! it never re-derives state on its own. Each applied delta notifies the
//! registered observers synchronously, on the applying thread.
//!
//! The mirror is single-writer, multi-reader: only the code applying
//! deltas mutates it. Shielding UI-thread reads from those writes is the
//! embedding application's concern.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use confab_core::{CoreError, Member, Message, Result, Tombstone};
use confab_proto::{ConversationSnapshot, SyncRequest, SyncResponse};

use crate::observer::{ConversationEvent, Observers, SubscriptionHandle};

/// A non-authoritative replica of one conversation.
#[derive(Debug)]
pub struct ConversationMirror {
    conversation_number: u64,
    name: String,
    date_created: NaiveDate,
    members: BTreeMap<u64, Member>,
    messages: BTreeMap<NaiveDate, BTreeMap<u64, Message>>,
    /// Per-date message cursor. Kept separately from the stored messages
    /// because removals must not rewind the cursor.
    message_cursors: BTreeMap<NaiveDate, u64>,
    last_member_number: u64,
    last_deleted_number: u64,
    /// The local user's own outgoing messages, staged until the numbered
    /// copy comes back from the authority.
    pending: Vec<Message>,
    observers: Observers,
}

impl ConversationMirror {
    /// Build a mirror from the snapshot received at subscribe time.
    pub fn from_snapshot(snapshot: ConversationSnapshot) -> Self {
        let mut messages: BTreeMap<NaiveDate, BTreeMap<u64, Message>> = BTreeMap::new();
        let mut message_cursors = BTreeMap::new();
        for log in snapshot.logs {
            message_cursors.insert(log.date, log.last_message_number);
            let per_day = messages.entry(log.date).or_default();
            for message in log.messages {
                if let Some(number) = message.number() {
                    per_day.insert(number, message);
                }
            }
        }

        Self {
            conversation_number: snapshot.conversation_number,
            name: snapshot.name,
            date_created: snapshot.date_created,
            members: snapshot
                .members
                .into_iter()
                .map(|m| (m.member_number, m))
                .collect(),
            messages,
            message_cursors,
            last_member_number: snapshot.last_member_number,
            last_deleted_number: snapshot.last_deleted_number,
            pending: Vec::new(),
            observers: Observers::new(),
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn conversation_number(&self) -> u64 {
        self.conversation_number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date_created(&self) -> NaiveDate {
        self.date_created
    }

    /// Active members in member-number order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, username: &str) -> bool {
        self.members.values().any(|m| m.username == username)
    }

    /// Confirmed messages on `date`, in number order.
    pub fn messages_on(&self, date: NaiveDate) -> impl Iterator<Item = &Message> {
        self.messages
            .get(&date)
            .into_iter()
            .flat_map(|per_day| per_day.values())
    }

    /// Dates with at least one confirmed message, ascending.
    pub fn message_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.messages.keys().copied()
    }

    /// Outgoing messages not yet confirmed by the authority.
    pub fn pending(&self) -> &[Message] {
        &self.pending
    }

    /// The name if one is set, otherwise the comma-joined member list.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.members
                .values()
                .map(|m| m.username.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            self.name.clone()
        }
    }

    pub fn last_member_number(&self) -> u64 {
        self.last_member_number
    }

    pub fn last_deleted_number(&self) -> u64 {
        self.last_deleted_number
    }

    /// Message cursor for `date` (0 if the mirror has never seen that
    /// day).
    pub fn last_message_number(&self, date: NaiveDate) -> u64 {
        self.message_cursors.get(&date).copied().unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionHandle
    where
        F: Fn(&ConversationEvent) + Send + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.observers.unsubscribe(handle)
    }

    pub fn is_subscribed(&self, handle: SubscriptionHandle) -> bool {
        self.observers.is_subscribed(handle)
    }

    // ------------------------------------------------------------------
    // Local write-through
    // ------------------------------------------------------------------

    /// Stage one of the local user's own outgoing messages.
    ///
    /// The message stays pending (and unnumbered) until the confirmed
    /// copy arrives through [`apply_message`](Self::apply_message); no
    /// observer fires for staging, only for confirmation.
    pub fn record_local_message(&mut self, message: Message) -> Result<()> {
        if message.number().is_some() {
            return Err(CoreError::InvalidArgument(
                "locally staged messages must be unnumbered".into(),
            ));
        }
        if self.pending.contains(&message) {
            return Err(CoreError::DuplicateMessage);
        }
        self.pending.push(message);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delta application
    // ------------------------------------------------------------------

    /// Apply a confirmed new message.
    ///
    /// The message must carry its server-assigned number. Re-applying a
    /// number the mirror already holds is a no-op (polls may overlap);
    /// a matching pending local copy is reconciled away.
    pub fn apply_message(&mut self, message: Message) -> Result<()> {
        let number = message.number().ok_or_else(|| {
            CoreError::InvalidArgument("delta message without an assigned number".into())
        })?;
        let date = message.sent_date();

        let per_day = self.messages.entry(date).or_default();
        if per_day.contains_key(&number) {
            return Ok(());
        }

        self.pending.retain(|staged| *staged != message);
        per_day.insert(number, message.clone());

        let cursor = self.message_cursors.entry(date).or_insert(0);
        *cursor = (*cursor).max(number);

        debug!(
            conversation = self.conversation_number,
            number, %date, "mirror applied message"
        );
        self.observers.notify(&ConversationEvent::MessageAdded(message));
        Ok(())
    }

    /// Apply a confirmed message removal, matching by content.
    pub fn apply_message_removed(&mut self, message: &Message) -> Result<()> {
        let per_day = self
            .messages
            .get_mut(&message.sent_date())
            .ok_or(CoreError::MessageNotFound)?;
        let number = per_day
            .iter()
            .find(|(_, stored)| *stored == message)
            .map(|(number, _)| *number)
            .ok_or(CoreError::MessageNotFound)?;

        let removed = per_day.remove(&number).ok_or(CoreError::MessageNotFound)?;
        self.observers
            .notify(&ConversationEvent::MessageRemoved(removed));
        Ok(())
    }

    /// Apply a confirmed new member. Idempotent on the member number.
    pub fn apply_member_added(&mut self, member: Member) {
        if self.members.contains_key(&member.member_number) {
            return;
        }
        self.last_member_number = self.last_member_number.max(member.member_number);
        self.members.insert(member.member_number, member.clone());
        self.observers.notify(&ConversationEvent::MemberAdded(member));
    }

    /// Apply a confirmed member removal.
    ///
    /// Advances the deleted cursor even when the member was never in
    /// this mirror (the tombstone may predate the snapshot).
    pub fn apply_member_removed(&mut self, tombstone: Tombstone) {
        self.last_deleted_number = self.last_deleted_number.max(tombstone.deleted_number);
        if let Some(member) = self.members.remove(&tombstone.member.member_number) {
            self.observers
                .notify(&ConversationEvent::MemberRemoved(member));
        }
    }

    /// Apply a confirmed rename.
    pub fn apply_renamed(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name == self.name {
            return;
        }
        self.name = name.clone();
        self.observers.notify(&ConversationEvent::Renamed(name));
    }

    // ------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------

    /// Build the delta query for `date` from the mirror's cursors.
    pub fn sync_request(&self, date: NaiveDate, acting_username: impl Into<String>) -> SyncRequest {
        SyncRequest {
            conversation_number: self.conversation_number,
            date,
            last_message_number: self.last_message_number(date),
            last_member_number: self.last_member_number,
            last_deleted_member_number: self.last_deleted_number,
            acting_username: acting_username.into(),
        }
    }

    /// Apply everything a sync response carries.
    pub fn apply_sync_response(&mut self, response: SyncResponse) -> Result<()> {
        for message in response.new_messages {
            self.apply_message(message)?;
        }
        for member in response.new_members {
            self.apply_member_added(member);
        }
        for tombstone in response.removed_members {
            self.apply_member_removed(tombstone);
        }
        Ok(())
    }
}
