//! The per-calendar-day message log.
//!
//! A conversation keeps one [`MessageLog`] per day that has ever had a
//! message. Within a log, message numbers are strictly increasing and
//! gapless from 1, which makes "everything after N" delta queries exact.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::message::Message;

/// An append-only, ordered collection of one day's messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLog {
    date_made: NaiveDate,
    messages: BTreeMap<u64, Message>,
    last_message_number: u64,
}

impl MessageLog {
    /// Create an empty log for the given calendar day.
    pub fn new(date_made: NaiveDate) -> Self {
        Self {
            date_made,
            messages: BTreeMap::new(),
            last_message_number: 0,
        }
    }

    /// The calendar day every stored message belongs to.
    pub fn date_made(&self) -> NaiveDate {
        self.date_made
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Highest message number ever assigned by this log.
    pub fn last_message_number(&self) -> u64 {
        self.last_message_number
    }

    /// Stored messages in number order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Assign the next message number and append.
    ///
    /// Rejects a message dated on a different day than the log
    /// ([`CoreError::InvalidArgument`] -- the owning conversation routes
    /// by date before delegating), a message that already carries a
    /// number from an earlier insertion (also a caller bug), and a
    /// message equal by content to one already stored
    /// ([`CoreError::DuplicateMessage`]).
    pub fn add_message(&mut self, mut message: Message) -> Result<u64> {
        if message.sent_date() != self.date_made {
            return Err(CoreError::InvalidArgument(format!(
                "message dated {} routed to the log for {}",
                message.sent_date(),
                self.date_made
            )));
        }
        if message.number().is_some() {
            return Err(CoreError::InvalidArgument(
                "message has already been assigned a number".into(),
            ));
        }
        if self.contains(&message) {
            return Err(CoreError::DuplicateMessage);
        }

        self.last_message_number += 1;
        let number = self.last_message_number;
        message.assign_number(number);
        debug!(number, date = %self.date_made, "message appended");
        self.messages.insert(number, message);
        Ok(number)
    }

    /// Remove the stored message equal (by content) to `message`.
    pub fn remove_message(&mut self, message: &Message) -> Result<Message> {
        let number = self
            .messages
            .iter()
            .find(|(_, stored)| *stored == message)
            .map(|(number, _)| *number)
            .ok_or(CoreError::MessageNotFound)?;

        debug!(number, date = %self.date_made, "message removed");
        self.messages
            .remove(&number)
            .ok_or(CoreError::MessageNotFound)
    }

    // ------------------------------------------------------------------
    // Delta queries
    // ------------------------------------------------------------------

    /// All messages with a number strictly greater than `last_seen`, in
    /// ascending number order.
    pub fn check_for_new_messages(&self, last_seen: u64) -> Vec<Message> {
        self.messages
            .range(last_seen + 1..)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Batch duplicate pre-check: `false` if any message in `list` is
    /// equal (by content) to one already stored. Callers use this to
    /// reject a bulk insert atomically instead of applying it partially.
    pub fn all_new_messages(&self, list: &[Message]) -> bool {
        !list.iter().any(|candidate| self.contains(candidate))
    }

    fn contains(&self, message: &Message) -> bool {
        self.messages.values().any(|stored| stored == message)
    }
}
