//! A conversation: one member registry plus date-keyed message logs.
//!
//! The conversation is the routing layer. It validates dates and
//! membership, creates logs lazily (never for a future date) and
//! delegates to the [`MemberRegistry`] or the matching [`MessageLog`].
//! It is also the unit of concurrency control: the server wraps each
//! conversation in its own mutex, so everything here is plain `&mut`.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::member::{Member, MemberRegistry, Tombstone};
use crate::message::Message;
use crate::message_log::MessageLog;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A multi-party message thread with a stable numeric identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    number: u64,
    /// Empty means "unnamed" -- display falls back to the member list.
    name: String,
    date_created: NaiveDate,
    members: MemberRegistry,
    logs: BTreeMap<NaiveDate, MessageLog>,
}

impl Conversation {
    /// Create a conversation with an initial non-empty member list.
    ///
    /// The number is assigned by the owning register and is immutable;
    /// the name may be empty.
    pub fn new<I, S>(number: u64, name: impl Into<String>, initial_members: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            number,
            name: name.into(),
            date_created: today(),
            members: MemberRegistry::new(initial_members)?,
            logs: BTreeMap::new(),
        })
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date_created(&self) -> NaiveDate {
        self.date_created
    }

    /// Replace the conversation name. An empty name reverts the
    /// conversation to displaying its member list.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        debug!(conversation = self.number, name = %self.name, "conversation renamed");
    }

    /// The name if one is set, otherwise the comma-joined active member
    /// list.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.members
                .active_members()
                .map(|m| m.username.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            self.name.clone()
        }
    }

    /// Read access to the member registry.
    pub fn members(&self) -> &MemberRegistry {
        &self.members
    }

    /// Dates that currently have a log, ascending.
    pub fn log_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.logs.keys().copied()
    }

    /// The log for `date`, if one exists.
    pub fn log(&self, date: NaiveDate) -> Option<&MessageLog> {
        self.logs.get(&date)
    }

    // ------------------------------------------------------------------
    // Message operations
    // ------------------------------------------------------------------

    /// Return the log for `date`, creating it if absent.
    ///
    /// A log is only ever created for today or an earlier day; dates
    /// strictly after today fail with [`CoreError::InvalidDate`]
    /// regardless of whether a log exists.
    pub fn get_or_create_log(
        &mut self,
        date: NaiveDate,
        acting_username: &str,
    ) -> Result<&mut MessageLog> {
        self.members.require_active(acting_username)?;
        if date > today() {
            return Err(CoreError::InvalidDate(date));
        }
        Ok(self
            .logs
            .entry(date)
            .or_insert_with(|| MessageLog::new(date)))
    }

    /// Validate and append a single message to the log matching its date.
    ///
    /// The sender must be an active member; the date must not lie in the
    /// future. Returns the assigned message number.
    pub fn add_message(&mut self, message: Message) -> Result<u64> {
        let sender = message.from_username().to_string();
        let log = self.get_or_create_log(message.sent_date(), &sender)?;
        log.add_message(message)
    }

    /// Append a batch of messages sharing one date, all or nothing.
    ///
    /// Fails the whole batch if the list is empty, if the dates differ,
    /// if any sender is not a member, if any message is already numbered,
    /// or if any message duplicates a stored one (or another batch
    /// entry). On error nothing was applied.
    pub fn add_messages_same_date(&mut self, messages: Vec<Message>) -> Result<Vec<u64>> {
        let first = messages
            .first()
            .ok_or_else(|| CoreError::InvalidArgument("empty message batch".into()))?;
        let date = first.sent_date();

        for message in &messages {
            if message.sent_date() != date {
                return Err(CoreError::InvalidArgument(
                    "batch mixes messages from different dates".into(),
                ));
            }
            if message.number().is_some() {
                return Err(CoreError::InvalidArgument(
                    "message has already been assigned a number".into(),
                ));
            }
            self.members.require_active(message.from_username())?;
        }
        for (i, message) in messages.iter().enumerate() {
            if messages[..i].contains(message) {
                return Err(CoreError::DuplicateMessage);
            }
        }

        let acting = first.from_username().to_string();
        let log = self.get_or_create_log(date, &acting)?;
        if !log.all_new_messages(&messages) {
            return Err(CoreError::DuplicateMessage);
        }

        let mut numbers = Vec::with_capacity(messages.len());
        for message in messages {
            numbers.push(log.add_message(message)?);
        }
        Ok(numbers)
    }

    /// Remove the stored message equal (by content) to `message`.
    ///
    /// Fails with [`CoreError::MessageLogNotFound`] if no log exists for
    /// the message's date.
    pub fn remove_message(&mut self, message: &Message, acting_username: &str) -> Result<()> {
        self.members.require_active(acting_username)?;
        let log = self
            .logs
            .get_mut(&message.sent_date())
            .ok_or(CoreError::MessageLogNotFound(message.sent_date()))?;
        log.remove_message(message)?;
        Ok(())
    }

    /// Messages on `date` with a number strictly greater than `last_seen`.
    ///
    /// If no log exists for `date`, the query still succeeds (with an
    /// empty result) when `date` is today and `last_seen` is 0: a client
    /// polling today before anyone has posted is consistent with zero
    /// known messages, not an error. Any other dateless case fails with
    /// [`CoreError::MessageLogNotFound`].
    pub fn check_for_new_messages_on_date(
        &self,
        date: NaiveDate,
        last_seen: u64,
        acting_username: &str,
    ) -> Result<Vec<Message>> {
        self.members.require_active(acting_username)?;
        match self.logs.get(&date) {
            Some(log) => Ok(log.check_for_new_messages(last_seen)),
            None if date == today() && last_seen == 0 => Ok(Vec::new()),
            None => Err(CoreError::MessageLogNotFound(date)),
        }
    }

    // ------------------------------------------------------------------
    // Member operations (delegated to the registry)
    // ------------------------------------------------------------------

    pub fn add_member(&mut self, username: &str, acting_username: &str) -> Result<Member> {
        self.members
            .add_member(username, acting_username)
            .map(Member::clone)
    }

    pub fn remove_member(&mut self, username: &str, acting_username: &str) -> Result<()> {
        self.members.remove_member(username, acting_username)
    }

    pub fn add_all_members<S: AsRef<str>>(
        &mut self,
        usernames: &[S],
        acting_username: &str,
    ) -> Result<()> {
        self.members.add_all_members(usernames, acting_username)
    }

    pub fn remove_all_members<S: AsRef<str>>(
        &mut self,
        usernames: &[S],
        acting_username: &str,
    ) -> Result<()> {
        self.members.remove_all_members(usernames, acting_username)
    }

    pub fn check_for_new_members(
        &self,
        last_seen: u64,
        acting_username: &str,
    ) -> Result<Vec<Member>> {
        self.members.check_for_new_members(last_seen, acting_username)
    }

    pub fn check_for_deleted_members(
        &self,
        last_seen_deleted: u64,
        acting_username: &str,
    ) -> Result<Vec<Tombstone>> {
        self.members
            .check_for_deleted_members(last_seen_deleted, acting_username)
    }
}
