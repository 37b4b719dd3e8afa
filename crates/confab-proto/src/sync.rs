//! The polled delta-query contract.
//!
//! Clients poll; the server never pushes. A request names the client's
//! current cursors and the date whose messages it wants to advance
//! (message deltas are date-scoped; membership deltas are not).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use confab_core::{Member, Message, Tombstone};

/// "Everything new since these cursors", for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncRequest {
    pub conversation_number: u64,
    /// The date whose message log to diff against `last_message_number`.
    pub date: NaiveDate,
    pub last_message_number: u64,
    pub last_member_number: u64,
    pub last_deleted_member_number: u64,
    pub acting_username: String,
}

/// The server's answer. Any subset may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResponse {
    pub new_messages: Vec<Message>,
    pub new_members: Vec<Member>,
    pub removed_members: Vec<Tombstone>,
}

impl SyncResponse {
    pub fn is_empty(&self) -> bool {
        self.new_messages.is_empty()
            && self.new_members.is_empty()
            && self.removed_members.is_empty()
    }
}
