//! Snapshot transfer: the full state a client receives at subscribe time.
//!
//! A mirror is built exactly once from a snapshot and thereafter advanced
//! only by deltas, so the snapshot carries the registry cursors alongside
//! the data -- otherwise the first poll after subscribing could not name
//! a correct "last seen" position.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use confab_core::{Conversation, Member, Message};

/// One day's messages as transferred at subscribe time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageLogSnapshot {
    pub date: NaiveDate,
    /// Highest number the log has assigned -- the client's initial
    /// message cursor for this date.
    pub last_message_number: u64,
    pub messages: Vec<Message>,
}

/// The full state of a conversation at one instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub conversation_number: u64,
    pub name: String,
    pub date_created: NaiveDate,
    pub members: Vec<Member>,
    /// Initial member delta cursor.
    pub last_member_number: u64,
    /// Initial deleted-member delta cursor.
    pub last_deleted_number: u64,
    pub logs: Vec<MessageLogSnapshot>,
}

impl ConversationSnapshot {
    /// Capture the current state of a conversation.
    ///
    /// The caller holds the conversation's lock, so the snapshot is
    /// internally consistent.
    pub fn capture(conversation: &Conversation) -> Self {
        let members = conversation.members();
        Self {
            conversation_number: conversation.number(),
            name: conversation.name().to_string(),
            date_created: conversation.date_created(),
            members: members.active_members().cloned().collect(),
            last_member_number: members.last_member_number(),
            last_deleted_number: members.last_deleted_number(),
            logs: conversation
                .log_dates()
                .filter_map(|date| conversation.log(date))
                .map(|log| MessageLogSnapshot {
                    date: log.date_made(),
                    last_message_number: log.last_message_number(),
                    messages: log.messages().cloned().collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};

    #[test]
    fn capture_carries_cursors_and_data() {
        let mut conv = Conversation::new(7, "standup", ["alice", "bob"]).unwrap();
        conv.add_member("carol", "alice").unwrap();
        conv.remove_member("bob", "alice").unwrap();

        let today = Utc::now().date_naive();
        let msg = Message::new(
            "alice",
            "morning",
            today,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        )
        .unwrap();
        conv.add_message(msg).unwrap();

        let snapshot = ConversationSnapshot::capture(&conv);
        assert_eq!(snapshot.conversation_number, 7);
        assert_eq!(snapshot.name, "standup");
        assert_eq!(snapshot.members.len(), 2);
        assert_eq!(snapshot.last_member_number, 3);
        assert_eq!(snapshot.last_deleted_number, 1);
        assert_eq!(snapshot.logs.len(), 1);
        assert_eq!(snapshot.logs[0].date, today);
        assert_eq!(snapshot.logs[0].last_message_number, 1);
        assert_eq!(snapshot.logs[0].messages[0].number(), Some(1));
    }
}
