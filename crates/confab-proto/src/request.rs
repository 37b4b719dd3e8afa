//! Mutation requests and their replies.
//!
//! One enum per direction, bincode-framed. Errors cross the wire as a
//! kind plus a human-readable message; the kind is the stable part of
//! the contract.

use serde::{Deserialize, Serialize};

use confab_core::{CoreError, Member, Message};

use crate::snapshot::ConversationSnapshot;
use crate::sync::{SyncRequest, SyncResponse};

/// Everything a client can ask of the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientRequest {
    /// Create a conversation from an initial member list and an optional
    /// (possibly empty) name. The acting user must be in the list.
    CreateConversation {
        name: String,
        initial_members: Vec<String>,
        acting_username: String,
    },

    /// Fetch the full snapshot a mirror is built from.
    Subscribe {
        conversation_number: u64,
        acting_username: String,
    },

    AddMember {
        conversation_number: u64,
        username: String,
        acting_username: String,
    },

    AddMembers {
        conversation_number: u64,
        usernames: Vec<String>,
        acting_username: String,
    },

    RemoveMember {
        conversation_number: u64,
        username: String,
        acting_username: String,
    },

    RemoveMembers {
        conversation_number: u64,
        usernames: Vec<String>,
        acting_username: String,
    },

    /// The sender is the message's `from_username`; no separate acting
    /// user.
    AddMessage {
        conversation_number: u64,
        message: Message,
    },

    /// Batch insert; all messages must share one date. Atomic.
    AddMessages {
        conversation_number: u64,
        messages: Vec<Message>,
    },

    RemoveMessage {
        conversation_number: u64,
        message: Message,
        acting_username: String,
    },

    Rename {
        conversation_number: u64,
        name: String,
        acting_username: String,
    },

    DeleteConversation {
        conversation_number: u64,
        acting_username: String,
    },

    /// Polled delta query.
    Sync(SyncRequest),
}

/// The server's reply to a [`ClientRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServerResponse {
    Created { conversation_number: u64 },
    Snapshot(ConversationSnapshot),
    MemberAdded(Member),
    MembersAdded,
    MemberRemoved,
    MembersRemoved,
    MessageAdded { number: u64 },
    MessagesAdded { numbers: Vec<u64> },
    MessageRemoved,
    Renamed,
    Deleted,
    Sync(SyncResponse),
    Error { kind: ErrorKind, message: String },
}

impl ServerResponse {
    /// Build an error reply from a core failure.
    pub fn from_core_error(err: &CoreError) -> Self {
        Self::Error {
            kind: ErrorKind::from(err),
            message: err.to_string(),
        }
    }
}

/// Wire image of the core error taxonomy, plus the two kinds only the
/// boundary itself can produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotMember,
    DuplicateMember,
    DuplicateMessage,
    MemberNotFound,
    MessageNotFound,
    MessageLogNotFound,
    ConversationNotFound,
    InvalidDate,
    CouldNotAddMember,
    CouldNotRemoveMember,
    /// The request could not be decoded or was malformed at the frame
    /// level.
    BadRequest,
    /// Server-side failure unrelated to the request's content.
    Internal,
}

impl From<&CoreError> for ErrorKind {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::InvalidArgument(_) => Self::InvalidArgument,
            CoreError::NotMember(_) => Self::NotMember,
            CoreError::DuplicateMember(_) => Self::DuplicateMember,
            CoreError::DuplicateMessage => Self::DuplicateMessage,
            CoreError::MemberNotFound(_) => Self::MemberNotFound,
            CoreError::MessageNotFound => Self::MessageNotFound,
            CoreError::MessageLogNotFound(_) => Self::MessageLogNotFound,
            CoreError::ConversationNotFound(_) => Self::ConversationNotFound,
            CoreError::InvalidDate(_) => Self::InvalidDate,
            CoreError::CouldNotAddMember(_) => Self::CouldNotAddMember,
            CoreError::CouldNotRemoveMember(_) => Self::CouldNotRemoveMember,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn request_bincode_round_trip() {
        let request = ClientRequest::AddMessage {
            conversation_number: 3,
            message: Message::new(
                "alice",
                "hello",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            )
            .unwrap(),
        };

        let bytes = bincode::serialize(&request).unwrap();
        let restored: ClientRequest = bincode::deserialize(&bytes).unwrap();
        assert_eq!(request, restored);
    }

    #[test]
    fn core_errors_map_to_stable_kinds() {
        let err = CoreError::NotMember("mallory".into());
        let reply = ServerResponse::from_core_error(&err);
        match reply {
            ServerResponse::Error { kind, message } => {
                assert_eq!(kind, ErrorKind::NotMember);
                assert!(message.contains("mallory"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
