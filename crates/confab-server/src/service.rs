//! Request dispatch.
//!
//! One synchronous function from [`ClientRequest`] to [`ServerResponse`].
//! Every conversation-scoped operation -- delta queries included -- runs
//! with that conversation's lock held for its whole duration, so replies
//! are never built from a torn view of the registry. Core failures
//! become typed error replies; they never tear down the connection.

use std::sync::PoisonError;

use tracing::debug;

use confab_core::{Conversation, CoreError};
use confab_proto::{ClientRequest, ConversationSnapshot, ServerResponse, SyncRequest, SyncResponse};

use crate::registry::SharedRegistry;

/// Handle one request against the shared register.
pub fn handle_request(registry: &SharedRegistry, request: ClientRequest) -> ServerResponse {
    match request {
        ClientRequest::CreateConversation {
            name,
            initial_members,
            acting_username,
        } => {
            // The creator is not a member of anything yet; the gate here
            // is that they must be on the initial list themselves.
            if !initial_members.iter().any(|m| *m == acting_username) {
                return ServerResponse::from_core_error(&CoreError::NotMember(acting_username));
            }
            match registry.create_conversation(name, initial_members) {
                Ok(number) => ServerResponse::Created {
                    conversation_number: number,
                },
                Err(err) => ServerResponse::from_core_error(&err),
            }
        }

        ClientRequest::Subscribe {
            conversation_number,
            acting_username,
        } => with_conversation(registry, conversation_number, |conversation| {
            require_member(conversation, &acting_username)?;
            debug!(conversation = conversation_number, user = %acting_username, "snapshot transfer");
            Ok(ServerResponse::Snapshot(ConversationSnapshot::capture(
                conversation,
            )))
        }),

        ClientRequest::AddMember {
            conversation_number,
            username,
            acting_username,
        } => with_conversation(registry, conversation_number, |conversation| {
            let member = conversation.add_member(&username, &acting_username)?;
            Ok(ServerResponse::MemberAdded(member))
        }),

        ClientRequest::AddMembers {
            conversation_number,
            usernames,
            acting_username,
        } => with_conversation(registry, conversation_number, |conversation| {
            conversation.add_all_members(&usernames, &acting_username)?;
            Ok(ServerResponse::MembersAdded)
        }),

        ClientRequest::RemoveMember {
            conversation_number,
            username,
            acting_username,
        } => with_conversation(registry, conversation_number, |conversation| {
            conversation.remove_member(&username, &acting_username)?;
            Ok(ServerResponse::MemberRemoved)
        }),

        ClientRequest::RemoveMembers {
            conversation_number,
            usernames,
            acting_username,
        } => with_conversation(registry, conversation_number, |conversation| {
            conversation.remove_all_members(&usernames, &acting_username)?;
            Ok(ServerResponse::MembersRemoved)
        }),

        ClientRequest::AddMessage {
            conversation_number,
            message,
        } => with_conversation(registry, conversation_number, |conversation| {
            let number = conversation.add_message(message)?;
            Ok(ServerResponse::MessageAdded { number })
        }),

        ClientRequest::AddMessages {
            conversation_number,
            messages,
        } => with_conversation(registry, conversation_number, |conversation| {
            let numbers = conversation.add_messages_same_date(messages)?;
            Ok(ServerResponse::MessagesAdded { numbers })
        }),

        ClientRequest::RemoveMessage {
            conversation_number,
            message,
            acting_username,
        } => with_conversation(registry, conversation_number, |conversation| {
            conversation.remove_message(&message, &acting_username)?;
            Ok(ServerResponse::MessageRemoved)
        }),

        ClientRequest::Rename {
            conversation_number,
            name,
            acting_username,
        } => with_conversation(registry, conversation_number, |conversation| {
            require_member(conversation, &acting_username)?;
            conversation.rename(name);
            Ok(ServerResponse::Renamed)
        }),

        ClientRequest::DeleteConversation {
            conversation_number,
            acting_username,
        } => {
            let gate = with_conversation(registry, conversation_number, |conversation| {
                require_member(conversation, &acting_username)?;
                Ok(ServerResponse::Deleted)
            });
            if !matches!(gate, ServerResponse::Deleted) {
                return gate;
            }
            match registry.remove_conversation(conversation_number) {
                Ok(()) => ServerResponse::Deleted,
                Err(err) => ServerResponse::from_core_error(&err),
            }
        }

        ClientRequest::Sync(sync) => handle_sync(registry, sync),
    }
}

fn handle_sync(registry: &SharedRegistry, sync: SyncRequest) -> ServerResponse {
    with_conversation(registry, sync.conversation_number, |conversation| {
        // All three delta queries under one lock hold: the response is a
        // consistent cut of the conversation's state.
        let new_messages = conversation.check_for_new_messages_on_date(
            sync.date,
            sync.last_message_number,
            &sync.acting_username,
        )?;
        let new_members =
            conversation.check_for_new_members(sync.last_member_number, &sync.acting_username)?;
        let removed_members = conversation.check_for_deleted_members(
            sync.last_deleted_member_number,
            &sync.acting_username,
        )?;

        Ok(ServerResponse::Sync(SyncResponse {
            new_messages,
            new_members,
            removed_members,
        }))
    })
}

/// Look up the conversation, lock it, run `op`, map failures to error
/// replies.
fn with_conversation<F>(registry: &SharedRegistry, number: u64, op: F) -> ServerResponse
where
    F: FnOnce(&mut Conversation) -> Result<ServerResponse, CoreError>,
{
    let slot = match registry.conversation(number) {
        Ok(slot) => slot,
        Err(err) => return ServerResponse::from_core_error(&err),
    };

    let mut conversation = slot.lock().unwrap_or_else(PoisonError::into_inner);
    match op(&mut conversation) {
        Ok(reply) => reply,
        Err(err) => ServerResponse::from_core_error(&err),
    }
}

fn require_member(conversation: &Conversation, acting_username: &str) -> Result<(), CoreError> {
    if conversation.members().is_active(acting_username) {
        Ok(())
    } else {
        Err(CoreError::NotMember(acting_username.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use confab_core::Message;
    use confab_proto::ErrorKind;

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn message(from: &str, text: &str, hour: u32) -> Message {
        Message::new(
            from,
            text,
            today(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn setup() -> (SharedRegistry, u64) {
        let registry = SharedRegistry::new();
        let reply = handle_request(
            &registry,
            ClientRequest::CreateConversation {
                name: "planning".into(),
                initial_members: vec!["alice".into(), "bob".into()],
                acting_username: "alice".into(),
            },
        );
        match reply {
            ServerResponse::Created {
                conversation_number,
            } => (registry, conversation_number),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    fn error_kind(reply: ServerResponse) -> ErrorKind {
        match reply {
            ServerResponse::Error { kind, .. } => kind,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn creator_must_be_on_initial_list() {
        let registry = SharedRegistry::new();
        let reply = handle_request(
            &registry,
            ClientRequest::CreateConversation {
                name: String::new(),
                initial_members: vec!["alice".into()],
                acting_username: "mallory".into(),
            },
        );
        assert_eq!(error_kind(reply), ErrorKind::NotMember);
        assert!(registry.is_empty());
    }

    #[test]
    fn subscribe_returns_a_consistent_snapshot() {
        let (registry, number) = setup();
        handle_request(
            &registry,
            ClientRequest::AddMessage {
                conversation_number: number,
                message: message("alice", "hello", 9),
            },
        );

        let reply = handle_request(
            &registry,
            ClientRequest::Subscribe {
                conversation_number: number,
                acting_username: "bob".into(),
            },
        );
        match reply {
            ServerResponse::Snapshot(snapshot) => {
                assert_eq!(snapshot.conversation_number, number);
                assert_eq!(snapshot.name, "planning");
                assert_eq!(snapshot.members.len(), 2);
                assert_eq!(snapshot.logs.len(), 1);
                assert_eq!(snapshot.logs[0].messages.len(), 1);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn subscribe_gated_on_membership() {
        let (registry, number) = setup();
        let reply = handle_request(
            &registry,
            ClientRequest::Subscribe {
                conversation_number: number,
                acting_username: "mallory".into(),
            },
        );
        assert_eq!(error_kind(reply), ErrorKind::NotMember);
    }

    #[test]
    fn unknown_conversation_reported_as_such() {
        let (registry, _) = setup();
        let reply = handle_request(
            &registry,
            ClientRequest::Subscribe {
                conversation_number: 999,
                acting_username: "alice".into(),
            },
        );
        assert_eq!(error_kind(reply), ErrorKind::ConversationNotFound);
    }

    #[test]
    fn message_flow_with_sync_delta() {
        let (registry, number) = setup();

        let reply = handle_request(
            &registry,
            ClientRequest::AddMessage {
                conversation_number: number,
                message: message("alice", "one", 9),
            },
        );
        assert_eq!(reply, ServerResponse::MessageAdded { number: 1 });

        handle_request(
            &registry,
            ClientRequest::AddMessage {
                conversation_number: number,
                message: message("bob", "two", 10),
            },
        );

        let reply = handle_request(
            &registry,
            ClientRequest::Sync(SyncRequest {
                conversation_number: number,
                date: today(),
                last_message_number: 1,
                last_member_number: 2,
                last_deleted_member_number: 0,
                acting_username: "alice".into(),
            }),
        );
        match reply {
            ServerResponse::Sync(sync) => {
                assert_eq!(sync.new_messages.len(), 1);
                assert_eq!(sync.new_messages[0].text(), "two");
                assert!(sync.new_members.is_empty());
                assert!(sync.removed_members.is_empty());
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn sync_carries_membership_deltas() {
        let (registry, number) = setup();
        handle_request(
            &registry,
            ClientRequest::AddMember {
                conversation_number: number,
                username: "carol".into(),
                acting_username: "alice".into(),
            },
        );
        handle_request(
            &registry,
            ClientRequest::RemoveMember {
                conversation_number: number,
                username: "bob".into(),
                acting_username: "alice".into(),
            },
        );

        let reply = handle_request(
            &registry,
            ClientRequest::Sync(SyncRequest {
                conversation_number: number,
                date: today(),
                last_message_number: 0,
                last_member_number: 2,
                last_deleted_member_number: 0,
                acting_username: "alice".into(),
            }),
        );
        match reply {
            ServerResponse::Sync(sync) => {
                assert_eq!(sync.new_members.len(), 1);
                assert_eq!(sync.new_members[0].username, "carol");
                assert_eq!(sync.new_members[0].member_number, 3);
                assert_eq!(sync.removed_members.len(), 1);
                assert_eq!(sync.removed_members[0].member.username, "bob");
                assert_eq!(sync.removed_members[0].deleted_number, 1);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn sync_before_first_post_today_is_empty_not_an_error() {
        let (registry, number) = setup();
        let reply = handle_request(
            &registry,
            ClientRequest::Sync(SyncRequest {
                conversation_number: number,
                date: today(),
                last_message_number: 0,
                last_member_number: 2,
                last_deleted_member_number: 0,
                acting_username: "bob".into(),
            }),
        );
        match reply {
            ServerResponse::Sync(sync) => assert!(sync.is_empty()),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn batch_member_add_is_atomic_through_the_service() {
        let (registry, number) = setup();
        let reply = handle_request(
            &registry,
            ClientRequest::AddMembers {
                conversation_number: number,
                usernames: vec!["carol".into(), "bob".into()],
                acting_username: "alice".into(),
            },
        );
        assert_eq!(error_kind(reply), ErrorKind::CouldNotAddMember);

        // Nothing was applied: the snapshot still shows two members.
        let reply = handle_request(
            &registry,
            ClientRequest::Subscribe {
                conversation_number: number,
                acting_username: "alice".into(),
            },
        );
        match reply {
            ServerResponse::Snapshot(snapshot) => assert_eq!(snapshot.members.len(), 2),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn rename_and_delete_are_member_gated() {
        let (registry, number) = setup();

        let reply = handle_request(
            &registry,
            ClientRequest::Rename {
                conversation_number: number,
                name: "sprint".into(),
                acting_username: "mallory".into(),
            },
        );
        assert_eq!(error_kind(reply), ErrorKind::NotMember);

        let reply = handle_request(
            &registry,
            ClientRequest::DeleteConversation {
                conversation_number: number,
                acting_username: "mallory".into(),
            },
        );
        assert_eq!(error_kind(reply), ErrorKind::NotMember);
        assert_eq!(registry.len(), 1);

        let reply = handle_request(
            &registry,
            ClientRequest::DeleteConversation {
                conversation_number: number,
                acting_username: "bob".into(),
            },
        );
        assert_eq!(reply, ServerResponse::Deleted);
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_message_is_a_typed_reply() {
        let (registry, number) = setup();
        handle_request(
            &registry,
            ClientRequest::AddMessage {
                conversation_number: number,
                message: message("alice", "hello", 9),
            },
        );
        let reply = handle_request(
            &registry,
            ClientRequest::AddMessage {
                conversation_number: number,
                message: message("alice", "hello", 9),
            },
        );
        assert_eq!(error_kind(reply), ErrorKind::DuplicateMessage);
    }
}
