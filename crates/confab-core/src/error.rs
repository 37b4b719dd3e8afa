use chrono::NaiveDate;
use thiserror::Error;

/// Errors produced by the synchronization core.
///
/// All of these are synchronous failures returned to the immediate caller;
/// none are retried internally. Batch operations are atomic: on error,
/// nothing was applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A required field was empty or otherwise malformed. Always a local
    /// caller bug, never a retryable condition.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The acting user is not currently an active member of the
    /// conversation.
    #[error("'{0}' is not a member of this conversation")]
    NotMember(String),

    /// Attempted to add a username that is already an active member.
    #[error("'{0}' is already a member of this conversation")]
    DuplicateMember(String),

    /// Attempted to add a message equal (by sender, text, date and time)
    /// to one already stored.
    #[error("An equal message is already present in the log")]
    DuplicateMessage,

    /// The target member is not active in the registry.
    #[error("Member '{0}' not found")]
    MemberNotFound(String),

    /// The target message is not present in the log.
    #[error("Message not found in the log")]
    MessageNotFound,

    /// No message log exists for the given date.
    #[error("No message log exists for {0}")]
    MessageLogNotFound(NaiveDate),

    /// No conversation is registered under the given number.
    #[error("Conversation {0} not found")]
    ConversationNotFound(u64),

    /// The date lies strictly in the future.
    #[error("Date {0} lies in the future")]
    InvalidDate(NaiveDate),

    /// A batch add was rejected because this username is already present.
    /// The whole batch was left unapplied.
    #[error("Could not add members: '{0}' is already a member")]
    CouldNotAddMember(String),

    /// A batch remove was rejected because this username is not present.
    /// The whole batch was left unapplied.
    #[error("Could not remove members: '{0}' is not a member")]
    CouldNotRemoveMember(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
