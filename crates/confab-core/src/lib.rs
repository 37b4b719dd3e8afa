//! # confab-core
//!
//! The conversation synchronization core: the data model and algorithms
//! that let many clients each hold a partial, possibly stale copy of a
//! conversation and catch up incrementally instead of re-transferring
//! everything.
//!
//! The building blocks, leaf first:
//!
//! - [`MemberRegistry`] -- who belongs to a conversation, with monotonic
//!   member numbers and tombstones for removed members
//! - [`MessageLog`] -- the per-calendar-day partition of a conversation's
//!   messages, with gapless message numbering
//! - [`Conversation`] -- owns one registry and a set of date-keyed logs,
//!   routing every operation through the membership gate
//!
//! Everything in this crate is synchronous and in-memory. Callers are
//! expected to serialize access per conversation (the server does this
//! with one mutex per conversation; client mirrors are single-writer).

pub mod conversation;
pub mod member;
pub mod message;
pub mod message_log;

mod error;

pub use conversation::Conversation;
pub use error::{CoreError, Result};
pub use member::{Member, MemberRegistry, Tombstone};
pub use message::Message;
pub use message_log::MessageLog;
