//! # confab-client
//!
//! The client side of the synchronization contract: non-authoritative
//! mirrors of server-held conversations, advanced only by applying
//! confirmed deltas, with synchronous change notification for UI-facing
//! observers.
//!
//! A mirror is built once from a [`ConversationSnapshot`] obtained at
//! subscribe time and never re-derives state on its own -- every later
//! change arrives through an `apply_*` call carrying a server-confirmed
//! delta. The one exception is write-through of the local user's own
//! outgoing messages, which are held as pending until the numbered copy
//! comes back in a sync response.
//!
//! [`ConversationSnapshot`]: confab_proto::ConversationSnapshot

pub mod connection;
pub mod mirror;
pub mod observer;
pub mod register;

pub use connection::{ClientError, Connection};
pub use mirror::ConversationMirror;
pub use observer::{ConversationEvent, Observers, SubscriptionHandle};
pub use register::PersonalRegister;
