//! # confab-proto
//!
//! The boundary contracts between clients and the server: the one-time
//! snapshot transfer, the polled delta-query request/response pair, the
//! mutation request enum and its reply enum, and the length-prefixed
//! bincode frame codec both sides share.
//!
//! Everything here is a plain serde value object; the transport that
//! carries the frames lives in `confab-server` / `confab-client`.

pub mod frame;
pub mod request;
pub mod snapshot;
pub mod sync;

pub use frame::{read_frame, write_frame, WireError, MAX_FRAME_LEN};
pub use request::{ClientRequest, ErrorKind, ServerResponse};
pub use snapshot::{ConversationSnapshot, MessageLogSnapshot};
pub use sync::{SyncRequest, SyncResponse};
