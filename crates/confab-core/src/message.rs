//! The message value type.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A single chat message.
///
/// Two messages are equal when sender, text, date and time all match --
/// the number is deliberately excluded so duplicate detection works
/// between an unnumbered local copy and the numbered copy the server
/// hands back. The number is assigned exactly once, by the
/// [`MessageLog`](crate::MessageLog) that stores the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    from_username: String,
    text: String,
    sent_date: NaiveDate,
    sent_time: NaiveTime,
    number: Option<u64>,
}

impl Message {
    /// Create an unnumbered message.
    ///
    /// Fails with [`CoreError::InvalidArgument`] if the sender or text is
    /// empty.
    pub fn new(
        from_username: impl Into<String>,
        text: impl Into<String>,
        sent_date: NaiveDate,
        sent_time: NaiveTime,
    ) -> Result<Self> {
        let from_username = from_username.into();
        let text = text.into();
        if from_username.trim().is_empty() {
            return Err(CoreError::InvalidArgument("empty sender username".into()));
        }
        if text.is_empty() {
            return Err(CoreError::InvalidArgument("empty message text".into()));
        }
        Ok(Self {
            from_username,
            text,
            sent_date,
            sent_time,
            number: None,
        })
    }

    /// Create a message that already carries its log-assigned number.
    ///
    /// Used when reconstructing state received from the authority (mirror
    /// building, test fixtures). Server-side code never numbers messages
    /// this way -- the log does.
    pub fn numbered(
        from_username: impl Into<String>,
        text: impl Into<String>,
        sent_date: NaiveDate,
        sent_time: NaiveTime,
        number: u64,
    ) -> Result<Self> {
        let mut message = Self::new(from_username, text, sent_date, sent_time)?;
        message.number = Some(number);
        Ok(message)
    }

    pub fn from_username(&self) -> &str {
        &self.from_username
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sent_date(&self) -> NaiveDate {
        self.sent_date
    }

    pub fn sent_time(&self) -> NaiveTime {
        self.sent_time
    }

    /// The log-assigned number, or `None` if the message has not been
    /// stored yet.
    pub fn number(&self) -> Option<u64> {
        self.number
    }

    pub(crate) fn assign_number(&mut self, number: u64) {
        debug_assert!(self.number.is_none());
        self.number = Some(number);
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.from_username == other.from_username
            && self.text == other.text
            && self.sent_date == other.sent_date
            && self.sent_time == other.sent_time
    }
}

impl Eq for Message {}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn time() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 30, 0).unwrap()
    }

    #[test]
    fn equality_ignores_number() {
        let unnumbered = Message::new("alice", "hi", date(), time()).unwrap();
        let numbered = Message::numbered("alice", "hi", date(), time(), 7).unwrap();
        assert_eq!(unnumbered, numbered);
    }

    #[test]
    fn equality_is_by_content() {
        let a = Message::new("alice", "hi", date(), time()).unwrap();
        let b = Message::new("alice", "yo", date(), time()).unwrap();
        let c = Message::new("bob", "hi", date(), time()).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_fields_rejected() {
        assert!(matches!(
            Message::new("", "hi", date(), time()),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            Message::new("alice", "", date(), time()),
            Err(CoreError::InvalidArgument(_))
        ));
    }
}
