//! Message types exchanged between the transport and the bot loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a message arrived in a direct chat or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadType {
    Direct,
    Group,
}

/// A message received from the messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel name ("whatsapp").
    pub channel: String,
    /// Sender address in the platform's wire format (digits, no `+`).
    pub sender_id: String,
    /// Display name, when the platform provides one.
    pub sender_name: Option<String>,
    /// Message text.
    pub content: String,
    /// True when the sender is the configured operator account.
    /// Management commands are only honored from the operator.
    pub from_operator: bool,
    pub thread_type: ThreadType,
    pub timestamp: DateTime<Utc>,
}

/// A message to deliver through the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Destination address in the platform's wire format.
    pub to: String,
    pub content: String,
}
