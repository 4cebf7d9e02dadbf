//! Raw inbound event payloads as the transport delivers them.
//!
//! Timestamps are still in the wide unsigned form here; group identifiers are
//! the raw bytes from the wire. Translation into typed messages happens in
//! the decoder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Legacy message event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceived {
    /// Daemon-assigned timestamp, milliseconds since epoch (wide form).
    pub timestamp: u64,
    /// Sender identifier.
    pub author: String,
    /// Raw group identifier bytes; empty for direct messages.
    #[serde(default)]
    pub group_id: Vec<u8>,
    /// Message text; daemons may omit it for attachment-only messages.
    #[serde(default)]
    pub content: Option<String>,
    /// Attachment paths on the daemon host.
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl MessageReceived {
    /// Create a direct (non-group) payload.
    pub fn direct(timestamp: u64, author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            timestamp,
            author: author.into(),
            group_id: Vec::new(),
            content: Some(content.into()),
            attachments: Vec::new(),
        }
    }

    /// Create a group payload.
    pub fn group(
        timestamp: u64,
        author: impl Into<String>,
        group_id: Vec<u8>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            author: author.into(),
            group_id,
            content: Some(content.into()),
            attachments: Vec::new(),
        }
    }
}

/// V2 message event payload. Carries heterogeneous extras (stickers, shared
/// contacts and similar metadata) instead of the legacy attachment list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceivedV2 {
    /// Daemon-assigned timestamp, milliseconds since epoch (wide form).
    pub timestamp: u64,
    /// Sender identifier.
    pub sender: String,
    /// Raw group identifier bytes; empty for direct messages.
    #[serde(default)]
    pub group_id: Vec<u8>,
    /// Message text.
    #[serde(default)]
    pub message: Option<String>,
    /// Heterogeneous metadata entries.
    #[serde(default)]
    pub extras: Vec<Value>,
}

impl MessageReceivedV2 {
    /// Create a direct (non-group) payload.
    pub fn direct(timestamp: u64, sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            sender: sender.into(),
            group_id: Vec::new(),
            message: Some(message.into()),
            extras: Vec::new(),
        }
    }

    /// Create a group payload.
    pub fn group(
        timestamp: u64,
        sender: impl Into<String>,
        group_id: Vec<u8>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            sender: sender.into(),
            group_id,
            message: Some(message.into()),
            extras: Vec::new(),
        }
    }
}

/// Everything the transport can push at us.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusEvent {
    /// Inbound legacy message.
    MessageReceived(MessageReceived),
    /// Inbound v2 message.
    MessageReceivedV2(MessageReceivedV2),
    /// Transport-level error. Non-fatal; the session stays up.
    Error(String),
}
