//! Typed message records and timestamp normalization.
//!
//! The transport delivers timestamps as wide unsigned integers; everything
//! above the bus layer works with i64 milliseconds since epoch, which chrono
//! and ordinary date arithmetic can handle. The narrowing is explicit and
//! saturating, never a silent cast.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::conversation::Conversation;

/// Narrow a wide transport timestamp to i64 milliseconds.
///
/// Values past `i64::MAX` clamp rather than fail: a nonsense timestamp from a
/// remote sender should not poison an otherwise valid message.
pub fn normalize_timestamp(raw: u64) -> i64 {
    i64::try_from(raw).unwrap_or(i64::MAX)
}

/// A received legacy message. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Message {
    /// Milliseconds since epoch, as assigned by the sending side.
    pub timestamp: i64,
    /// Sender identifier.
    pub sender: String,
    /// Resolved conversation handle, shared with the cache.
    pub conversation: Arc<Conversation>,
    /// Message text; empty when the payload carried none.
    pub content: String,
    /// Attachment paths on the daemon host.
    pub attachments: Vec<String>,
}

impl Message {
    /// Timestamp as a calendar datetime, if it falls in chrono's range.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// A received v2 message. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct MessageV2 {
    /// Milliseconds since epoch, as assigned by the sending side.
    pub timestamp: i64,
    /// Sender identifier.
    pub sender: String,
    /// Resolved conversation handle, shared with the cache.
    pub conversation: Arc<Conversation>,
    /// Message text; empty when the payload carried none.
    pub content: String,
    /// Heterogeneous metadata entries (stickers, shared contacts, ...).
    pub extras: Vec<Value>,
}

impl MessageV2 {
    /// Timestamp as a calendar datetime, if it falls in chrono's range.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}
