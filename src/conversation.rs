//! Conversation handles - typed destinations for outbound calls.
//!
//! A conversation is either one peer (direct) or one group. Handles are
//! created by the decoder on first inbound sight, or by explicit lookup on
//! the client, and are shared as `Arc<Conversation>` through the cache so an
//! identifier always resolves to the same instance within a session.

use std::sync::Arc;

use crate::bus::BusProxy;
use crate::error::Result;
use crate::message::normalize_timestamp;

/// Direct peer or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    Direct,
    Group,
}

/// One logical message destination.
///
/// Holds the daemon proxy for the owning session; the handle outliving the
/// session only means sends start failing with transport errors.
pub struct Conversation {
    id: String,
    kind: ConversationKind,
    proxy: Arc<dyn BusProxy>,
}

impl Conversation {
    /// Direct conversation with a peer identifier.
    pub fn direct(id: impl Into<String>, proxy: Arc<dyn BusProxy>) -> Self {
        Self {
            id: id.into(),
            kind: ConversationKind::Direct,
            proxy,
        }
    }

    /// Group conversation with a base64 group identifier.
    pub fn group(id: impl Into<String>, proxy: Arc<dyn BusProxy>) -> Self {
        Self {
            id: id.into(),
            kind: ConversationKind::Group,
            proxy,
        }
    }

    /// Conversation identifier: peer id for direct, base64 group id for group.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ConversationKind {
        self.kind
    }

    pub fn is_group(&self) -> bool {
        self.kind == ConversationKind::Group
    }

    /// Recipient list for the transport's single-destination convention.
    fn recipients(&self) -> [String; 1] {
        [self.id.clone()]
    }

    /// Send a message to this conversation, returning the daemon-assigned
    /// timestamp in milliseconds.
    pub async fn send_message(&self, content: &str, attachments: &[String]) -> Result<i64> {
        let raw = self
            .proxy
            .send_message(content, attachments, &self.recipients())
            .await?;
        Ok(normalize_timestamp(raw))
    }

    /// Start or stop the typing indicator in this conversation.
    pub async fn send_typing(&self, stop: bool) -> Result<()> {
        self.proxy.send_typing(&self.id, stop).await
    }

    /// Reset the end-to-end session with this conversation.
    pub async fn reset_session(&self) -> Result<()> {
        self.proxy.send_end_session(&self.recipients()).await
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
