//! Message Decoder - raw bus payloads into typed message records.
//!
//! Pure and infallible: a malformed payload degrades to default field values
//! rather than an error. The conversation identifier is the base64 encoding
//! of the group id bytes when present, otherwise the sender identifier; the
//! handle is resolved through the cache, created on first sight.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::bus::{BusProxy, MessageReceived, MessageReceivedV2};
use crate::cache::ConversationCache;
use crate::conversation::Conversation;
use crate::message::{Message, MessageV2, normalize_timestamp};

/// Conversation identifier for a payload: base64 of the group bytes, or the
/// sender identifier for direct messages.
pub fn conversation_id(group_id: &[u8], sender: &str) -> String {
    if group_id.is_empty() {
        sender.to_string()
    } else {
        BASE64.encode(group_id)
    }
}

fn resolve(
    group_id: &[u8],
    sender: &str,
    cache: &ConversationCache,
    proxy: &Arc<dyn BusProxy>,
) -> Arc<Conversation> {
    let id = conversation_id(group_id, sender);
    cache.get_or_create(&id, || {
        if group_id.is_empty() {
            Conversation::direct(id.clone(), Arc::clone(proxy))
        } else {
            Conversation::group(id.clone(), Arc::clone(proxy))
        }
    })
}

/// Decode a legacy message payload.
pub fn legacy(
    raw: MessageReceived,
    cache: &ConversationCache,
    proxy: &Arc<dyn BusProxy>,
) -> Message {
    let conversation = resolve(&raw.group_id, &raw.author, cache, proxy);
    Message {
        timestamp: normalize_timestamp(raw.timestamp),
        sender: raw.author,
        conversation,
        content: raw.content.unwrap_or_default(),
        attachments: raw.attachments,
    }
}

/// Decode a v2 message payload.
pub fn v2(
    raw: MessageReceivedV2,
    cache: &ConversationCache,
    proxy: &Arc<dyn BusProxy>,
) -> MessageV2 {
    let conversation = resolve(&raw.group_id, &raw.sender, cache, proxy);
    MessageV2 {
        timestamp: normalize_timestamp(raw.timestamp),
        sender: raw.sender,
        conversation,
        content: raw.message.unwrap_or_default(),
        extras: raw.extras,
    }
}
