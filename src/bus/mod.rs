//! Bus Layer - transport seam between the client and the messaging daemon
//!
//! This module provides:
//! - Trait seams for the underlying IPC transport (`Transport`, `BusConnection`, `BusProxy`)
//! - Raw inbound event payloads as delivered by the bus
//! - A subscription guard released deterministically at teardown
//! - An in-memory mock bus for tests
//!
//! The wire protocol itself is out of scope; a real backend implements these
//! traits on top of its D-Bus bindings, and the rest of the crate only ever
//! talks to the traits.

pub mod events;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

pub use events::{BusEvent, MessageReceived, MessageReceivedV2};
pub use mock::{MockBus, ProxyCall};

/// Which bus the session is opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusScope {
    /// Per-user session bus.
    Session,
    /// System-wide bus.
    System,
}

impl BusScope {
    /// Scope name as it appears in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            BusScope::Session => "session",
            BusScope::System => "system",
        }
    }
}

/// Factory for bus connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection on the given bus scope.
    async fn open(&self, scope: BusScope) -> Result<Box<dyn BusConnection>>;
}

/// One open bus connection.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// Resolve the daemon interface proxy at a destination and object path.
    async fn proxy(&self, destination: &str, object_path: &str) -> Result<Arc<dyn BusProxy>>;

    /// Bind inbound events to `events`. The returned guard unbinds on release
    /// (or on drop, whichever comes first).
    async fn subscribe(&self, events: mpsc::Sender<BusEvent>) -> Result<Subscription>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

/// The daemon interface: method calls addressed to the messaging service.
///
/// Timestamps cross this boundary in the transport's wide unsigned form;
/// narrowing to i64 milliseconds happens on our side of the seam.
#[async_trait]
pub trait BusProxy: Send + Sync {
    /// Send a message to the given recipients, returning the daemon-assigned
    /// timestamp.
    async fn send_message(
        &self,
        content: &str,
        attachments: &[String],
        recipients: &[String],
    ) -> Result<u64>;

    /// Start or stop the typing indicator for a recipient or group.
    async fn send_typing(&self, target: &str, stop: bool) -> Result<()>;

    /// Reset the end-to-end session with the given recipients.
    async fn send_end_session(&self, recipients: &[String]) -> Result<()>;

    /// Lightweight status query, used only as a liveness probe.
    async fn get_registration_status(&self) -> Result<()>;
}

/// Guard for an event subscription.
///
/// Holds the unbind hook handed back by the transport at bind time. The hook
/// runs exactly once: on explicit `release()` or on drop, so teardown cannot
/// leak a listener on any exit path.
pub struct Subscription {
    unbind: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap an unbind hook.
    pub fn new(unbind: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unbind: Some(Box::new(unbind)),
        }
    }

    /// A subscription with nothing to unbind.
    pub fn noop() -> Self {
        Self { unbind: None }
    }

    /// Release the subscription now.
    pub fn release(mut self) {
        if let Some(unbind) = self.unbind.take() {
            unbind();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unbind) = self.unbind.take() {
            unbind();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("bound", &self.unbind.is_some())
            .finish()
    }
}
