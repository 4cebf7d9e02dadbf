//! In-memory mock bus for tests.
//!
//! Implements the full transport seam without any IPC: outbound calls are
//! recorded, probe outcomes can be scripted, and inbound events are injected
//! with [`MockBus::emit`]. Lives in the library (not behind `cfg(test)`) so
//! integration tests and downstream consumers can drive a client without a
//! running daemon.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::bus::{BusConnection, BusEvent, BusProxy, BusScope, Subscription, Transport};
use crate::error::{Result, SignalDbusError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned lock only means some test thread panicked mid-update; the
    // recorded state is still worth reading.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// One recorded outbound daemon call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyCall {
    SendMessage {
        content: String,
        attachments: Vec<String>,
        recipients: Vec<String>,
    },
    SendTyping {
        target: String,
        stop: bool,
    },
    SendEndSession {
        recipients: Vec<String>,
    },
    RegistrationStatus,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<ProxyCall>>,
    probe_failures: Mutex<VecDeque<String>>,
    next_timestamp: AtomicU64,
    refuse_open: AtomicBool,
    closed: AtomicBool,
    subscription_released: AtomicBool,
    events: Mutex<Option<mpsc::Sender<BusEvent>>>,
    opened: Mutex<Vec<BusScope>>,
    proxied: Mutex<Vec<(String, String)>>,
}

/// Scriptable in-memory bus.
#[derive(Clone, Default)]
pub struct MockBus {
    shared: Arc<Shared>,
}

impl MockBus {
    pub fn new() -> Self {
        let bus = Self::default();
        bus.shared.next_timestamp.store(1_700_000_000_000, Ordering::SeqCst);
        bus
    }

    /// Make the next `open` fail with a transport error.
    pub fn refuse_open(&self) {
        self.shared.refuse_open.store(true, Ordering::SeqCst);
    }

    /// Queue one probe failure with the given error body. Probes succeed once
    /// the queue is drained.
    pub fn fail_next_probe(&self, body: impl Into<String>) {
        lock(&self.shared.probe_failures).push_back(body.into());
    }

    /// Override the timestamp returned by the next send.
    pub fn set_send_timestamp(&self, timestamp: u64) {
        self.shared.next_timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Inject an inbound event. Returns false if nothing is subscribed or the
    /// event queue is full.
    pub fn emit(&self, event: BusEvent) -> bool {
        match lock(&self.shared.events).as_ref() {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// All recorded outbound calls, in order.
    pub fn calls(&self) -> Vec<ProxyCall> {
        lock(&self.shared.calls).clone()
    }

    /// How many liveness probes have been issued.
    pub fn probe_count(&self) -> usize {
        lock(&self.shared.calls)
            .iter()
            .filter(|c| matches!(c, ProxyCall::RegistrationStatus))
            .count()
    }

    /// Scopes passed to `open`, in order.
    pub fn opened_scopes(&self) -> Vec<BusScope> {
        lock(&self.shared.opened).clone()
    }

    /// (destination, object path) pairs passed to `proxy`, in order.
    pub fn proxied(&self) -> Vec<(String, String)> {
        lock(&self.shared.proxied).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn subscription_released(&self) -> bool {
        self.shared.subscription_released.load(Ordering::SeqCst)
    }

    /// A standalone proxy over this bus, for tests that exercise send paths
    /// without going through `open`/`subscribe`.
    pub fn proxy(&self) -> Arc<MockProxy> {
        Arc::new(MockProxy {
            shared: Arc::clone(&self.shared),
        })
    }
}

#[async_trait]
impl Transport for MockBus {
    async fn open(&self, scope: BusScope) -> Result<Box<dyn BusConnection>> {
        if self.shared.refuse_open.swap(false, Ordering::SeqCst) {
            return Err(SignalDbusError::Transport("bus unavailable".to_string()));
        }
        lock(&self.shared.opened).push(scope);
        self.shared.closed.store(false, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockConnection {
    shared: Arc<Shared>,
}

#[async_trait]
impl BusConnection for MockConnection {
    async fn proxy(&self, destination: &str, object_path: &str) -> Result<Arc<dyn BusProxy>> {
        lock(&self.shared.proxied).push((destination.to_string(), object_path.to_string()));
        Ok(Arc::new(MockProxy {
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn subscribe(&self, events: mpsc::Sender<BusEvent>) -> Result<Subscription> {
        *lock(&self.shared.events) = Some(events);
        self.shared.subscription_released.store(false, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        Ok(Subscription::new(move || {
            *lock(&shared.events) = None;
            shared.subscription_released.store(true, Ordering::SeqCst);
        }))
    }

    async fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }
}

/// Recording proxy handed out by [`MockBus`].
pub struct MockProxy {
    shared: Arc<Shared>,
}

impl MockProxy {
    fn check_open(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SignalDbusError::Transport("connection closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BusProxy for MockProxy {
    async fn send_message(
        &self,
        content: &str,
        attachments: &[String],
        recipients: &[String],
    ) -> Result<u64> {
        self.check_open()?;
        lock(&self.shared.calls).push(ProxyCall::SendMessage {
            content: content.to_string(),
            attachments: attachments.to_vec(),
            recipients: recipients.to_vec(),
        });
        Ok(self.shared.next_timestamp.fetch_add(1, Ordering::SeqCst))
    }

    async fn send_typing(&self, target: &str, stop: bool) -> Result<()> {
        self.check_open()?;
        lock(&self.shared.calls).push(ProxyCall::SendTyping {
            target: target.to_string(),
            stop,
        });
        Ok(())
    }

    async fn send_end_session(&self, recipients: &[String]) -> Result<()> {
        self.check_open()?;
        lock(&self.shared.calls).push(ProxyCall::SendEndSession {
            recipients: recipients.to_vec(),
        });
        Ok(())
    }

    async fn get_registration_status(&self) -> Result<()> {
        lock(&self.shared.calls).push(ProxyCall::RegistrationStatus);
        match lock(&self.shared.probe_failures).pop_front() {
            Some(body) => Err(SignalDbusError::Transport(body)),
            None => Ok(()),
        }
    }
}
