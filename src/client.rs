//! Connection Lifecycle Manager.
//!
//! Owns the bus session end to end:
//! - `connect` opens the transport, resolves the daemon proxy, binds the
//!   event subscription and spawns the driver task
//! - the driver dispatches inbound events through the decoder and runs the
//!   health monitor
//! - teardown (probe failure, explicit disconnect, or client drop) releases
//!   the subscription, closes the connection and emits one `Disconnect`
//!
//! The client never reconnects on its own; after a `Disconnect` the
//! application decides whether to call `connect` again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::bus::{BusConnection, BusEvent, BusProxy, Subscription, Transport};
use crate::cache::ConversationCache;
use crate::config::Config;
use crate::conversation::Conversation;
use crate::decode;
use crate::error::{Result, SignalDbusError};
use crate::message::{Message, MessageV2};
use crate::monitor::{HealthMonitor, Liveness};

/// Queue depth for the inbound bus channel and the application event stream.
const EVENT_QUEUE_DEPTH: usize = 128;

/// Events emitted to the application, FIFO relative to transport delivery.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Decoded legacy message.
    Message(Message),
    /// Decoded v2 message.
    MessageV2(MessageV2),
    /// Transport-level error; the session stays up.
    Error(String),
    /// The session is gone. Emitted exactly once per session.
    Disconnect {
        reason: String,
    },
}

/// One active session's moving parts, held between connect and teardown.
struct SessionHandle {
    proxy: Arc<dyn BusProxy>,
    shutdown: oneshot::Sender<()>,
    driver: JoinHandle<()>,
}

/// Client for a messaging daemon reachable over the bus.
pub struct Client {
    config: Config,
    transport: Arc<dyn Transport>,
    cache: Arc<ConversationCache>,
    events_tx: mpsc::Sender<ClientEvent>,
    events_rx: Mutex<mpsc::Receiver<ClientEvent>>,
    connected: Arc<AtomicBool>,
    session: Mutex<Option<SessionHandle>>,
}

impl Client {
    /// Create a client. Fails with a configuration error on malformed
    /// settings; no transport call is made here.
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        Ok(Self {
            config,
            transport,
            cache: Arc::new(ConversationCache::new()),
            events_tx,
            events_rx: Mutex::new(events_rx),
            connected: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(None),
        })
    }

    /// Open the session: transport, proxy, event subscription, driver task,
    /// health monitor.
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if self.is_connected() {
            return Err(SignalDbusError::InvalidState("already connected".to_string()));
        }
        // A handle left over from a monitor-detected disconnect; its driver
        // has already finished.
        drop(session.take());

        let scope = self.config.dbus.bus_type;
        let object_path = self.config.object_path();
        info!(
            "Connecting to {} on the {} bus at {}",
            self.config.dbus.destination,
            scope.as_str(),
            object_path
        );

        let connection = self.transport.open(scope).await?;
        let proxy = connection.proxy(&self.config.dbus.destination, &object_path).await?;

        let (bus_tx, bus_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let subscription = connection.subscribe(bus_tx).await?;
        let monitor = HealthMonitor::new(
            self.config.dbus.connection_check_interval,
            Arc::clone(&proxy),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let driver = Driver {
            connection,
            subscription,
            monitor,
            bus_rx,
            shutdown: shutdown_rx,
            events: self.events_tx.clone(),
            cache: Arc::clone(&self.cache),
            proxy: Arc::clone(&proxy),
            connected: Arc::clone(&self.connected),
            debug: self.config.debug,
        };

        self.connected.store(true, Ordering::SeqCst);
        let driver = tokio::spawn(driver.run());
        *session = Some(SessionHandle {
            proxy,
            shutdown: shutdown_tx,
            driver,
        });
        Ok(())
    }

    /// Close the session, emitting one `Disconnect`. A no-op when already
    /// disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        let handle = self.session.lock().await.take();
        let Some(handle) = handle else {
            return Ok(());
        };
        // The driver may have torn down on its own already; then the send
        // fails and the join returns immediately.
        let _ = handle.shutdown.send(());
        let _ = handle.driver.await;
        Ok(())
    }

    /// Whether a session is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Receive the next application event (blocks until one is available).
    pub async fn recv_event(&self) -> Option<ClientEvent> {
        let mut receiver = self.events_rx.lock().await;
        receiver.recv().await
    }

    /// Try to receive an application event without blocking.
    pub async fn try_recv_event(&self) -> Option<ClientEvent> {
        let mut receiver = self.events_rx.lock().await;
        receiver.try_recv().ok()
    }

    /// Look up a cached conversation without creating one.
    pub fn conversation(&self, id: &str) -> Option<Arc<Conversation>> {
        self.cache.get(id)
    }

    /// Get or create the direct conversation with a peer.
    pub async fn direct_conversation(&self, number: &str) -> Result<Arc<Conversation>> {
        let proxy = self.session_proxy().await?;
        Ok(self
            .cache
            .get_or_create(number, || Conversation::direct(number, proxy)))
    }

    /// Get or create a group conversation by its base64 identifier.
    pub async fn group_conversation(&self, group_id: &str) -> Result<Arc<Conversation>> {
        let proxy = self.session_proxy().await?;
        Ok(self
            .cache
            .get_or_create(group_id, || Conversation::group(group_id, proxy)))
    }

    async fn session_proxy(&self) -> Result<Arc<dyn BusProxy>> {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(handle) if self.is_connected() => Ok(Arc::clone(&handle.proxy)),
            _ => Err(SignalDbusError::InvalidState("not connected".to_string())),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("phone_number", &self.config.phone_number)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Session driver: one task multiplexing inbound events, the health monitor
/// and the shutdown signal. Decoding is synchronous inside this task, so one
/// event is fully handled before the next is taken and cache mutations never
/// interleave.
struct Driver {
    connection: Box<dyn BusConnection>,
    subscription: Subscription,
    monitor: HealthMonitor,
    bus_rx: mpsc::Receiver<BusEvent>,
    shutdown: oneshot::Receiver<()>,
    events: mpsc::Sender<ClientEvent>,
    cache: Arc<ConversationCache>,
    proxy: Arc<dyn BusProxy>,
    connected: Arc<AtomicBool>,
    debug: bool,
}

impl Driver {
    async fn run(mut self) {
        let reason = loop {
            tokio::select! {
                _ = &mut self.shutdown => {
                    break "closed by application".to_string();
                }
                event = self.bus_rx.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => break "event stream closed".to_string(),
                },
                liveness = self.monitor.tick() => match liveness {
                    Liveness::Healthy => {
                        if self.debug {
                            debug!("liveness probe ok");
                        }
                    }
                    Liveness::Benign(body) => {
                        warn!("liveness probe returned benign error: {}", body);
                    }
                    Liveness::Failed(body) => {
                        error!("liveness probe failed: {}", body);
                        break body;
                    }
                },
            }
        };
        self.teardown(reason).await;
    }

    async fn dispatch(&self, event: BusEvent) {
        match event {
            BusEvent::MessageReceived(raw) => {
                if self.debug {
                    debug!(
                        "message from {} ({} attachments)",
                        raw.author,
                        raw.attachments.len()
                    );
                }
                let message = decode::legacy(raw, &self.cache, &self.proxy);
                let _ = self.events.send(ClientEvent::Message(message)).await;
            }
            BusEvent::MessageReceivedV2(raw) => {
                if self.debug {
                    debug!("v2 message from {} ({} extras)", raw.sender, raw.extras.len());
                }
                let message = decode::v2(raw, &self.cache, &self.proxy);
                let _ = self.events.send(ClientEvent::MessageV2(message)).await;
            }
            BusEvent::Error(err) => {
                warn!("transport error: {}", err);
                let _ = self.events.send(ClientEvent::Error(err)).await;
            }
        }
    }

    async fn teardown(self, reason: String) {
        info!("Session closed: {}", reason);
        self.subscription.release();
        self.connection.close().await;
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.send(ClientEvent::Disconnect { reason }).await;
    }
}
