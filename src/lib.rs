//! signal-dbus - client library for a messaging daemon over D-Bus
//!
//! Bridges an application to the signal-cli daemon: opens a bus session,
//! watches its health, turns inbound bus events into typed messages grouped
//! by conversation, and exposes send operations back to the daemon.
//!
//! The bus wire protocol lives behind the trait seams in [`bus`]; this crate
//! owns the session lifecycle, event dispatch and conversation caching.

pub mod bus;
pub mod cache;
pub mod client;
pub mod config;
pub mod conversation;
pub mod decode;
pub mod error;
pub mod message;
pub mod monitor;

pub use bus::{BusEvent, BusScope, MockBus};
pub use client::{Client, ClientEvent};
pub use config::{Config, DbusConfig};
pub use conversation::{Conversation, ConversationKind};
pub use error::{Result, SignalDbusError};
pub use message::{Message, MessageV2};
