//! Contract the connection manager needs from an RPC bus.

use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    error::{CallError, ConnectError},
    value::Value,
};

pub const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
pub const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";
pub const ROOT_INTERFACE: &str = "org.mpris.MediaPlayer2";
pub const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
pub const PROPERTIES_CHANGED: &str = "PropertiesChanged";

/// An asynchronous RPC bus able to reach a media player service.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Proxy bound to one service, object path and interface.
    type Handle: Clone + Send + Sync + 'static;

    /// Pick the bus name to connect to. `service == None` means "any
    /// available player".
    async fn resolve(&self, service: Option<&str>) -> Result<String, ConnectError>;

    /// Open a handle on an already resolved service.
    async fn connect(
        &self,
        service: &str,
        path: &str,
        interface: &str,
    ) -> Result<Self::Handle, ConnectError>;

    /// Invoke `method` on the handle's interface.
    async fn call(
        &self,
        handle: &Self::Handle,
        method: &str,
        args: &[Value],
        timeout: Duration,
    ) -> Result<Value, CallError>;

    /// Deliver every `signal` emitted on `path` into `sink` until the returned
    /// [`Subscription`] is dropped.
    async fn subscribe(
        &self,
        handle: &Self::Handle,
        signal: &str,
        path: &str,
        sink: NotificationSink,
    ) -> Result<Subscription, ConnectError>;
}

/// Receiving end given to a transport when subscribing.
///
/// Each notification is tagged with the connection generation it was
/// registered for, so the manager can drop ones from a replaced connection.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    generation: u64,
    tx: mpsc::UnboundedSender<u64>,
}

impl NotificationSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<u64>) -> Self {
        Self { generation, tx }
    }

    /// Returns `false` once the manager is gone.
    pub fn notify(&self) -> bool {
        self.tx.send(self.generation).is_ok()
    }
}

/// A live notification registration. Dropping it cancels delivery.
#[derive(Debug, Default)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Subscription backed by a forwarding task, aborted on drop.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Subscription without a background task (delivery is driven elsewhere).
    pub fn detached() -> Self {
        Self::default()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
