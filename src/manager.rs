//! Connection manager for one media player.
//!
//! Everything here runs inside a single task: the connection state machine,
//! the reconnection scheduler, the health monitor, the playback poller and the
//! command sender. RPC calls are awaited in place, so their continuations
//! never interleave with one another and no locking is needed. Timers are
//! plain deadlines / intervals owned by the task; dropping the task drops all
//! of them along with the transport handles and the notification
//! subscription.

use std::{future, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};

use crate::{
    backoff::{Backoff, RetryState},
    command::Command,
    error::{CommandError, ConnectError},
    fetch::PropertyFetcher,
    snapshot::{PlaybackStatus, PlayerSnapshot, TrackMetadata},
    state::{ConnectionState, ConnectionStatus, ConnectionUpdate},
    transport::{
        NotificationSink, Subscription, Transport, MPRIS_PATH, PLAYER_INTERFACE,
        PROPERTIES_CHANGED, PROPERTIES_INTERFACE,
    },
};

/// Receives everything the manager produces. Called from the manager task.
pub trait PlayerObserver: Send + 'static {
    /// After every complete or partially successful poll, and with a
    /// disconnected snapshot whenever the connection is lost.
    fn on_snapshot(&mut self, snapshot: PlayerSnapshot);

    /// On every effective connection state change.
    fn on_connection_changed(&mut self, update: ConnectionUpdate);
}

/// Timer and timeout constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub backoff: Backoff,
    pub health_interval: Duration,
    pub probe_timeout: Duration,
    pub progress_interval: Duration,
    pub fetch_timeout: Duration,
    pub position_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
            health_interval: Duration::from_secs(8),
            probe_timeout: Duration::from_secs(1),
            progress_interval: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(2),
            position_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Bus name of the player, or `None` for any available player.
    pub service: Option<String>,
    pub command_timeout: Duration,
    pub timings: Timings,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            service: None,
            command_timeout: Duration::from_secs(2),
            timings: Timings::default(),
        }
    }
}

#[derive(Debug)]
enum Request {
    Command(Command),
    Update,
    Shutdown,
}

/// Cloneable sender for commands and refresh requests.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Request>,
}

impl CommandSender {
    /// Best effort. Ignored when the player is not connected.
    pub fn send_command(&self, command: Command) {
        let _ = self.tx.send(Request::Command(command));
    }

    /// Re-poll the player now.
    pub fn update(&self) {
        let _ = self.tx.send(Request::Update);
    }

    /// `false` once the manager has stopped.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Owner of a running connection manager. Dropping it aborts the manager.
#[derive(Debug)]
pub struct PlayerHandle {
    sender: CommandSender,
    task: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    /// Start managing a player on the current tokio runtime.
    pub fn spawn<T, O>(transport: T, config: ManagerConfig, observer: O) -> Self
    where
        T: Transport,
        O: PlayerObserver,
    {
        let (tx, requests) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager {
            transport: Arc::new(transport),
            config,
            observer,
            status: ConnectionStatus::default(),
            retry: RetryState::default(),
            handles: None,
            health: None,
            progress: None,
            generation: 0,
            notify_tx,
            notify_rx,
            requests,
            commands: JoinSet::new(),
        };
        let task = tokio::spawn(manager.run());
        Self {
            sender: CommandSender { tx },
            task: Some(task),
        }
    }

    pub fn send_command(&self, command: Command) {
        self.sender.send_command(command);
    }

    pub fn update(&self) {
        self.sender.update();
    }

    pub fn commands(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Stop the manager, reporting `Disconnected` to the observer first.
    pub async fn shutdown(mut self) {
        let _ = self.sender.tx.send(Request::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Transport handles for one connection. Installed and dropped as a unit.
struct Handles<H> {
    player: H,
    properties: H,
    _subscription: Subscription,
}

struct ConnectionManager<T: Transport, O> {
    transport: Arc<T>,
    config: ManagerConfig,
    observer: O,
    status: ConnectionStatus,
    retry: RetryState,
    handles: Option<Handles<T::Handle>>,
    health: Option<Interval>,
    progress: Option<Interval>,
    generation: u64,
    notify_tx: mpsc::UnboundedSender<u64>,
    notify_rx: mpsc::UnboundedReceiver<u64>,
    requests: mpsc::UnboundedReceiver<Request>,
    commands: JoinSet<()>,
}

impl<T: Transport, O: PlayerObserver> ConnectionManager<T, O> {
    async fn run(mut self) {
        self.connect().await;

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(Request::Command(command)) => self.send_command(command),
                    Some(Request::Update) => self.update().await,
                    Some(Request::Shutdown) | None => break,
                },
                Some(generation) = self.notify_rx.recv() => self.on_notification(generation).await,
                () = sleep_until(self.retry.pending()) => self.attempt_reconnection().await,
                () = tick(&mut self.health) => self.check_health().await,
                () = tick(&mut self.progress) => self.poll().await,
                Some(_) = self.commands.join_next(), if !self.commands.is_empty() => {}
            }
        }

        self.commands.abort_all();
        self.transition(ConnectionState::Disconnected, "");
        debug!("player manager stopped");
    }

    // ---- state machine ----

    /// Apply a state change and its entry effects. Returns `false` when the
    /// `(state, message)` pair is already current, in which case nothing runs.
    fn transition(&mut self, state: ConnectionState, message: &str) -> bool {
        if !self.status.transition(state, message) {
            return false;
        }

        match state {
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                debug!("player: connection state -> {}", state.as_str());
                self.stop_health_check();
                self.progress = None;
                self.handles = None;
            }
            ConnectionState::Connected => {
                info!("player: connected");
                self.start_health_check();
                self.retry.reset();
            }
            ConnectionState::Error => {
                warn!("player: connection error - {message}");
                self.stop_health_check();
                self.progress = None;
                self.handles = None;
                self.schedule_reconnection();
            }
        }

        self.observer.on_connection_changed(ConnectionUpdate {
            state,
            controls_enabled: state.controls_enabled(),
            error_message: self.status.last_error_message().to_owned(),
            attempt: self.retry.attempt_count(),
        });
        if state == ConnectionState::Error {
            self.observer.on_snapshot(PlayerSnapshot::disconnected(state));
        }
        true
    }

    async fn connect(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.transition(ConnectionState::Connecting, "");

        let transport = Arc::clone(&self.transport);
        let service = self.config.service.clone();
        let sink = NotificationSink::new(self.generation, self.notify_tx.clone());
        match open_handles(&*transport, service.as_deref(), sink).await {
            Ok(handles) => {
                self.handles = Some(handles);
                if self.transition(ConnectionState::Connected, "") {
                    self.poll().await;
                }
            }
            Err(e) => {
                self.transition(ConnectionState::Error, &e.to_string());
            }
        }
    }

    // ---- reconnection scheduler ----

    fn schedule_reconnection(&mut self) {
        if let Some(delay) = self
            .retry
            .schedule(&self.config.timings.backoff, Instant::now())
        {
            debug!(
                "player: reconnection attempt {} in {delay:?}",
                self.retry.attempt_count() + 1
            );
        }
    }

    async fn attempt_reconnection(&mut self) {
        let attempt = self.retry.begin_attempt();
        debug!("player: reconnection attempt #{attempt}");
        self.connect().await;
    }

    // ---- health monitor ----

    fn start_health_check(&mut self) {
        if self.health.is_none() {
            self.health = Some(new_interval(self.config.timings.health_interval));
        }
    }

    fn stop_health_check(&mut self) {
        self.health = None;
    }

    async fn check_health(&mut self) {
        let Some(properties) = self.handles.as_ref().map(|h| h.properties.clone()) else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        let probe = PropertyFetcher::new(&*transport, &properties)
            .get_identity(self.config.timings.probe_timeout)
            .await;

        match probe {
            Ok(_) => {
                self.transition(ConnectionState::Connected, "");
            }
            Err(e) => {
                self.transition(ConnectionState::Error, &format!("Health check failed: {e}"));
            }
        }
    }

    // ---- playback poller ----

    async fn on_notification(&mut self, generation: u64) {
        if generation != self.generation {
            debug!("player: dropping notification from a replaced connection");
            return;
        }
        self.poll().await;
    }

    async fn update(&mut self) {
        if self.status.state() == ConnectionState::Connected {
            self.poll().await;
        } else {
            self.observer
                .on_snapshot(PlayerSnapshot::disconnected(self.status.state()));
        }
    }

    async fn poll(&mut self) {
        if self.status.state() != ConnectionState::Connected {
            return;
        }
        let Some(properties) = self.handles.as_ref().map(|h| h.properties.clone()) else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        let fetcher = PropertyFetcher::new(&*transport, &properties);
        let timings = self.config.timings;

        let status = match fetcher.get_playback_status(timings.fetch_timeout).await {
            Ok(status) => status,
            Err(e) => {
                self.set_playback(PlaybackStatus::Unknown);
                self.transition(ConnectionState::Error, &format!("Failed to get status: {e}"));
                return;
            }
        };

        let metadata = fetcher
            .get_metadata(timings.fetch_timeout)
            .await
            .unwrap_or_else(|e| {
                debug!("player: no metadata: {e}");
                TrackMetadata::default()
            });

        let position = fetcher
            .get_position(timings.position_timeout)
            .await
            .unwrap_or_else(|e| {
                debug!("player: no position: {e}");
                Duration::ZERO
            });

        self.set_playback(status);
        self.observer.on_snapshot(PlayerSnapshot::new(
            status,
            metadata,
            position,
            self.status.state(),
        ));
    }

    /// The progress tick only runs while playing.
    fn set_playback(&mut self, status: PlaybackStatus) {
        if status.is_playing() {
            if self.progress.is_none() {
                self.progress = Some(new_interval(self.config.timings.progress_interval));
            }
        } else {
            self.progress = None;
        }
    }

    // ---- command sender ----

    fn send_command(&mut self, command: Command) {
        let Some(player) = self.handles.as_ref().map(|h| h.player.clone()) else {
            debug!("player: ignoring {command}, not connected");
            return;
        };
        let transport = Arc::clone(&self.transport);
        let timeout = self.config.command_timeout;
        self.commands.spawn(async move {
            if let Err(source) = transport.call(&player, command.method(), &[], timeout).await {
                warn!("player: {}", CommandError { command, source });
            }
        });
    }
}

/// Build a fresh handle pair and the notification subscription, all or nothing.
async fn open_handles<T: Transport>(
    transport: &T,
    service: Option<&str>,
    sink: NotificationSink,
) -> Result<Handles<T::Handle>, ConnectError> {
    // Both handles bind to the same player even if bus names change between
    // the two connects.
    let service = transport.resolve(service).await?;
    let player = transport
        .connect(&service, MPRIS_PATH, PLAYER_INTERFACE)
        .await?;
    let properties = transport
        .connect(&service, MPRIS_PATH, PROPERTIES_INTERFACE)
        .await?;
    let subscription = transport
        .subscribe(&properties, PROPERTIES_CHANGED, MPRIS_PATH, sink)
        .await?;
    Ok(Handles {
        player,
        properties,
        _subscription: subscription,
    })
}

/// Interval whose first tick is one full period from now.
fn new_interval(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
