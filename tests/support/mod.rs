//! Scripted transport and recording observer for connection manager tests.
//!
//! The mock never touches a bus. Connect results can be queued per attempt,
//! every property read is answered from a configurable table, and every call
//! is recorded so tests can assert on what the manager did and when.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;
use wayglance_player::{
    transport::PLAYER_INTERFACE, CallError, ConnectError, ConnectionState, ConnectionUpdate,
    NotificationSink, PlayerObserver, PlayerSnapshot, Subscription, Transport, Value,
};

#[derive(Debug, Clone)]
pub struct MockHandle {
    pub service: String,
    pub interface: String,
}

/// Everything the mock answers with and everything it has seen.
#[derive(Debug)]
pub struct MockState {
    /// Consumed one per player-handle connect; `fail_connect` applies when empty.
    pub connect_script: VecDeque<Result<(), ConnectError>>,
    pub fail_connect: Option<ConnectError>,
    pub fail_subscribe: Option<ConnectError>,

    pub status: Result<String, CallError>,
    pub metadata: Result<Value, CallError>,
    pub position: Result<Value, CallError>,
    pub identity: Result<Value, CallError>,
    pub command_result: Result<(), CallError>,

    /// Every `resolve` hands out a fresh name so mismatched handles show up.
    pub resolves: usize,
    /// `(service, interface)` per opened handle.
    pub handles: Vec<(String, String)>,
    pub connect_times: Vec<Instant>,
    pub sinks: Vec<NotificationSink>,
    pub property_reads: Vec<String>,
    pub commands: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            connect_script: VecDeque::new(),
            fail_connect: None,
            fail_subscribe: None,
            status: Ok("Paused".into()),
            metadata: Ok(metadata("Song A", &["Artist X", "Artist Y"], 180_000_000)),
            position: Ok(Value::I64(90_000_000)),
            identity: Ok(Value::from("Mock Player")),
            command_result: Ok(()),
            resolves: 0,
            handles: Vec::new(),
            connect_times: Vec::new(),
            sinks: Vec::new(),
            property_reads: Vec::new(),
            commands: Vec::new(),
        }
    }
}

impl MockState {
    pub fn reads_of(&self, property: &str) -> usize {
        self.property_reads.iter().filter(|p| *p == property).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Handle = MockHandle;

    async fn resolve(&self, service: Option<&str>) -> Result<String, ConnectError> {
        let mut st = self.state();
        st.resolves += 1;
        Ok(match service {
            Some(name) => name.to_owned(),
            None => format!("org.mpris.MediaPlayer2.mock{}", st.resolves),
        })
    }

    async fn connect(
        &self,
        service: &str,
        _path: &str,
        interface: &str,
    ) -> Result<MockHandle, ConnectError> {
        let mut st = self.state();
        st.handles.push((service.to_owned(), interface.to_owned()));
        if interface == PLAYER_INTERFACE {
            st.connect_times.push(Instant::now());
            let scripted = st.connect_script.pop_front();
            let result = match scripted {
                Some(result) => result,
                None => st.fail_connect.clone().map_or(Ok(()), Err),
            };
            result?;
        }
        Ok(MockHandle {
            service: service.to_owned(),
            interface: interface.to_owned(),
        })
    }

    async fn call(
        &self,
        _handle: &MockHandle,
        method: &str,
        args: &[Value],
        _timeout: Duration,
    ) -> Result<Value, CallError> {
        let mut st = self.state();
        if method != "Get" {
            st.commands.push(method.to_owned());
            return st.command_result.clone().map(|()| Value::Unit);
        }
        let property = match args.get(1) {
            Some(Value::Str(name)) => name.clone(),
            other => panic!("unexpected Get arguments {other:?}"),
        };
        st.property_reads.push(property.clone());
        match property.as_str() {
            "PlaybackStatus" => st.status.clone().map(Value::Str),
            "Metadata" => st.metadata.clone(),
            "Position" => st.position.clone(),
            "Identity" => st.identity.clone(),
            other => Err(CallError::Remote(format!("no property {other}"))),
        }
    }

    async fn subscribe(
        &self,
        _handle: &MockHandle,
        _signal: &str,
        _path: &str,
        sink: NotificationSink,
    ) -> Result<Subscription, ConnectError> {
        let mut st = self.state();
        if let Some(e) = st.fail_subscribe.clone() {
            return Err(e);
        }
        st.sinks.push(sink);
        Ok(Subscription::detached())
    }
}

pub fn metadata(title: &str, artists: &[&str], length_us: i64) -> Value {
    let mut d = HashMap::new();
    d.insert("xesam:title".to_owned(), Value::from(title));
    d.insert(
        "xesam:artist".to_owned(),
        Value::StrList(artists.iter().map(|a| (*a).to_owned()).collect()),
    );
    d.insert("mpris:length".to_owned(), Value::I64(length_us));
    Value::Dict(d)
}

// ------------------------- Observer -------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Snapshot(PlayerSnapshot),
    Connection(ConnectionUpdate),
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn updates(&self) -> Vec<ConnectionUpdate> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Connection(u) => Some(u),
                Event::Snapshot(_) => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.updates().into_iter().map(|u| u.state).collect()
    }

    pub fn snapshots(&self) -> Vec<PlayerSnapshot> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Snapshot(s) => Some(s),
                Event::Connection(_) => None,
            })
            .collect()
    }

    pub fn last_snapshot(&self) -> Option<PlayerSnapshot> {
        self.snapshots().pop()
    }
}

impl PlayerObserver for Recorder {
    fn on_snapshot(&mut self, snapshot: PlayerSnapshot) {
        self.events.lock().unwrap().push(Event::Snapshot(snapshot));
    }

    fn on_connection_changed(&mut self, update: ConnectionUpdate) {
        self.events.lock().unwrap().push(Event::Connection(update));
    }
}

// ------------------------- Time -------------------------

/// Let the manager task run everything that is ready without moving the clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Move the paused clock forward, firing every manager timer on the way at
/// its exact deadline.
pub async fn advance(d: Duration) {
    tokio::time::sleep(d).await;
    settle().await;
}
