//! Connection lifecycle bookkeeping.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// Transport controls are only usable on a live connection.
    pub fn controls_enabled(self) -> bool {
        self == ConnectionState::Connected
    }

    /// Text a UI shows instead of track data while not connected.
    pub fn placeholder(self) -> Option<&'static str> {
        match self {
            ConnectionState::Disconnected => Some("Media Player Disconnected"),
            ConnectionState::Connecting => Some("Connecting to Media Player..."),
            ConnectionState::Connected => None,
            ConnectionState::Error => Some("Media Player Error, retrying..."),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Error => "Error",
        }
    }
}

/// Delivered to the UI on every effective state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub state: ConnectionState,
    pub controls_enabled: bool,
    /// Empty unless `state` is `Error`.
    pub error_message: String,
    /// Reconnection attempts since the last successful connect.
    pub attempt: u32,
}

/// Current state plus the error message that came with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    state: ConnectionState,
    last_error_message: String,
}

impl ConnectionStatus {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_error_message(&self) -> &str {
        &self.last_error_message
    }

    /// Move to `state`. Returns `false`, leaving everything untouched, when
    /// `(state, message)` equals the current pair. The message is dropped for
    /// every state but `Error`.
    pub fn transition(&mut self, state: ConnectionState, message: &str) -> bool {
        let message = if state == ConnectionState::Error { message } else { "" };
        if self.state == state && self.last_error_message == message {
            return false;
        }
        self.state = state;
        self.last_error_message = message.to_owned();
        true
    }
}
