//! Error types for the player connection manager.

use std::time::Duration;

use crate::command::Command;

/// Opening a handle or subscribing to notifications failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("no media player available on the bus")]
    NoService,

    #[error("media player {0} is not running")]
    ServiceUnavailable(String),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("failed to subscribe to {signal}: {message}")]
    Subscribe { signal: String, message: String },
}

/// A property fetch or health probe failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("cannot send a {0} as a call argument")]
    UnsupportedArgument(&'static str),
}

/// A transport command was rejected or timed out. Only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command {command} failed: {source}")]
pub struct CommandError {
    pub command: Command,
    #[source]
    pub source: CallError,
}
