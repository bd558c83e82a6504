//! wayglance-player: resilient MPRIS connection manager.
//! - One actor task per player: connection state machine, exponential-backoff reconnection,
//!   health probe, playback poller and command sender, all on a single tokio task.
//! - The bus is abstracted behind [`Transport`]; [`DbusTransport`] is the zbus 3.x implementation.
//! - The UI side implements [`PlayerObserver`] and receives owned [`PlayerSnapshot`]s.
//!
//! Notes:
//! - No unsafe. No locks: all manager state lives inside the actor.
//! - Dropping a [`PlayerHandle`] cancels every timer, subscription and in-flight command.

#![deny(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::perf)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::too_many_lines
)]

pub mod backoff;
pub mod command;
pub mod config;
pub mod dbus;
pub mod error;
pub mod fetch;
pub mod ipc;
pub mod manager;
pub mod output;
pub mod snapshot;
pub mod state;
pub mod transport;
pub mod value;

pub use command::Command;
pub use dbus::DbusTransport;
pub use error::{CallError, CommandError, ConnectError};
pub use manager::{CommandSender, ManagerConfig, PlayerHandle, PlayerObserver, Timings};
pub use snapshot::{PlaybackStatus, PlayerSnapshot};
pub use state::{ConnectionState, ConnectionUpdate};
pub use transport::{NotificationSink, Subscription, Transport};
pub use value::Value;
