//! Typed MPRIS property reads over a [`Transport`].

use std::time::Duration;

use log::debug;

use crate::{
    error::CallError,
    snapshot::{PlaybackStatus, TrackMetadata},
    transport::{Transport, PLAYER_INTERFACE, ROOT_INTERFACE},
    value::{self, Field, FromValue, Value},
};

const TITLE: &str = "xesam:title";
const ARTIST: &str = "xesam:artist";
const LENGTH: &str = "mpris:length";

/// Reads properties through the `org.freedesktop.DBus.Properties` handle.
pub struct PropertyFetcher<'a, T: Transport> {
    transport: &'a T,
    properties: &'a T::Handle,
}

impl<'a, T: Transport> PropertyFetcher<'a, T> {
    pub fn new(transport: &'a T, properties: &'a T::Handle) -> Self {
        Self { transport, properties }
    }

    async fn get(&self, interface: &str, name: &str, timeout: Duration) -> Result<Value, CallError> {
        let args = [Value::from(interface), Value::from(name)];
        self.transport.call(self.properties, "Get", &args, timeout).await
    }

    async fn get_as<V: FromValue>(
        &self,
        interface: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<V, CallError> {
        let value = self.get(interface, name, timeout).await?;
        V::from_value(&value).ok_or_else(|| {
            CallError::MalformedReply(format!("{name} was a {}", value.kind()))
        })
    }

    pub async fn get_playback_status(&self, timeout: Duration) -> Result<PlaybackStatus, CallError> {
        let status: String = self.get_as(PLAYER_INTERFACE, "PlaybackStatus", timeout).await?;
        Ok(PlaybackStatus::from_mpris(&status))
    }

    pub async fn get_metadata(&self, timeout: Duration) -> Result<TrackMetadata, CallError> {
        match self.get(PLAYER_INTERFACE, "Metadata", timeout).await? {
            Value::Dict(dict) => Ok(decode_metadata(&dict)),
            other => Err(CallError::MalformedReply(format!(
                "Metadata was a {}",
                other.kind()
            ))),
        }
    }

    pub async fn get_position(&self, timeout: Duration) -> Result<Duration, CallError> {
        let micros: i64 = self.get_as(PLAYER_INTERFACE, "Position", timeout).await?;
        u64::try_from(micros)
            .map(Duration::from_micros)
            .map_err(|_| CallError::MalformedReply(format!("negative Position {micros}")))
    }

    /// Cheap read used as the health probe.
    pub async fn get_identity(&self, timeout: Duration) -> Result<String, CallError> {
        self.get_as(ROOT_INTERFACE, "Identity", timeout).await
    }
}

/// Pull title, artists and length out of an MPRIS metadata dictionary.
/// Keys with the wrong type are logged and treated as absent.
pub fn decode_metadata(dict: &std::collections::HashMap<String, Value>) -> TrackMetadata {
    let title = match value::field::<String>(dict, TITLE) {
        Field::Valid(t) if !t.is_empty() => Some(t),
        Field::WrongType { found } => {
            debug!("metadata: {TITLE} has unexpected type {found}");
            None
        }
        _ => None,
    };

    let artists = match value::field::<Vec<String>>(dict, ARTIST) {
        Field::Valid(a) => a.into_iter().filter(|s| !s.is_empty()).collect(),
        Field::WrongType { found } => {
            debug!("metadata: {ARTIST} has unexpected type {found}");
            Vec::new()
        }
        Field::Absent => Vec::new(),
    };

    let length = match value::field::<u64>(dict, LENGTH) {
        Field::Valid(us) => Duration::from_micros(us),
        Field::WrongType { found } => {
            debug!("metadata: {LENGTH} has unexpected type {found}");
            Duration::ZERO
        }
        Field::Absent => Duration::ZERO,
    };

    TrackMetadata {
        title,
        artists,
        length,
    }
}
