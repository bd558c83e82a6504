//! Values handed to the UI after every poll.

use std::time::Duration;

use serde::Serialize;

use crate::state::ConnectionState;

/// Shown when neither a title nor artists are known.
pub const NOTHING_PLAYING: &str = "Nothing's playing currently...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
    #[default]
    Unknown,
}

impl PlaybackStatus {
    /// Parse an MPRIS `PlaybackStatus` string. Anything unrecognised is `Unknown`.
    pub fn from_mpris(s: &str) -> Self {
        match s {
            "Playing" => PlaybackStatus::Playing,
            "Paused" => PlaybackStatus::Paused,
            "Stopped" => PlaybackStatus::Stopped,
            _ => PlaybackStatus::Unknown,
        }
    }

    pub fn is_playing(self) -> bool {
        self == PlaybackStatus::Playing
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Stopped => "Stopped",
            PlaybackStatus::Unknown => "Unknown",
        }
    }
}

/// Track metadata decoded from the `Metadata` property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub length: Duration,
}

/// One poll's worth of player state, owned by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub status: PlaybackStatus,
    /// Empty when the player reports no title.
    pub track_title: String,
    pub artists: Vec<String>,
    pub position: Duration,
    pub duration: Duration,
    pub connection_state: ConnectionState,
}

impl PlayerSnapshot {
    pub fn new(
        status: PlaybackStatus,
        metadata: TrackMetadata,
        position: Duration,
        connection_state: ConnectionState,
    ) -> Self {
        Self {
            status,
            track_title: metadata.title.unwrap_or_default(),
            artists: metadata.artists,
            position,
            duration: metadata.length,
            connection_state,
        }
    }

    /// Snapshot emitted while no usable connection exists.
    pub fn disconnected(connection_state: ConnectionState) -> Self {
        Self {
            status: PlaybackStatus::Unknown,
            track_title: String::new(),
            artists: Vec::new(),
            position: Duration::ZERO,
            duration: Duration::ZERO,
            connection_state,
        }
    }

    /// `"Title - Artist A, Artist B"`, falling back to whichever half exists,
    /// or [`NOTHING_PLAYING`].
    pub fn display_line(&self) -> String {
        compose_track_line(&self.track_title, &self.artists)
    }

    pub fn progress_fraction(&self) -> f64 {
        progress_fraction(self.position, self.duration)
    }

    pub fn position_text(&self) -> String {
        fmt_time(self.position)
    }

    pub fn duration_text(&self) -> String {
        fmt_time(self.duration)
    }

    pub fn controls_enabled(&self) -> bool {
        self.connection_state.controls_enabled()
    }
}

pub fn compose_track_line(title: &str, artists: &[String]) -> String {
    let artists = artists.join(", ");
    match (title.is_empty(), artists.is_empty()) {
        (false, false) => format!("{title} - {artists}"),
        (false, true) => title.to_owned(),
        (true, false) => artists,
        (true, true) => NOTHING_PLAYING.to_owned(),
    }
}

pub fn progress_fraction(position: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }
    (position.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}

/// `m:ss`, minutes unbounded.
pub fn fmt_time(d: Duration) -> String {
    let secs = d.as_secs();
    let m = secs / 60;
    let r = secs % 60;
    format!("{m}:{r:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(title: &str, artists: &[&str]) -> PlayerSnapshot {
        PlayerSnapshot::new(
            PlaybackStatus::Playing,
            TrackMetadata {
                title: (!title.is_empty()).then(|| title.to_owned()),
                artists: artists.iter().map(|s| (*s).to_owned()).collect(),
                length: Duration::ZERO,
            },
            Duration::ZERO,
            ConnectionState::Connected,
        )
    }

    #[test]
    fn title_and_artists_are_joined() {
        let s = snapshot("Song A", &["Artist X", "Artist Y"]);
        assert_eq!(s.display_line(), "Song A - Artist X, Artist Y");
    }

    #[test]
    fn artists_only_has_no_leading_separator() {
        assert_eq!(snapshot("", &["Artist X"]).display_line(), "Artist X");
    }

    #[test]
    fn title_only() {
        assert_eq!(snapshot("Song A", &[]).display_line(), "Song A");
    }

    #[test]
    fn empty_metadata_shows_placeholder() {
        let s = PlayerSnapshot::new(
            PlaybackStatus::Stopped,
            TrackMetadata::default(),
            Duration::ZERO,
            ConnectionState::Connected,
        );
        assert_eq!(s.display_line(), NOTHING_PLAYING);
        assert_eq!(s.duration, Duration::ZERO);
        assert_eq!(s.progress_fraction(), 0.0);
    }

    #[test]
    fn position_and_duration_formatting() {
        let s = PlayerSnapshot::new(
            PlaybackStatus::Playing,
            TrackMetadata {
                title: Some("t".into()),
                artists: vec![],
                length: Duration::from_micros(180_000_000),
            },
            Duration::from_micros(90_000_000),
            ConnectionState::Connected,
        );
        assert_eq!(s.position_text(), "1:30");
        assert_eq!(s.duration_text(), "3:00");
        assert!((s.progress_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn fraction_is_clamped() {
        let f = progress_fraction(Duration::from_secs(200), Duration::from_secs(100));
        assert_eq!(f, 1.0);
    }

    #[test]
    fn fmt_time_handles_zero_and_long_tracks() {
        assert_eq!(fmt_time(Duration::ZERO), "0:00");
        assert_eq!(fmt_time(Duration::from_secs(3725)), "62:05");
    }

    #[test]
    fn unknown_status_strings() {
        assert_eq!(PlaybackStatus::from_mpris("Paused"), PlaybackStatus::Paused);
        assert_eq!(PlaybackStatus::from_mpris("Buffering"), PlaybackStatus::Unknown);
    }
}
