//! JSON publishing for status bars: `state.json` snapshot plus `events.jsonl`.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    manager::PlayerObserver,
    snapshot::{fmt_time, PlayerSnapshot},
    state::{ConnectionState, ConnectionUpdate},
};

// ------------------------- Model -------------------------

/// What a bar widget renders. One line of `events.jsonl` per change other
/// than playback progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiState {
    pub connection: String,
    pub controls_enabled: bool,
    pub error: String,
    pub attempt: u32,
    pub status: String,
    pub title: String,
    pub artists: Vec<String>,
    /// Display line, or the connection placeholder while not connected.
    pub track: String,
    pub position: f64,
    pub position_str: String,
    pub length: f64,
    pub length_str: String,
    pub fraction: f64,
    pub play_pause_icon: String,
    pub nerd_font: bool,
}

#[derive(Debug, Clone)]
struct Icons {
    play: String,
    pause: String,
    nerd_font: bool,
}

// ------------------------- Writer -------------------------

/// [`PlayerObserver`] that mirrors the manager's output to disk.
#[derive(Debug)]
pub struct StateWriter {
    snapshot_path: PathBuf,
    events_path: PathBuf,
    pretty: bool,
    icons: Icons,
    connection: ConnectionUpdate,
    snapshot: PlayerSnapshot,
    last_event: Option<UiState>,
}

impl StateWriter {
    pub fn new(cfg: &Config) -> Self {
        let mut w = Self::with_paths(cfg.snapshot_path(), cfg.events_path());
        w.pretty = cfg.output.pretty_snapshot;
        w.icons = Icons {
            play: cfg.player.buttons.play.clone(),
            pause: cfg.player.buttons.pause.clone(),
            nerd_font: cfg.player.nerd_font,
        };
        w
    }

    pub fn with_paths(snapshot_path: PathBuf, events_path: PathBuf) -> Self {
        let buttons = crate::config::Buttons::default();
        Self {
            snapshot_path,
            events_path,
            pretty: false,
            icons: Icons {
                play: buttons.play,
                pause: buttons.pause,
                nerd_font: false,
            },
            connection: ConnectionUpdate {
                state: ConnectionState::Disconnected,
                controls_enabled: false,
                error_message: String::new(),
                attempt: 0,
            },
            snapshot: PlayerSnapshot::disconnected(ConnectionState::Disconnected),
            last_event: None,
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn ensure_dirs(&self) {
        if let Some(p) = self.snapshot_path.parent() {
            let _ = fs::create_dir_all(p);
        }
        if let Some(p) = self.events_path.parent() {
            let _ = fs::create_dir_all(p);
        }
    }

    pub fn ui_state(&self) -> UiState {
        let state = self.connection.state;
        let disconnected;
        let snap = if state == ConnectionState::Connected {
            &self.snapshot
        } else {
            disconnected = PlayerSnapshot::disconnected(state);
            &disconnected
        };
        let track = match state.placeholder() {
            Some(text) => text.to_owned(),
            None => snap.display_line(),
        };
        let icon = if snap.status.is_playing() {
            &self.icons.pause
        } else {
            &self.icons.play
        };
        UiState {
            connection: state.as_str().to_owned(),
            controls_enabled: self.connection.controls_enabled,
            error: self.connection.error_message.clone(),
            attempt: self.connection.attempt,
            status: snap.status.as_str().to_owned(),
            title: snap.track_title.clone(),
            artists: snap.artists.clone(),
            track,
            position: snap.position.as_secs_f64(),
            position_str: fmt_time(snap.position),
            length: snap.duration.as_secs_f64(),
            length_str: fmt_time(snap.duration),
            fraction: snap.progress_fraction(),
            play_pause_icon: icon.clone(),
            nerd_font: self.icons.nerd_font,
        }
    }

    /// Atomic snapshot write, then one appended event line unless only the
    /// position moved since the last one.
    pub fn write(&mut self) -> Result<()> {
        let st = self.ui_state();
        let json = if self.pretty {
            serde_json::to_string_pretty(&st)?
        } else {
            serde_json::to_string(&st)?
        };
        let tmp = self.snapshot_path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes())?;
        fs::rename(&tmp, &self.snapshot_path)?;

        if self
            .last_event
            .as_ref()
            .is_some_and(|last| same_apart_from_progress(last, &st))
        {
            return Ok(());
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)?;
        let line = serde_json::to_string(&st)?;
        writeln!(f, "{line}")?;
        self.last_event = Some(st);
        Ok(())
    }

    fn publish(&mut self) {
        if let Err(e) = self.write() {
            warn!("output: writing {} failed: {e:#}", self.snapshot_path.display());
        }
    }
}

fn same_apart_from_progress(a: &UiState, b: &UiState) -> bool {
    let progress = |st: &UiState| UiState {
        position: 0.0,
        position_str: String::new(),
        fraction: 0.0,
        ..st.clone()
    };
    progress(a) == progress(b)
}

impl PlayerObserver for StateWriter {
    fn on_snapshot(&mut self, snapshot: PlayerSnapshot) {
        self.snapshot = snapshot;
        self.publish();
    }

    fn on_connection_changed(&mut self, update: ConnectionUpdate) {
        self.connection = update;
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::snapshot::{PlaybackStatus, TrackMetadata};

    fn writer(tag: &str) -> StateWriter {
        let dir = std::env::temp_dir().join(format!(
            "wayglance-player-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let w = StateWriter::with_paths(dir.join("state.json"), dir.join("events.jsonl"));
        w.ensure_dirs();
        w
    }

    fn connected() -> ConnectionUpdate {
        ConnectionUpdate {
            state: ConnectionState::Connected,
            controls_enabled: true,
            error_message: String::new(),
            attempt: 0,
        }
    }

    fn playing() -> PlayerSnapshot {
        PlayerSnapshot::new(
            PlaybackStatus::Playing,
            TrackMetadata {
                title: Some("Song A".into()),
                artists: vec!["Artist X".into()],
                length: Duration::from_secs(180),
            },
            Duration::from_secs(90),
            ConnectionState::Connected,
        )
    }

    #[test]
    fn placeholder_while_not_connected() {
        let w = writer("placeholder");
        let st = w.ui_state();
        assert_eq!(st.connection, "Disconnected");
        assert_eq!(st.track, "Media Player Disconnected");
        assert!(!st.controls_enabled);
        assert_eq!(st.play_pause_icon, "media-playback-start-symbolic");
    }

    #[test]
    fn connected_snapshot_is_rendered() {
        let mut w = writer("render");
        w.on_connection_changed(connected());
        w.on_snapshot(playing());
        let st = w.ui_state();
        assert_eq!(st.track, "Song A - Artist X");
        assert_eq!(st.position_str, "1:30");
        assert_eq!(st.length_str, "3:00");
        assert!((st.fraction - 0.5).abs() < f64::EPSILON);
        assert_eq!(st.play_pause_icon, "media-playback-pause-symbolic");
    }

    #[test]
    fn error_hides_stale_track_data() {
        let mut w = writer("error");
        w.on_connection_changed(connected());
        w.on_snapshot(playing());
        w.on_connection_changed(ConnectionUpdate {
            state: ConnectionState::Error,
            controls_enabled: false,
            error_message: "Health check failed: boom".into(),
            attempt: 0,
        });
        let st = w.ui_state();
        assert_eq!(st.track, "Media Player Error, retrying...");
        assert_eq!(st.title, "");
        assert_eq!(st.status, "Unknown");
        assert_eq!(st.error, "Health check failed: boom");
    }

    #[test]
    fn writes_snapshot_and_appends_events() {
        let mut w = writer("files");
        w.on_connection_changed(connected());
        w.on_snapshot(playing());

        let text = fs::read_to_string(w.snapshot_path()).unwrap();
        let st: UiState = serde_json::from_str(&text).unwrap();
        assert_eq!(st.track, "Song A - Artist X");
        assert!(text.contains("\"controlsEnabled\":true"));

        let events = fs::read_to_string(w.events_path()).unwrap();
        assert_eq!(events.lines().count(), 2);
    }

    #[test]
    fn progress_alone_does_not_append_events() {
        let mut w = writer("progress");
        w.on_connection_changed(connected());
        let mut snap = playing();
        for secs in 90..100 {
            snap.position = Duration::from_secs(secs);
            w.on_snapshot(snap.clone());
        }

        let st: UiState =
            serde_json::from_str(&fs::read_to_string(w.snapshot_path()).unwrap()).unwrap();
        assert_eq!(st.position_str, "1:39");
        let events = fs::read_to_string(w.events_path()).unwrap();
        assert_eq!(events.lines().count(), 2);

        snap.status = PlaybackStatus::Paused;
        w.on_snapshot(snap);
        let events = fs::read_to_string(w.events_path()).unwrap();
        assert_eq!(events.lines().count(), 3);
    }
}
