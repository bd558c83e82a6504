//! Daemon configuration (`$XDG_CONFIG_HOME/wayglance/player.toml`).

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{manager::ManagerConfig, transport::MPRIS_PREFIX};

// ------------------------- Config -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: Player,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Debug, Deserialize)]
pub struct Player {
    /// `"any"`, a short name such as `"spotify"`, or a full bus name.
    #[serde(default = "any")]
    pub name: String,
    #[serde(default = "d2000")]
    pub command_timeout_ms: u64,
    #[serde(default)]
    pub nerd_font: bool,
    #[serde(default)]
    pub buttons: Buttons,
}
fn any() -> String {
    "any".into()
}
fn d2000() -> u64 {
    2000
}
impl Default for Player {
    fn default() -> Self {
        Self {
            name: any(),
            command_timeout_ms: d2000(),
            nerd_font: false,
            buttons: Buttons::default(),
        }
    }
}

/// Icon names, or glyphs when `nerd_font` is set.
#[derive(Debug, Deserialize)]
pub struct Buttons {
    #[serde(default = "icon_previous")]
    pub previous: String,
    #[serde(default = "icon_next")]
    pub next: String,
    #[serde(default = "icon_play")]
    pub play: String,
    #[serde(default = "icon_pause")]
    pub pause: String,
}
fn icon_previous() -> String {
    "media-skip-backward-symbolic".into()
}
fn icon_next() -> String {
    "media-skip-forward-symbolic".into()
}
fn icon_play() -> String {
    "media-playback-start-symbolic".into()
}
fn icon_pause() -> String {
    "media-playback-pause-symbolic".into()
}
impl Default for Buttons {
    fn default() -> Self {
        Self {
            previous: icon_previous(),
            next: icon_next(),
            play: icon_play(),
            pause: icon_pause(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Output {
    #[serde(default)]
    pub snapshot_path: Option<String>,
    #[serde(default)]
    pub events_path: Option<String>,
    #[serde(default)]
    pub pretty_snapshot: bool,
}

#[derive(Debug, Deserialize)]
pub struct Logging {
    #[serde(default = "default_level")]
    pub level: String,
}
fn default_level() -> String {
    "warn".into()
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            service: service_name(&self.player.name),
            command_timeout: Duration::from_millis(self.player.command_timeout_ms),
            ..ManagerConfig::default()
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(expand(
            self.output
                .snapshot_path
                .as_deref()
                .unwrap_or("$XDG_RUNTIME_DIR/wayglance/player/state.json"),
        ))
    }

    pub fn events_path(&self) -> PathBuf {
        PathBuf::from(expand(
            self.output
                .events_path
                .as_deref()
                .unwrap_or("$XDG_RUNTIME_DIR/wayglance/player/events.jsonl"),
        ))
    }
}

/// Map the configured player name onto a bus name. `None` selects any player.
pub fn service_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("any") {
        None
    } else if name.starts_with(MPRIS_PREFIX) || name.starts_with(':') {
        Some(name.to_owned())
    } else {
        Some(format!("{MPRIS_PREFIX}{name}"))
    }
}

// ------------------------- Paths -------------------------

pub fn runtime_dir() -> String {
    std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| {
        let uid = nix::unistd::Uid::current().as_raw();
        format!("/run/user/{uid}")
    })
}

/// `$XDG_RUNTIME_DIR/wayglance/player/player.sock`
pub fn socket_path() -> PathBuf {
    PathBuf::from(format!("{}/wayglance/player/player.sock", runtime_dir()))
}

pub fn expand(path: &str) -> String {
    let mut s = path.to_string();
    if let Some(home) = dirs::home_dir() {
        s = s.replace("$HOME", home.to_string_lossy().as_ref());
    }
    if let Some(cfg) = dirs::config_dir() {
        s = s.replace("$XDG_CONFIG_HOME", cfg.to_string_lossy().as_ref());
    }
    if let Some(cache) = dirs::cache_dir() {
        s = s.replace("$XDG_CACHE_HOME", cache.to_string_lossy().as_ref());
    }
    s.replace("$XDG_RUNTIME_DIR", &runtime_dir())
}

// ------------------------- Config I/O -------------------------

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wayglance").join("player.toml"))
}

/// Read an explicit config file, or the default one. A missing default file
/// yields the defaults; a missing explicit file is an error.
pub fn read_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound && explicit.is_none() => {
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading config {}", path.display()));
        }
    };
    parse_config(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_config(text: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(text).context("parsing toml")?;
    Ok(cfg)
}
