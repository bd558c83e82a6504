//! Control socket: one JSON object per line, e.g. `{"cmd":"play-pause"}`.
//!
//! Blocking std sockets on a dedicated blocking task, one thread per client;
//! commands are handed to the manager through a [`CommandSender`].

use std::{
    fs,
    io::{self, BufRead, BufReader, Write},
    os::unix::{
        fs::PermissionsExt,
        net::{UnixListener, UnixStream},
    },
    path::Path,
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{command::Command, manager::CommandSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum IpcCmd {
    #[serde(rename = "play-pause")]
    PlayPause,
    #[serde(rename = "next")]
    Next,
    #[serde(rename = "previous")]
    Previous,
    #[serde(rename = "update")]
    Update,
}

impl IpcCmd {
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }

    /// Forward to the manager. `false` once the manager has stopped.
    pub fn dispatch(self, commands: &CommandSender) -> bool {
        match self {
            IpcCmd::PlayPause => commands.send_command(Command::PlayPause),
            IpcCmd::Next => commands.send_command(Command::Next),
            IpcCmd::Previous => commands.send_command(Command::Previous),
            IpcCmd::Update => commands.update(),
        }
        commands.is_alive()
    }
}

impl From<Command> for IpcCmd {
    fn from(c: Command) -> Self {
        match c {
            Command::Previous => IpcCmd::Previous,
            Command::PlayPause => IpcCmd::PlayPause,
            Command::Next => IpcCmd::Next,
        }
    }
}

fn handle_stream_blocking(commands: &CommandSender, mut stream: UnixStream) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let txt = line.trim();
        if txt.is_empty() {
            continue;
        }
        let ok = match IpcCmd::parse(txt) {
            Some(cmd) => {
                debug!("ipc: {cmd:?}");
                cmd.dispatch(commands)
            }
            None => false,
        };
        writeln!(stream, "{{\"ok\":{ok}}}")?;
        stream.flush()?;
    }
}

/// Bind `path` (replacing a stale socket) and serve until the listener fails.
pub fn serve_blocking(path: &Path, commands: &CommandSender) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let _ = fs::remove_file(path);
    let listener = UnixListener::bind(path)?;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));

    for conn in listener.incoming() {
        match conn {
            Ok(stream) => {
                let commands = commands.clone();
                std::thread::spawn(move || {
                    if let Err(e) = handle_stream_blocking(&commands, stream) {
                        debug!("ipc: client error: {e}");
                    }
                });
            }
            Err(e) => {
                warn!("ipc: accept error: {e:#}");
            }
        }
    }
    Ok(())
}
