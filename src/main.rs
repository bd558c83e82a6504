//! wayglance-playerd: keeps one MPRIS player connected and publishes its state for bars.
//! - Connection manager from the library (zbus 3.x session bus, reconnects with backoff).
//! - JSON output (camelCase): atomic `state.json` plus `events.jsonl`.
//! - Control socket for play-pause/next/previous/update.
//!
//! Notes:
//! - Single-threaded runtime; the IPC listener runs on its own std thread.
//! - SIGHUP forces a re-poll; SIGINT/SIGTERM shut the manager down cleanly.

#![deny(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::perf)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

use std::{env, fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use log::{error, info};
use tokio::{
    signal::unix::{signal, SignalKind},
    task,
};
use wayglance_player::{
    config::{read_config, socket_path},
    ipc,
    output::StateWriter,
    DbusTransport, PlayerHandle,
};

// ------------------------- Args -------------------------

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    player: Option<String>,
}

fn usage() {
    eprintln!(
        "{}",
        r"Usage:
  wayglance-playerd [--config <path>] [--player <name>]

  --config   config file (default: $XDG_CONFIG_HOME/wayglance/player.toml)
  --player   player to follow: any | <short name> | <bus name>"
    );
}

fn parse_args() -> Result<Args> {
    let mut out = Args::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                out.config = Some(args.next().context("--config needs a path")?.into());
            }
            "--player" => {
                out.player = Some(args.next().context("--player needs a name")?);
            }
            "-h" | "--help" => {
                usage();
                std::process::exit(0);
            }
            other => {
                usage();
                bail!("unknown argument {other}");
            }
        }
    }
    Ok(out)
}

// ------------------------- Main -------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = parse_args()?;
    let mut cfg = read_config(args.config.as_deref())?;
    if let Some(player) = args.player {
        cfg.player.name = player;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cfg.logging.level.as_str()),
    )
    .init();

    // Initial blank snapshot
    let mut writer = StateWriter::new(&cfg);
    writer.ensure_dirs();
    writer.write().context("writing initial snapshot")?;

    let transport = DbusTransport::session()
        .await
        .context("connecting to the session bus")?;
    let player = PlayerHandle::spawn(transport, cfg.manager_config(), writer);
    info!("following player {:?}", cfg.player.name);

    // SIGHUP: re-poll the player
    let hup_commands = player.commands();
    task::spawn(async move {
        if let Ok(mut hup) = signal(SignalKind::hangup()) {
            while hup.recv().await.is_some() {
                info!("SIGHUP received, refreshing");
                hup_commands.update();
            }
        }
    });

    // IPC server (blocking Unix socket on its own thread)
    let ipc_commands = player.commands();
    let sock = socket_path();
    std::thread::Builder::new()
        .name("wayglance-ipc".into())
        .spawn(move || {
            if let Err(e) = ipc::serve_blocking(&sock, &ipc_commands) {
                error!("ipc server error: {e:#}");
            }
        })
        .context("spawning ipc thread")?;

    let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }

    info!("shutting down");
    player.shutdown().await;
    let _ = fs::remove_file(socket_path());
    Ok(())
}
