use std::{
    env,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Seek, SeekFrom, Write},
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use wayglance_player::{
    config::{read_config, socket_path, Config},
    ipc::IpcCmd,
    output::UiState,
};

fn usage() {
    eprintln!(
        "{}",
        r#"Usage:
  wayglance-playerc play-pause
  wayglance-playerc next
  wayglance-playerc previous
  wayglance-playerc update
  wayglance-playerc status [--truncate <n>] [--pango-escape]
  wayglance-playerc watch [--truncate <n>] [--pango-escape]

--pango-escape   Escape Pango markup: & < > ' " -> &amp; &lt; &gt; &apos; &quot;"#
    );
}

fn output_paths() -> (PathBuf, PathBuf) {
    let cfg = read_config(None).unwrap_or_else(|e| {
        eprintln!("wayglance-playerc: {e:#}, using default paths");
        Config::default()
    });
    (cfg.snapshot_path(), cfg.events_path())
}

fn main() {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        usage();
        std::process::exit(2);
    }

    let cmd = args.remove(0);
    let ipc = match cmd.as_str() {
        "play-pause" => Some(IpcCmd::PlayPause),
        "next" => Some(IpcCmd::Next),
        "previous" => Some(IpcCmd::Previous),
        "update" => Some(IpcCmd::Update),
        _ => None,
    };
    if let Some(ipc) = ipc {
        match send_over_socket(ipc) {
            Ok(true) => return,
            Ok(false) => {
                eprintln!("wayglance-playerc: daemon rejected {cmd}");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("wayglance-playerc: {}: {e}", socket_path().display());
                std::process::exit(1);
            }
        }
    }

    let opts = match LabelOpts::parse(args) {
        Some(opts) => opts,
        None => {
            usage();
            std::process::exit(2);
        }
    };
    let (state_path, events_path) = output_paths();
    match cmd.as_str() {
        "status" => match label_from_snapshot(&state_path, &opts) {
            Some(line) => println!("{line}"),
            None => std::process::exit(1),
        },
        "watch" => {
            if let Some(line) = label_from_snapshot(&state_path, &opts) {
                println!("{line}");
                io::stdout().flush().ok();
            }
            follow_events_and_print(&events_path, &opts);
        }
        _ => {
            usage();
            std::process::exit(2);
        }
    }
}

/// Returns the daemon's `ok` flag.
fn send_over_socket(cmd: IpcCmd) -> io::Result<bool> {
    let payload = serde_json::to_string(&cmd)?;
    let mut stream = UnixStream::connect(socket_path())?;
    stream.set_read_timeout(Some(Duration::from_secs(3)))?;
    stream.write_all(payload.as_bytes())?;
    stream.write_all(b"\n")?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let reply: serde_json::Value = serde_json::from_str(line.trim())?;
    Ok(reply.get("ok").and_then(serde_json::Value::as_bool) == Some(true))
}

// ------------------------- Labels -------------------------

#[derive(Debug, Default)]
struct LabelOpts {
    truncate: Option<usize>,
    pango: bool,
}

impl LabelOpts {
    fn parse(mut args: Vec<String>) -> Option<Self> {
        let mut opts = Self::default();
        while !args.is_empty() {
            match args[0].as_str() {
                "--truncate" if args.len() > 1 => {
                    opts.truncate = Some(args[1].parse::<usize>().ok()?);
                    args.drain(..2);
                }
                "--pango-escape" => {
                    opts.pango = true;
                    args.remove(0);
                }
                _ => return None,
            }
        }
        Some(opts)
    }
}

fn label_from_snapshot(path: &Path, opts: &LabelOpts) -> Option<String> {
    let txt = fs::read_to_string(path).ok()?;
    let st: UiState = serde_json::from_str(&txt).ok()?;
    Some(format_label(&st, opts))
}

fn format_label(st: &UiState, opts: &LabelOpts) -> String {
    let mut out = st.track.clone();
    if let Some(n) = opts.truncate {
        if out.chars().count() > n {
            out = out.chars().take(n.saturating_sub(1)).collect::<String>() + "…";
        }
    }
    if opts.pango {
        pango_escape(&out)
    } else {
        out
    }
}

fn pango_escape(s: &str) -> String {
    // & first
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

fn follow_events_and_print(path: &Path, opts: &LabelOpts) {
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    let _ = OpenOptions::new().create(true).append(true).open(path);

    loop {
        let Ok(file) = File::open(path) else {
            thread::sleep(Duration::from_millis(300));
            continue;
        };
        let mut reader = BufReader::new(file);
        let _ = reader.get_mut().seek(SeekFrom::End(0));

        let mut line = String::new();
        let mut last = None;
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => thread::sleep(Duration::from_millis(250)),
                Ok(_) => {
                    let Ok(st) = serde_json::from_str::<UiState>(line.trim()) else {
                        continue;
                    };
                    let out = format_label(&st, opts);
                    if last.as_ref() != Some(&out) {
                        println!("{out}");
                        let _ = io::stdout().flush();
                        last = Some(out);
                    }
                }
                Err(_) => thread::sleep(Duration::from_millis(250)),
            }
        }
    }
}
