use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport commands a UI can issue. Fire-and-forget; see `PlayerHandle::send_command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    Previous,
    PlayPause,
    Next,
}

impl Command {
    /// MPRIS `org.mpris.MediaPlayer2.Player` method invoked for this command.
    pub fn method(self) -> &'static str {
        match self {
            Command::Previous => "Previous",
            Command::PlayPause => "PlayPause",
            Command::Next => "Next",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

impl std::str::FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "previous" | "prev" => Ok(Command::Previous),
            "play-pause" | "toggle" => Ok(Command::PlayPause),
            "next" => Ok(Command::Next),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_map_to_mpris_methods() {
        assert_eq!(Command::Previous.method(), "Previous");
        assert_eq!(Command::PlayPause.method(), "PlayPause");
        assert_eq!(Command::Next.method(), "Next");
    }

    #[test]
    fn commands_parse_from_cli_names() {
        assert_eq!("play-pause".parse::<Command>(), Ok(Command::PlayPause));
        assert_eq!("prev".parse::<Command>(), Ok(Command::Previous));
        assert!("stop".parse::<Command>().is_err());
    }

    #[test]
    fn commands_serialize_kebab_case() {
        let json = serde_json::to_string(&Command::PlayPause).unwrap();
        assert_eq!(json, "\"play-pause\"");
    }
}
