//! Interactive console commands

use std::fmt;
use std::str::FromStr;

/// One line typed at the player prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    Forward,
    Rewind,
    Next,
    Previous,
    Select(String),
    List,
    Status,
    /// Re-read the catalog for narration that arrived since startup
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command '{}' (try 'help')", self.0)
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let rest = words.collect::<Vec<_>>().join(" ");

        let command = match verb.as_str() {
            "play" | "p" => Command::Play,
            "pause" => Command::Pause,
            "stop" | "s" => Command::Stop,
            "ff" | "forward" => Command::Forward,
            "rw" | "rewind" | "back" => Command::Rewind,
            "next" | "n" => Command::Next,
            "prev" | "previous" => Command::Previous,
            "select" | "story" if !rest.is_empty() => Command::Select(rest),
            "list" | "ls" => Command::List,
            "status" | "st" => Command::Status,
            "reload" => Command::Reload,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(ParseCommandError(line.trim().to_string())),
        };
        Ok(command)
    }
}

pub const HELP: &str = "\
commands:
  play | pause | stop      transport
  ff | rw                  skip forward / back
  next | prev              change story
  select <id>              jump to a story
  list | status            show stories / transport
  reload                   pick up new narration
  quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport_words() {
        assert_eq!("play".parse(), Ok(Command::Play));
        assert_eq!("  FF ".parse(), Ok(Command::Forward));
        assert_eq!("rw".parse(), Ok(Command::Rewind));
        assert_eq!("prev".parse(), Ok(Command::Previous));
        assert_eq!("reload".parse(), Ok(Command::Reload));
    }

    #[test]
    fn test_select_takes_id() {
        assert_eq!("select 7".parse(), Ok(Command::Select("7".to_string())));
        assert!("select".parse::<Command>().is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = "dance".parse::<Command>().unwrap_err();
        assert!(err.to_string().contains("dance"));
        assert!("".parse::<Command>().is_err());
    }
}
