//! Interactive commands read from stdin while a transfer runs

use std::fmt;
use std::str::FromStr;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Pause at the next chunk boundary
    Pause,
    /// Resume a paused transfer
    Resume,
    /// Cancel and delete partial output
    Cancel,
    /// Supersede the running transfer with a new URL
    Start(String),
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| "empty command".to_string())?
            .to_lowercase();
        let arg = parts.next();

        match (verb.as_str(), arg) {
            ("pause" | "p", None) => Ok(Self::Pause),
            ("resume" | "r", None) => Ok(Self::Resume),
            ("cancel" | "c", None) => Ok(Self::Cancel),
            ("start" | "s", Some(url)) if parts.next().is_none() => Ok(Self::Start(url.to_string())),
            ("start" | "s", None) => Err("start needs a URL".to_string()),
            _ => Err(format!(
                "Unknown command: {s}. Valid commands: pause, resume, cancel, start <url>"
            )),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Cancel => write!(f, "cancel"),
            Self::Start(url) => write!(f, "start {url}"),
        }
    }
}
