use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

/// Operator input, one per stdin line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// An empty line acts like the start/stop button.
    Toggle,
    Quit,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown command {0:?}, expected start, stop, toggle or quit")]
pub struct UnknownCommand(String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "" | "t" | "toggle" => Ok(Self::Toggle),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// Forward parsed stdin lines until stdin closes or the driver goes away.
pub async fn read_stdin(commands: Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match line.parse::<Command>() {
                Ok(command) => {
                    if commands.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "ignoring input"),
            },
            Ok(None) => {
                debug!("stdin closed, no more commands");
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!(" STOP \n".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!("".parse::<Command>().unwrap(), Command::Toggle);
        assert_eq!("toggle".parse::<Command>().unwrap(), Command::Toggle);
        assert_eq!("q".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_unknown() {
        let err = "faster".parse::<Command>().unwrap_err();
        assert!(err.to_string().contains("\"faster\""));
    }
}
