//! Line-oriented operator console on stdin.
//!
//! ```text
//! list                      summaries of every channel
//! show <channel>            merged timeline of one channel
//! focus <channel>           open a channel (resets its unread count)
//! unfocus
//! refresh <channel>         retry the history fetch
//! send <channel> <text...>  post a message
//! channels <a,b,c>          replace the subscribed channel set
//! quit
//! ```

use tracing::warn;

use crate::commands::{channels, messaging};
use crate::config::parse_channel_list;
use crate::state::SharedState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Show(String),
    Focus(String),
    Unfocus,
    Refresh(String),
    Send { channel: String, text: String },
    Channels(Vec<String>),
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines and unknown verbs yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let channel = || (!rest.is_empty()).then(|| rest.to_string());

        match verb {
            "list" => Some(Self::List),
            "show" => channel().map(Self::Show),
            "focus" => channel().map(Self::Focus),
            "unfocus" => Some(Self::Unfocus),
            "refresh" => channel().map(Self::Refresh),
            "send" => {
                let (channel, text) = rest.split_once(char::is_whitespace)?;
                Some(Self::Send {
                    channel: channel.to_string(),
                    text: text.trim().to_string(),
                })
            }
            "channels" => {
                let ids = parse_channel_list(rest);
                let names: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
                (!names.is_empty()).then(|| Self::Channels(names))
            }
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Run one command, printing its result. Returns `false` on quit.
pub async fn dispatch(state: &SharedState, command: ConsoleCommand) -> bool {
    let result = match command {
        ConsoleCommand::Quit => return false,
        ConsoleCommand::List => {
            for summary in channels::list_channels(state).await {
                print_json(&summary);
            }
            Ok(())
        }
        ConsoleCommand::Show(channel) => messaging::get_messages(state, channel)
            .await
            .map(|messages| messages.iter().for_each(print_json)),
        ConsoleCommand::Focus(channel) => channels::focus_channel(state, channel).await,
        ConsoleCommand::Unfocus => {
            channels::unfocus_channel(state).await;
            Ok(())
        }
        ConsoleCommand::Refresh(channel) => channels::refresh_history(state, channel).await,
        ConsoleCommand::Send { channel, text } => {
            messaging::send_message(state, channel, text).await
        }
        ConsoleCommand::Channels(ids) => channels::set_channels(state, ids)
            .await
            .map(|(opened, closed)| println!("opened {opened}, closed {closed}")),
    };

    if let Err(e) = result {
        warn!(error = %e, "Command failed");
        println!("error: {e}");
    }
    true
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "Could not serialize output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("list"), Some(ConsoleCommand::List));
        assert_eq!(
            ConsoleCommand::parse("  focus Miri(SungaiTujuh) "),
            Some(ConsoleCommand::Focus("Miri(SungaiTujuh)".into()))
        );
        assert_eq!(
            ConsoleCommand::parse("send Sindumin-Merapok  jam 2 jam  "),
            Some(ConsoleCommand::Send {
                channel: "Sindumin-Merapok".into(),
                text: "jam 2 jam".into(),
            })
        );
        assert_eq!(
            ConsoleCommand::parse("channels a, b"),
            Some(ConsoleCommand::Channels(vec!["a".into(), "b".into()]))
        );
        assert_eq!(ConsoleCommand::parse("exit"), Some(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_rejects_incomplete_lines() {
        assert_eq!(ConsoleCommand::parse(""), None);
        assert_eq!(ConsoleCommand::parse("focus"), None);
        assert_eq!(ConsoleCommand::parse("send Lawas(ICQSMengkalap)"), None);
        assert_eq!(ConsoleCommand::parse("dance"), None);
    }
}
