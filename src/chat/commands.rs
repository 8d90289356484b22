//! Slash command parsing for the chat application.
//!
//! Commands control the session and are never sent to the model. A line is
//! a command only when the whole trimmed line names one; anything else,
//! including unrecognized `/words`, is an ordinary message.

/// A parsed chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    Clear,

    /// Print the conversation history.
    History,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use palaver::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/QUIT"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/history"), Some(ChatCommand::History));
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    if !input.starts_with('/') {
        return None;
    }

    match input.to_lowercase().as_str() {
        "/clear" => Some(ChatCommand::Clear),
        "/history" => Some(ChatCommand::History),
        "/help" => Some(ChatCommand::Help),
        "/exit" | "/quit" => Some(ChatCommand::Quit),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear     Clear conversation history
  /history   Show conversation history
  /help      Show this help message
  /exit      Exit the chat
  /quit      Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /Exit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_clear_and_history() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/History"), Some(ChatCommand::History));
    }

    #[test]
    fn parse_help() {
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/HELP\n"), Some(ChatCommand::Help));
    }

    #[test]
    fn commands_must_fill_the_line() {
        assert_eq!(parse_command("/clear everything"), None);
        assert_eq!(parse_command("/quitting"), None);
        assert_eq!(parse_command("please /quit"), None);
    }

    #[test]
    fn unknown_slash_lines_are_messages() {
        assert_eq!(parse_command("/model gpt2"), None);
        assert_eq!(parse_command("/"), None);
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for command in ["/clear", "/history", "/help", "/exit", "/quit"] {
            assert!(help.contains(command), "missing {command}");
            assert!(parse_command(command).is_some());
        }
    }
}
