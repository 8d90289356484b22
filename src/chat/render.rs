//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction that allows
//! for different output styles. The default implementation uses ANSI
//! escape codes to set the assistant's replies and errors apart from
//! informational text.

use std::io::{self, Stdout, Write};

use crate::types::ConversationTurn;

/// ANSI escape code for bold text (used for banners).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for informational messages).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the user label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

const RULE_WIDTH: usize = 60;

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
pub trait Renderer: Send {
    /// Print the banner shown at startup and by `/help`.
    fn print_welcome(&mut self, model_id: &str);

    /// Print the assistant's reply to one message.
    fn print_reply(&mut self, text: &str);

    /// Print the conversation history as a numbered list.
    fn print_history(&mut self, history: &[ConversationTurn]);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Consumes the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    // Terminal output is best effort.
    fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_welcome(&mut self, model_id: &str) {
        let rule = "=".repeat(RULE_WIDTH);
        let title = self.styled(ANSI_BOLD, &format!("  palaver chat ({model_id})"));
        let banner = format!(
            "{rule}\n{title}\n{rule}\n\nCommands:\n  \
             - Type your message and press Enter to chat\n  \
             - Type '/clear' to clear conversation history\n  \
             - Type '/history' to view conversation history\n  \
             - Type '/exit' or '/quit' to exit\n  \
             - Type '/help' to show this help message\n\n{rule}\n\n"
        );
        self.emit(&banner);
    }

    fn print_reply(&mut self, text: &str) {
        let label = self.styled(ANSI_CYAN, "Assistant:");
        self.emit(&format!("\n{label} {text}\n\n"));
    }

    fn print_history(&mut self, history: &[ConversationTurn]) {
        if history.is_empty() {
            self.emit("No conversation history.\n");
            return;
        }
        let rule = "-".repeat(RULE_WIDTH);
        let mut text = format!("\n{rule}\nConversation History:\n{rule}\n");
        for (index, turn) in history.iter().enumerate() {
            let style = match turn.role {
                crate::types::Role::User => ANSI_GREEN,
                crate::types::Role::Assistant => ANSI_CYAN,
            };
            let label = self.styled(style, &format!("{}:", turn.role.label()));
            text.push_str(&format!("\n[{}] {label}\n    {}\n", index + 1, turn.content));
        }
        text.push_str(&rule);
        text.push_str("\n\n");
        self.emit(&text);
    }

    fn print_error(&mut self, error: &str) {
        let text = self.styled(ANSI_RED, &format!("Error: {error}"));
        self.emit(&format!("\n{text}\n\n"));
    }

    fn print_info(&mut self, info: &str) {
        let text = self.styled(ANSI_DIM, info);
        self.emit(&format!("{text}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(use_color: bool, f: impl FnOnce(&mut PlainTextRenderer<Vec<u8>>)) -> String {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), use_color);
        f(&mut renderer);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn empty_history() {
        let out = render(false, |r| r.print_history(&[]));
        assert_eq!(out, "No conversation history.\n");
    }

    #[test]
    fn numbered_history() {
        let history = vec![
            ConversationTurn::user("hi"),
            ConversationTurn::assistant("hello"),
        ];
        let out = render(false, |r| r.print_history(&history));
        assert!(out.contains("[1] User:\n    hi\n"));
        assert!(out.contains("[2] Assistant:\n    hello\n"));
    }

    #[test]
    fn welcome_lists_commands() {
        let out = render(false, |r| r.print_welcome("gpt2"));
        assert!(out.contains("gpt2"));
        for command in ["/clear", "/history", "/exit", "/quit", "/help"] {
            assert!(out.contains(command));
        }
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn color_wraps_labels() {
        let out = render(true, |r| r.print_reply("ok"));
        assert_eq!(out, format!("\n{ANSI_CYAN}Assistant:{ANSI_RESET} ok\n\n"));
        let out = render(false, |r| r.print_reply("ok"));
        assert_eq!(out, "\nAssistant: ok\n\n");
    }
}
