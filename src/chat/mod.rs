//! Interactive chat on top of a text-generation server.
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and layered configuration
//! - [`session`]: the conversation log, prompt building and reply cleaning
//! - [`commands`]: slash command parsing
//! - [`render`]: terminal output

mod commands;
mod config;
mod render;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    ChatArgs, ChatConfig, DEFAULT_HISTORY_WINDOW, DEFAULT_HUB_ENDPOINT, DEFAULT_MODEL,
    DEFAULT_SERVER_URL, DEFAULT_SYSTEM_PROMPT, FileConfig,
};
pub use render::{PlainTextRenderer, Renderer};
pub use session::{ChatSession, END_OF_TURN_MARKERS, Reply, clean_reply};
