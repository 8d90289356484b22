//! Interactive terminal chat with a model behind a text-generation server.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! palaver-chat
//!
//! # Specify a model and server
//! palaver-chat --model microsoft/Phi-3-mini-4k-instruct --server http://gpu-box:8080
//!
//! # Use a downloaded tokenizer configuration
//! palaver-chat --local-model-path ./models/Qwen_Qwen2.5-7B-Instruct
//!
//! # Disable colors (useful for piping output)
//! palaver-chat --no-color
//! ```
//!
//! # Commands
//!
//! - `/help` - Show available commands
//! - `/clear` - Clear conversation history
//! - `/history` - Show conversation history
//! - `/exit` or `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use palaver::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, help_text, parse_command,
};
use palaver::{LOAD_TROUBLESHOOTING, ModelLoader, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("palaver-chat [OPTIONS]");
    init_tracing("palaver=warn");
    let config = ChatConfig::resolve(args)?;

    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    renderer.print_welcome(&config.model_id);
    renderer.print_info("Loading model...");

    let loader = ModelLoader::new(config)?;
    let mut session = match loader.load().await {
        Ok(session) => session,
        Err(err) => {
            renderer.print_error(&format!("Failed to initialize chatbot: {err}"));
            eprintln!("{LOAD_TROUBLESHOOTING}");
            std::process::exit(1);
        }
    };
    renderer.print_info("Chatbot is ready! Start chatting...\n");

    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while a reply is generating ends the session once it arrives.
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    loop {
        if interrupted.load(Ordering::Relaxed) {
            renderer.print_info("\nInterrupted by user. Exiting...");
            break;
        }

        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => break,
                        ChatCommand::Clear => {
                            session.clear_history();
                            renderer.print_info("Conversation history cleared.");
                        }
                        ChatCommand::History => {
                            renderer.print_history(&session.history());
                        }
                        ChatCommand::Help => {
                            renderer.print_info(help_text());
                        }
                    }
                    continue;
                }

                let reply = session.send_message(line).await;
                renderer.print_reply(reply.text());
            }
            Err(ReadlineError::Interrupted) => {
                renderer.print_info("\nInterrupted by user. Exiting...");
                break;
            }
            Err(ReadlineError::Eof) => {
                renderer.print_info("\nExiting...");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    renderer.print_info("Goodbye!");
    Ok(())
}
