//! Web front end: a chat page plus a small JSON API.
//!
//! The server starts listening immediately and loads the model in the
//! background; `/api/status` reports when it is ready.
//!
//! ```bash
//! palaver-web --port 8000 --server http://127.0.0.1:8080
//! ```

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use tokio::net::TcpListener;

use palaver::chat::{ChatArgs, ChatConfig};
use palaver::server::{Readiness, SessionState, serve};
use palaver::{ModelLoader, init_tracing};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
struct WebArgs {
    #[arrrg(optional, "Host to bind to (default: 0.0.0.0)", "HOST")]
    host: Option<String>,
    #[arrrg(optional, "Port to bind to (default: 8000)", "PORT")]
    port: Option<u16>,
    #[arrrg(optional, "YAML configuration file", "FILE")]
    config: Option<String>,
    #[arrrg(optional, "Model identifier (default: Qwen/Qwen2.5-7B-Instruct)", "MODEL")]
    model: Option<String>,
    #[arrrg(optional, "Local model directory (overrides the hub)", "DIR")]
    local_model_path: Option<String>,
    #[arrrg(optional, "Inference server URL (default: http://127.0.0.1:8080)", "URL")]
    server: Option<String>,
    #[arrrg(optional, "Device: auto, cpu, cuda", "DEVICE")]
    device: Option<String>,
    #[arrrg(optional, "System prompt for new conversations", "PROMPT")]
    system: Option<String>,
    #[arrrg(optional, "Max new tokens per reply (default: 512)", "TOKENS")]
    max_tokens: Option<u32>,
    #[arrrg(optional, "Sampling temperature (default: 0.7)", "TEMP")]
    temperature: Option<String>,
    #[arrrg(optional, "Nucleus sampling threshold (default: 0.9)", "P")]
    top_p: Option<String>,
    #[arrrg(flag, "Use greedy decoding instead of sampling")]
    greedy: bool,
    #[arrrg(optional, "Prior turns kept in each prompt (default: 10)", "TURNS")]
    history_window: Option<u32>,
    #[arrrg(optional, "Truncate prompts beyond this many tokens (default: 2048)", "TOKENS")]
    max_input_tokens: Option<u32>,
    #[arrrg(flag, "Request 8-bit quantized weights")]
    load_in_8bit: bool,
    #[arrrg(flag, "Request 4-bit quantized weights")]
    load_in_4bit: bool,
    #[arrrg(optional, "Generation request timeout in seconds (default: 300)", "SECS")]
    timeout: Option<u64>,
}

impl WebArgs {
    fn split(self) -> (String, u16, ChatArgs) {
        let host = self.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = self.port.unwrap_or(DEFAULT_PORT);
        let chat = ChatArgs {
            config: self.config,
            model: self.model,
            local_model_path: self.local_model_path,
            server: self.server,
            device: self.device,
            system: self.system,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            greedy: self.greedy,
            history_window: self.history_window,
            max_input_tokens: self.max_input_tokens,
            load_in_8bit: self.load_in_8bit,
            load_in_4bit: self.load_in_4bit,
            timeout: self.timeout,
            no_color: true,
        };
        (host, port, chat)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = WebArgs::from_command_line_relaxed("palaver-web [OPTIONS]");
    init_tracing("palaver=info,tower_http=info");
    let (host, port, chat_args) = args.split();
    let config = ChatConfig::resolve(chat_args)?;

    let rule = "=".repeat(60);
    println!("{rule}");
    println!("Starting palaver web server");
    println!("{rule}");
    println!("Server will be available at:");
    println!("  - Local: http://localhost:{port}");
    println!("  - Network: http://<host-ip>:{port}");
    println!("{rule}");
    println!("\nWaiting for the model to load ({})...\n", config.model_id);

    let loader = ModelLoader::new(config)?;
    let listener = TcpListener::bind((host.as_str(), port)).await?;

    let readiness = Readiness::new();
    readiness.spawn_loader(loader);

    let watcher = readiness.clone();
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received; shutting down");
            }
            err = watcher.failed() => {
                tracing::error!(error = %err, "model failed to load; shutting down");
            }
        }
    };
    serve(listener, readiness.clone(), shutdown).await?;

    if let SessionState::Failed(err) = readiness.state() {
        eprintln!("Failed to initialize chatbot: {err}");
        eprintln!("{}", palaver::LOAD_TROUBLESHOOTING);
        std::process::exit(1);
    }
    Ok(())
}
