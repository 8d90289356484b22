//! Download a model repository from the hub for offline use.
//!
//! ```bash
//! palaver-fetch --model Qwen/Qwen2.5-7B-Instruct --path ./models
//! palaver-fetch --model microsoft/Phi-3-mini-4k-instruct --name phi3 --config-only
//! ```

use std::path::PathBuf;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;

use palaver::chat::{DEFAULT_HUB_ENDPOINT, DEFAULT_MODEL};
use palaver::hub::{HubClient, model_dir_name};
use palaver::model::TOKENIZER_CONFIG_FILE;
use palaver::{TokenizerConfig, init_tracing};

const DEFAULT_PATH: &str = "./models";

#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
struct FetchArgs {
    #[arrrg(optional, "Model identifier (default: Qwen/Qwen2.5-7B-Instruct)", "MODEL")]
    model: Option<String>,
    #[arrrg(optional, "Directory to save models under (default: ./models)", "DIR")]
    path: Option<String>,
    #[arrrg(optional, "Name of the model directory (default: model id with / replaced by _)", "NAME")]
    name: Option<String>,
    #[arrrg(flag, "Only fetch the JSON configuration files")]
    config_only: bool,
}

const TROUBLESHOOTING: &str = "Troubleshooting:
  1. Check your internet connection
  2. Verify the model name is correct
  3. Check disk space (models can be 10-50GB+)
  4. Gated models need an access token in HF_TOKEN";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = FetchArgs::from_command_line_relaxed("palaver-fetch [OPTIONS]");
    init_tracing("palaver=info");

    let model = args.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let root = PathBuf::from(args.path.unwrap_or_else(|| DEFAULT_PATH.to_string()));
    let dest = root.join(model_dir_name(&model, args.name.as_deref()));
    let dest = std::path::absolute(&dest).unwrap_or(dest);

    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    let endpoint = env("HF_ENDPOINT").unwrap_or_else(|| DEFAULT_HUB_ENDPOINT.to_string());
    let hub = HubClient::new(&endpoint, env("HF_TOKEN"))?;

    let rule = "=".repeat(60);
    println!("{rule}");
    println!("Downloading Model: {model}");
    println!("Local Path: {}", dest.display());
    println!("{rule}");

    println!("\n[1/2] Downloading model files...");
    let summary = match hub.fetch_model(&model, &dest, args.config_only).await {
        Ok(summary) => summary,
        Err(err) => fail(&format!("Error downloading model: {err}")),
    };
    println!(
        "Downloaded {} files ({} bytes), {} already present.",
        summary.downloaded.len(),
        summary.bytes,
        summary.skipped.len()
    );

    println!("\n[2/2] Verifying tokenizer configuration...");
    match TokenizerConfig::load_local(&dest) {
        Ok(Some(config)) => match config.prompt_template() {
            Ok(template) if template.is_chat_template() => println!("Chat template verified."),
            Ok(_) => println!("No chat template; plain prompts will be used."),
            Err(err) => fail(&format!("Chat template does not compile: {err}")),
        },
        Ok(None) => println!("No {TOKENIZER_CONFIG_FILE}; plain prompts will be used."),
        Err(err) => fail(&format!("Failed to read {TOKENIZER_CONFIG_FILE}: {err}")),
    }

    println!("\n{rule}");
    println!("Download Complete!");
    println!("{rule}");
    println!("\nModel saved to: {}", dest.display());
    println!("\nTo use this local model, pass:");
    println!("  --local-model-path \"{}\"", dest.display());
    println!("\nOr set environment variable:");
    println!("  export LOCAL_MODEL_PATH=\"{}\"", dest.display());
    println!("\n{rule}");
    Ok(())
}

fn fail(message: &str) -> ! {
    eprintln!("\n{message}");
    eprintln!("\n{TROUBLESHOOTING}");
    std::process::exit(1);
}
