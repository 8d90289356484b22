//! Configuration types for the chat front ends.
//!
//! Configuration is read once at startup and layered: built-in defaults, an
//! optional YAML file, environment variables, then command-line flags parsed
//! via `arrrg`. Nothing is reloaded while the process runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{Device, GenerationParams, Quantization};

/// Default model identifier on the hub.
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-7B-Instruct";

/// Default address of the text-generation server.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// Default model hub.
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

/// Default system instruction prepended to a fresh conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, harmless, and honest assistant.";

/// Default number of prior turns included in each prompt.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Default per-request timeout for generation calls.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Command-line arguments shared by the chat and web binaries.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// YAML file with configuration values.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Model identifier on the hub.
    #[arrrg(optional, "Model identifier (default: Qwen/Qwen2.5-7B-Instruct)", "MODEL")]
    pub model: Option<String>,

    /// Local model directory that overrides the hub.
    #[arrrg(optional, "Local model directory (overrides the hub)", "DIR")]
    pub local_model_path: Option<String>,

    /// Base URL of the text-generation server.
    #[arrrg(optional, "Inference server URL (default: http://127.0.0.1:8080)", "URL")]
    pub server: Option<String>,

    /// Device selection override.
    #[arrrg(optional, "Device: auto, cpu, cuda", "DEVICE")]
    pub device: Option<String>,

    /// System prompt for new conversations.
    #[arrrg(optional, "System prompt for new conversations", "PROMPT")]
    pub system: Option<String>,

    /// Maximum new tokens per reply.
    #[arrrg(optional, "Max new tokens per reply (default: 512)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature (default: 0.7)", "TEMP")]
    pub temperature: Option<String>,

    /// Nucleus-sampling threshold.
    #[arrrg(optional, "Nucleus sampling threshold (default: 0.9)", "P")]
    pub top_p: Option<String>,

    /// Disable sampling.
    #[arrrg(flag, "Use greedy decoding instead of sampling")]
    pub greedy: bool,

    /// Number of prior turns kept in each prompt.
    #[arrrg(optional, "Prior turns kept in each prompt (default: 10)", "TURNS")]
    pub history_window: Option<u32>,

    /// Prompt token ceiling.
    #[arrrg(optional, "Truncate prompts beyond this many tokens (default: 2048)", "TOKENS")]
    pub max_input_tokens: Option<u32>,

    /// Request 8-bit weights.
    #[arrrg(flag, "Request 8-bit quantized weights")]
    pub load_in_8bit: bool,

    /// Request 4-bit weights.
    #[arrrg(flag, "Request 4-bit quantized weights")]
    pub load_in_4bit: bool,

    /// Generation timeout in seconds.
    #[arrrg(optional, "Generation request timeout in seconds (default: 300)", "SECS")]
    pub timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration values accepted in a YAML file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Model identifier on the hub.
    pub model: Option<String>,
    /// Local model directory.
    pub local_model_path: Option<PathBuf>,
    /// Base URL of the text-generation server.
    pub server_url: Option<String>,
    /// Model hub endpoint.
    pub hub_endpoint: Option<String>,
    /// Device selection.
    pub device: Option<Device>,
    /// System prompt.
    pub system_prompt: Option<String>,
    /// Prior turns kept in each prompt.
    pub history_window: Option<usize>,
    /// Maximum new tokens per reply.
    pub max_new_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus-sampling threshold.
    pub top_p: Option<f32>,
    /// Whether to sample.
    pub do_sample: Option<bool>,
    /// Prompt token ceiling.
    pub max_input_tokens: Option<u32>,
    /// Request 8-bit weights.
    pub load_in_8bit: Option<bool>,
    /// Request 4-bit weights.
    pub load_in_4bit: Option<bool>,
    /// Generation timeout in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Reads a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read config file {}", path.display()), err)
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Resolved configuration for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Model identifier on the hub.
    pub model_id: String,

    /// Local model directory that overrides the hub when it exists.
    pub local_model_path: Option<PathBuf>,

    /// Base URL of the text-generation server.
    pub server_url: String,

    /// Model hub endpoint used to fetch tokenizer configuration.
    pub hub_endpoint: String,

    /// Access token for gated hub models.
    pub hub_token: Option<String>,

    /// Expected device.
    pub device: Device,

    /// Requested weight quantization.
    pub quantization: Quantization,

    /// Fixed decoding parameters.
    pub generation: GenerationParams,

    /// System instruction prepended to a fresh conversation.
    pub system_prompt: String,

    /// Number of prior turns included in each prompt.
    pub history_window: usize,

    /// Timeout for a single generation request.
    pub request_timeout: Duration,

    /// Whether to use ANSI colors and styles in terminal output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            model_id: DEFAULT_MODEL.to_string(),
            local_model_path: None,
            server_url: DEFAULT_SERVER_URL.to_string(),
            hub_endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            hub_token: None,
            device: Device::Auto,
            quantization: Quantization::None,
            generation: GenerationParams::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            use_color: true,
        }
    }

    /// Resolves configuration from command-line arguments, the process
    /// environment and an optional YAML file.
    pub fn resolve(args: ChatArgs) -> Result<Self> {
        Self::resolve_with_env(args, |name| std::env::var(name).ok())
    }

    /// Like [`ChatConfig::resolve`] but reads environment variables through `lookup`.
    pub fn resolve_with_env<F>(args: ChatArgs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();
        if let Some(path) = args.config.as_deref() {
            config = config.apply_file(FileConfig::load(Path::new(path))?);
        }
        config = config.apply_env(lookup)?;
        config = config.apply_args(args)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies values from a YAML configuration file.
    pub fn apply_file(mut self, file: FileConfig) -> Self {
        if let Some(model) = file.model {
            self.model_id = model;
        }
        if file.local_model_path.is_some() {
            self.local_model_path = file.local_model_path;
        }
        if let Some(url) = file.server_url {
            self.server_url = url;
        }
        if let Some(hub) = file.hub_endpoint {
            self.hub_endpoint = hub;
        }
        if let Some(device) = file.device {
            self.device = device;
        }
        if let Some(prompt) = file.system_prompt {
            self.system_prompt = prompt;
        }
        if let Some(window) = file.history_window {
            self.history_window = window;
        }
        if let Some(tokens) = file.max_new_tokens {
            self.generation.max_new_tokens = tokens;
        }
        if let Some(temperature) = file.temperature {
            self.generation.temperature = temperature;
        }
        if let Some(top_p) = file.top_p {
            self.generation.top_p = top_p;
        }
        if let Some(do_sample) = file.do_sample {
            self.generation.do_sample = do_sample;
        }
        if let Some(tokens) = file.max_input_tokens {
            self.generation.max_input_tokens = tokens;
        }
        if file.load_in_8bit.is_some() || file.load_in_4bit.is_some() {
            self.quantization = Quantization::from_toggles(
                file.load_in_8bit.unwrap_or(false),
                file.load_in_4bit.unwrap_or(false),
            );
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        self
    }

    /// Applies environment overrides.
    ///
    /// Recognized variables: `PALAVER_MODEL`, `LOCAL_MODEL_PATH`,
    /// `PALAVER_SERVER_URL`, `FORCE_DEVICE`, `HF_ENDPOINT`, `HF_TOKEN`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(model) = lookup("PALAVER_MODEL") {
            self.model_id = model;
        }
        if let Some(path) = lookup("LOCAL_MODEL_PATH") {
            self.local_model_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("PALAVER_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(device) = lookup("FORCE_DEVICE") {
            self.device = match device.parse() {
                Ok(device) => device,
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring FORCE_DEVICE; using auto detection");
                    Device::Auto
                }
            };
        }
        if let Some(hub) = lookup("HF_ENDPOINT") {
            self.hub_endpoint = hub;
        }
        if let Some(token) = lookup("HF_TOKEN") {
            self.hub_token = Some(token);
        }
        Ok(self)
    }

    /// Applies command-line flags.
    pub fn apply_args(mut self, args: ChatArgs) -> Result<Self> {
        if let Some(model) = args.model {
            self.model_id = model;
        }
        if let Some(path) = args.local_model_path {
            self.local_model_path = Some(PathBuf::from(path));
        }
        if let Some(url) = args.server {
            self.server_url = url;
        }
        if let Some(device) = args.device {
            self.device = device
                .parse()
                .map_err(|err: String| Error::validation(err, Some("device".to_string())))?;
        }
        if let Some(prompt) = args.system {
            self.system_prompt = prompt;
        }
        if let Some(tokens) = args.max_tokens {
            self.generation.max_new_tokens = tokens;
        }
        if let Some(temperature) = args.temperature {
            self.generation.temperature = parse_f32(&temperature, "temperature")?;
        }
        if let Some(top_p) = args.top_p {
            self.generation.top_p = parse_f32(&top_p, "top_p")?;
        }
        if args.greedy {
            self.generation.do_sample = false;
        }
        if let Some(window) = args.history_window {
            self.history_window = window as usize;
        }
        if let Some(tokens) = args.max_input_tokens {
            self.generation.max_input_tokens = tokens;
        }
        if args.load_in_8bit || args.load_in_4bit {
            self.quantization = Quantization::from_toggles(args.load_in_8bit, args.load_in_4bit);
        }
        if let Some(secs) = args.timeout {
            self.request_timeout = Duration::from_secs(secs);
        }
        if args.no_color {
            self.use_color = false;
        }
        Ok(self)
    }

    /// Checks that the configuration describes a usable session.
    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(Error::validation(
                "model identifier must not be empty",
                Some("model".to_string()),
            ));
        }
        url::Url::parse(&self.server_url)?;
        url::Url::parse(&self.hub_endpoint)?;
        if self.generation.max_new_tokens == 0 {
            return Err(Error::validation(
                "must be at least 1",
                Some("max_new_tokens".to_string()),
            ));
        }
        if self.generation.do_sample
            && !(self.generation.temperature.is_finite() && self.generation.temperature > 0.0)
        {
            return Err(Error::validation(
                "must be a positive number when sampling",
                Some("temperature".to_string()),
            ));
        }
        let top_p = self.generation.top_p;
        if !(top_p.is_finite() && top_p > 0.0 && top_p <= 1.0) {
            return Err(Error::validation(
                "expects a value in (0, 1]",
                Some("top_p".to_string()),
            ));
        }
        Ok(())
    }

    /// The local model directory, if configured and present on disk.
    pub fn existing_local_model_path(&self) -> Option<&Path> {
        self.local_model_path
            .as_deref()
            .filter(|path| path.is_dir())
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Sets the local model directory.
    pub fn with_local_model_path(mut self, path: Option<PathBuf>) -> Self {
        self.local_model_path = path;
        self
    }

    /// Sets the inference server URL.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Sets the hub endpoint.
    pub fn with_hub_endpoint(mut self, hub: impl Into<String>) -> Self {
        self.hub_endpoint = hub.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the history window.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Sets the generation parameters.
    pub fn with_generation(mut self, generation: GenerationParams) -> Self {
        self.generation = generation;
        self
    }

    /// Sets the expected device.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_f32(value: &str, param: &str) -> Result<f32> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|_| Error::validation(format!("expects a number, got {value:?}"), Some(param.to_string())))
}
