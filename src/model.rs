//! Model loading.
//!
//! Loading a model means resolving where its tokenizer configuration lives,
//! compiling its chat template, and confirming that the inference server is
//! up. Weights never pass through this process.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::chat::{ChatConfig, ChatSession, END_OF_TURN_MARKERS};
use crate::client::InferenceClient;
use crate::error::{Error, Result};
use crate::generator::ServerGenerator;
use crate::hub::HubClient;
use crate::template::{ChatTemplate, PromptTemplate};
use crate::types::{Device, Quantization, ServerInfo};

/// File holding a model's chat template and special tokens.
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// Default stop-sequence limit of text-generation-inference.
pub const MAX_STOP_SEQUENCES: usize = 4;

/// Hints printed by the front ends when loading fails.
pub const LOAD_TROUBLESHOOTING: &str = "Troubleshooting:
  - Check that the inference server is running and reachable (--server)
  - Check your internet connection if the tokenizer config comes from the hub
  - Verify the model name (--model) or local model directory (--local-model-path)
  - Gated models need an access token in HF_TOKEN
  - Make sure the serving host has enough disk space and memory for the model";

/// Where the tokenizer configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A directory on local disk.
    Local(PathBuf),

    /// A model identifier on the hub.
    Hub(String),
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Local(path) => write!(f, "local path {}", path.display()),
            ModelSource::Hub(id) => write!(f, "hub model {id}"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TemplateField {
    Single(String),
    Named(Vec<NamedTemplate>),
}

#[derive(Debug, Deserialize)]
struct NamedTemplate {
    name: String,
    template: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenField {
    Plain(String),
    Added { content: String },
}

impl TokenField {
    fn into_content(self) -> String {
        match self {
            TokenField::Plain(s) => s,
            TokenField::Added { content } => content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTokenizerConfig {
    #[serde(default)]
    chat_template: Option<TemplateField>,
    #[serde(default)]
    bos_token: Option<TokenField>,
    #[serde(default)]
    eos_token: Option<TokenField>,
}

/// The parts of `tokenizer_config.json` used for prompt construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Jinja chat template, if the model publishes one.
    pub chat_template: Option<String>,
    /// Beginning-of-sequence token.
    pub bos_token: Option<String>,
    /// End-of-sequence token.
    pub eos_token: Option<String>,
}

impl TokenizerConfig {
    /// Parses the JSON text of a `tokenizer_config.json`.
    ///
    /// When several named templates are published the one named `default`
    /// wins, falling back to the first.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawTokenizerConfig = serde_json::from_str(text)?;
        let chat_template = raw.chat_template.and_then(|field| match field {
            TemplateField::Single(template) => Some(template),
            TemplateField::Named(mut templates) => {
                let index = templates
                    .iter()
                    .position(|t| t.name == "default")
                    .unwrap_or(0);
                (index < templates.len()).then(|| templates.swap_remove(index).template)
            }
        });
        Ok(Self {
            chat_template: chat_template.filter(|t| !t.trim().is_empty()),
            bos_token: raw.bos_token.map(TokenField::into_content),
            eos_token: raw.eos_token.map(TokenField::into_content),
        })
    }

    /// Reads `tokenizer_config.json` from a model directory.
    ///
    /// Returns `Ok(None)` if the directory has no such file.
    pub fn load_local(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(TOKENIZER_CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;
        Self::parse(&text).map(Some)
    }

    /// The prompt layout this configuration describes.
    pub fn prompt_template(&self) -> Result<PromptTemplate> {
        match &self.chat_template {
            Some(source) => Ok(PromptTemplate::Chat(ChatTemplate::new(
                source.clone(),
                self.bos_token.clone(),
                self.eos_token.clone(),
            )?)),
            None => Ok(PromptTemplate::Plain),
        }
    }
}

/// Stop sequences for a model: its eos token first, then the common end-of-turn markers.
///
/// Text-generation servers cap the number of stop sequences, so at most
/// [`MAX_STOP_SEQUENCES`] are returned.
pub fn stop_sequences(eos_token: Option<&str>) -> Vec<String> {
    let mut stop = Vec::with_capacity(MAX_STOP_SEQUENCES);
    let candidates = eos_token
        .filter(|eos| !eos.is_empty())
        .into_iter()
        .chain(END_OF_TURN_MARKERS);
    for marker in candidates {
        if stop.len() == MAX_STOP_SEQUENCES {
            break;
        }
        if !stop.iter().any(|s: &String| s == marker) {
            stop.push(marker.to_string());
        }
    }
    stop
}

/// Builds ready-to-use chat sessions from a [`ChatConfig`].
pub struct ModelLoader {
    config: ChatConfig,
    hub: HubClient,
    client: InferenceClient,
}

impl ModelLoader {
    /// Creates a loader for `config`.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let hub = HubClient::new(&config.hub_endpoint, config.hub_token.clone())?;
        let client =
            InferenceClient::with_options(&config.server_url, Some(config.request_timeout))?;
        Ok(Self {
            config,
            hub,
            client,
        })
    }

    /// Resolves where the tokenizer configuration should come from.
    pub fn source(&self) -> ModelSource {
        if let Some(path) = self.config.existing_local_model_path() {
            return ModelSource::Local(path.to_path_buf());
        }
        if let Some(path) = &self.config.local_model_path {
            tracing::warn!(
                path = %path.display(),
                model = %self.config.model_id,
                "local model path not found; using the hub"
            );
        }
        ModelSource::Hub(self.config.model_id.clone())
    }

    /// Loads the tokenizer configuration, returning `None` when it is unavailable.
    pub async fn tokenizer_config(&self, source: &ModelSource) -> Result<Option<TokenizerConfig>> {
        match source {
            ModelSource::Local(dir) => TokenizerConfig::load_local(dir),
            ModelSource::Hub(model_id) => {
                match self.hub.fetch_text(model_id, TOKENIZER_CONFIG_FILE).await {
                    Ok(text) => TokenizerConfig::parse(&text).map(Some),
                    Err(err) if err.is_not_found() => Ok(None),
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// Asks the inference server what it serves and checks it against the configuration.
    pub async fn probe(&self, source: &ModelSource) -> Result<ServerInfo> {
        let info = self.client.info().await.map_err(|err| {
            Error::model_load(
                format!(
                    "inference server at {} is not reachable: {err}",
                    self.client.base_url()
                ),
                self.config.model_id.clone(),
            )
        })?;

        if matches!(source, ModelSource::Hub(_)) && info.model_id != self.config.model_id {
            tracing::warn!(
                configured = %self.config.model_id,
                served = %info.model_id,
                "inference server serves a different model"
            );
        }
        if let Some(device) = &info.model_device_type {
            if !self.config.device.matches(device) {
                tracing::warn!(
                    requested = %self.config.device,
                    reported = %device,
                    "inference server runs on a different device"
                );
            }
        } else if self.config.device != Device::Auto {
            tracing::warn!(
                requested = %self.config.device,
                "inference server does not report its device"
            );
        }
        Ok(info)
    }

    /// Resolves the template, probes the server and builds a session.
    pub async fn load(&self) -> Result<ChatSession> {
        let source = self.source();
        tracing::info!(source = %source, server = %self.client.base_url(), "loading model");

        let tokenizer = match self.tokenizer_config(&source).await {
            Ok(Some(tokenizer)) => tokenizer,
            Ok(None) => {
                tracing::info!("no tokenizer configuration; using plain prompts");
                TokenizerConfig::default()
            }
            Err(err) => {
                tracing::warn!(error = %err, "tokenizer configuration unusable; using plain prompts");
                TokenizerConfig::default()
            }
        };
        let template = tokenizer.prompt_template()?;

        let info = self.probe(&source).await?;

        let mut config = self.config.clone();
        config.generation.stop = stop_sequences(tokenizer.eos_token.as_deref());
        if self.config.quantization != Quantization::None {
            tracing::info!(
                quantization = %self.config.quantization,
                "quantization requested; the inference server owns weight loading"
            );
        }
        tracing::info!(
            model = %config.model_id,
            served = %info.model_id,
            dtype = info.model_dtype.as_deref().unwrap_or("unknown"),
            device = info.model_device_type.as_deref().unwrap_or("unknown"),
            quantization = %config.quantization,
            chat_template = template.is_chat_template(),
            "model ready"
        );

        let generator = ServerGenerator::new(self.client.clone());
        let mut session = ChatSession::new(Box::new(generator), &config).with_template(template);
        if let Some(eos) = tokenizer.eos_token {
            session = session.with_end_marker(eos);
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_template_and_tokens() {
        let config = TokenizerConfig::parse(
            r#"{
                "chat_template": "{{ messages[0].content }}",
                "bos_token": "<s>",
                "eos_token": {"__type": "AddedToken", "content": "</s>", "lstrip": false},
                "model_max_length": 4096
            }"#,
        )
        .unwrap();
        assert_eq!(config.chat_template.as_deref(), Some("{{ messages[0].content }}"));
        assert_eq!(config.bos_token.as_deref(), Some("<s>"));
        assert_eq!(config.eos_token.as_deref(), Some("</s>"));
    }

    #[test]
    fn named_templates_prefer_default() {
        let config = TokenizerConfig::parse(
            r#"{"chat_template": [
                {"name": "tool_use", "template": "tools"},
                {"name": "default", "template": "chat"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(config.chat_template.as_deref(), Some("chat"));

        let config = TokenizerConfig::parse(
            r#"{"chat_template": [{"name": "rag", "template": "rag"}]}"#,
        )
        .unwrap();
        assert_eq!(config.chat_template.as_deref(), Some("rag"));

        let config = TokenizerConfig::parse(r#"{"chat_template": []}"#).unwrap();
        assert!(config.chat_template.is_none());
    }

    #[test]
    fn missing_template_means_plain_prompts() {
        let config = TokenizerConfig::parse(r#"{"eos_token": null}"#).unwrap();
        assert_eq!(config, TokenizerConfig::default());
        assert!(!config.prompt_template().unwrap().is_chat_template());
    }

    #[test]
    fn load_local_reads_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TokenizerConfig::load_local(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(TOKENIZER_CONFIG_FILE),
            r#"{"chat_template": "{% for m in messages %}{{ m.content }}{% endfor %}"}"#,
        )
        .unwrap();
        let config = TokenizerConfig::load_local(dir.path()).unwrap().unwrap();
        assert!(config.prompt_template().unwrap().is_chat_template());
    }

    #[test]
    fn broken_template_is_an_error() {
        let config = TokenizerConfig {
            chat_template: Some("{% if %}".to_string()),
            ..TokenizerConfig::default()
        };
        assert!(config.prompt_template().is_err());
    }

    #[test]
    fn stop_sequences_put_eos_first_and_respect_limit() {
        assert_eq!(
            stop_sequences(Some("<eos>")),
            vec!["<eos>", "<|im_end|>", "<|endoftext|>", "</s>"]
        );
        assert_eq!(
            stop_sequences(Some("</s>")),
            vec!["</s>", "<|im_end|>", "<|endoftext|>", "<|end|>"]
        );
        assert_eq!(stop_sequences(None), END_OF_TURN_MARKERS.to_vec());
        assert_eq!(stop_sequences(Some("")).len(), MAX_STOP_SEQUENCES);
    }

    #[test]
    fn source_prefers_existing_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::new().with_local_model_path(Some(dir.path().to_path_buf()));
        let loader = ModelLoader::new(config).unwrap();
        assert_eq!(loader.source(), ModelSource::Local(dir.path().to_path_buf()));
    }

    #[test]
    fn source_falls_back_to_hub() {
        let config = ChatConfig::new()
            .with_model("gpt2")
            .with_local_model_path(Some(PathBuf::from("/nonexistent/palaver-model")));
        let loader = ModelLoader::new(config).unwrap();
        assert_eq!(loader.source(), ModelSource::Hub("gpt2".to_string()));
    }
}
