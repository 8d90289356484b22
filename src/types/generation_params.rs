use serde::{Deserialize, Serialize};

/// Default maximum number of newly generated tokens.
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 512;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default nucleus-sampling threshold.
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Default cap on prompt tokens; longer prompts are truncated by the server.
pub const DEFAULT_MAX_INPUT_TOKENS: u32 = 2048;

/// Fixed generation parameters supplied when a session is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum number of tokens to generate per reply.
    pub max_new_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus-sampling threshold.
    pub top_p: f32,

    /// Whether to sample at all; `false` selects greedy decoding.
    pub do_sample: bool,

    /// Prompt tokens beyond this ceiling are truncated.
    pub max_input_tokens: u32,

    /// Sequences that end generation early.
    #[serde(default)]
    pub stop: Vec<String>,
}

impl GenerationParams {
    /// Replaces the stop sequences.
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            do_sample: true,
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            stop: Vec::new(),
        }
    }
}
