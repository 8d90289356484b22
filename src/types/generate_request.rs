use serde::{Deserialize, Serialize};

use crate::types::GenerationParams;

/// Body of a `POST /generate` request to a text-generation-inference server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The fully formatted prompt.
    pub inputs: String,

    /// Decoding parameters.
    pub parameters: GenerateParameters,
}

/// Decoding parameters understood by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateParameters {
    /// Maximum number of tokens to generate.
    pub max_new_tokens: u32,

    /// Sampling temperature; omitted for greedy decoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus-sampling threshold; omitted for greedy decoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Whether to sample.
    pub do_sample: bool,

    /// Keep at most this many prompt tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncate: Option<u32>,

    /// Stop sequences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Whether the server echoes the prompt in front of the generated text.
    pub return_full_text: bool,
}

impl GenerateRequest {
    /// Builds a request for `prompt` from the session's generation parameters.
    pub fn new(prompt: impl Into<String>, params: &GenerationParams) -> Self {
        let (temperature, top_p) = if params.do_sample {
            // A top_p of exactly 1.0 means "disabled" and the server rejects it.
            let top_p = (params.top_p < 1.0).then_some(params.top_p);
            (Some(params.temperature), top_p)
        } else {
            (None, None)
        };
        Self {
            inputs: prompt.into(),
            parameters: GenerateParameters {
                max_new_tokens: params.max_new_tokens,
                temperature,
                top_p,
                do_sample: params.do_sample,
                truncate: (params.max_input_tokens > 0).then_some(params.max_input_tokens),
                stop: params.stop.clone(),
                return_full_text: false,
            },
        }
    }
}
