use serde::{Deserialize, Serialize};

/// Subset of the `GET /info` response of a text-generation-inference server.
///
/// Unknown fields are ignored so newer servers stay compatible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Identifier of the model the server has loaded.
    pub model_id: String,

    /// Weight dtype, e.g. `torch.float16`.
    #[serde(default)]
    pub model_dtype: Option<String>,

    /// Device the weights live on, e.g. `cuda` or `cpu`.
    #[serde(default)]
    pub model_device_type: Option<String>,

    /// Server's own prompt-length limit, if it reports one.
    #[serde(default, alias = "max_input_length")]
    pub max_input_tokens: Option<u32>,

    /// Server version string.
    #[serde(default)]
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_info_with_extra_fields() {
        let info: ServerInfo = serde_json::from_str(
            r#"{
                "model_id": "Qwen/Qwen2.5-7B-Instruct",
                "model_sha": "abc",
                "model_dtype": "torch.float16",
                "model_device_type": "cuda",
                "max_input_length": 4095,
                "max_concurrent_requests": 128,
                "version": "2.0.1"
            }"#,
        )
        .unwrap();
        assert_eq!(info.model_id, "Qwen/Qwen2.5-7B-Instruct");
        assert_eq!(info.model_device_type.as_deref(), Some("cuda"));
        assert_eq!(info.max_input_tokens, Some(4095));
    }

    #[test]
    fn parses_minimal_info() {
        let info: ServerInfo = serde_json::from_str(r#"{"model_id": "gpt2"}"#).unwrap();
        assert!(info.model_dtype.is_none());
        assert!(info.version.is_none());
    }
}
