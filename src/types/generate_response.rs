use serde::{Deserialize, Serialize};

/// Body of a successful `POST /generate` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The generated continuation, without the prompt.
    pub generated_text: String,
}

/// Error body returned by the server on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerErrorBody {
    /// Human-readable error message.
    pub error: String,

    /// Error category, e.g. `validation`, `generation`, `overloaded`.
    #[serde(default)]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_without_type() {
        let body: ServerErrorBody = serde_json::from_str(r#"{"error": "boom"}"#).unwrap();
        assert_eq!(body.error, "boom");
        assert!(body.error_type.is_none());
    }
}
