use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::types::{GenerateRequest, GenerateResponse, ServerErrorBody, ServerInfo};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a text-generation-inference server.
///
/// The server owns tokenization, weights, device placement and the decoding
/// loop; this client only ships prompts and parameters over HTTP.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl InferenceClient {
    /// Create a new client for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with a custom generation timeout.
    pub fn with_options(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .default_headers(default_headers())
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The server's base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Ask the server which model it serves.
    pub async fn info(&self) -> Result<ServerInfo> {
        let url = self.base_url.join("info")?;
        let response = self
            .client
            .get(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(e, PROBE_TIMEOUT))?;
        let response = check_status(response).await?;
        response.json::<ServerInfo>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse server info: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// Run one non-streaming generation.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = self.base_url.join("generate")?;
        let start = Instant::now();
        CLIENT_REQUESTS.click();

        let result = self.post_generate(url, request).await;

        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if result.is_err() {
            CLIENT_REQUEST_ERRORS.click();
        }
        result
    }

    async fn post_generate(&self, url: Url, request: &GenerateRequest) -> Result<GenerateResponse> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let response = check_status(response).await?;
        response.json::<GenerateResponse>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::timeout(
            format!("Request timed out: {}", e),
            Some(timeout.as_secs_f64()),
        )
    } else if e.is_connect() {
        Error::connection(e.to_string(), Some(Box::new(e)))
    } else {
        Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return Err(Error::http_client(
                format!("Failed to read error response: {}", e),
                Some(Box::new(e)),
            ));
        }
    };
    Err(error_from_response(status, &body))
}

/// Map an error response onto the crate's error type.
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> Error {
    let parsed = serde_json::from_str::<ServerErrorBody>(body).ok();
    let error_type = parsed.as_ref().and_then(|b| b.error_type.clone());
    let message = parsed
        .map(|b| b.error)
        .unwrap_or_else(|| body.trim().to_string());
    let status_code = status.as_u16();

    match status_code {
        400 | 422 => Error::bad_request(message, None),
        404 => Error::not_found(message, None),
        408 => Error::timeout(message, None),
        424 => Error::generation(message),
        429 => Error::overloaded(message),
        500..=599 => Error::internal_server(status_code, message),
        _ => Error::api(status_code, error_type, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = InferenceClient::new("http://localhost:8080/tgi").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/tgi/");
        assert_eq!(
            client.base_url().join("generate").unwrap().as_str(),
            "http://localhost:8080/tgi/generate"
        );
    }

    #[test]
    fn invalid_base_url() {
        let err = InferenceClient::new("localhost 8080").unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn maps_generation_failure() {
        let err = error_from_response(
            StatusCode::FAILED_DEPENDENCY,
            r#"{"error": "CUDA out of memory", "error_type": "generation"}"#,
        );
        assert!(matches!(err, Error::Generation { ref message } if message == "CUDA out of memory"));
    }

    #[test]
    fn maps_validation_failure() {
        let err = error_from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error": "`temperature` must be strictly positive", "error_type": "validation"}"#,
        );
        assert!(err.is_bad_request());
    }

    #[test]
    fn maps_plain_text_body() {
        let err = error_from_response(StatusCode::BAD_GATEWAY, "upstream gone\n");
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("upstream gone"));
    }

    #[test]
    fn maps_overload() {
        let err = error_from_response(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": "Model is overloaded", "error_type": "overloaded"}"#,
        );
        assert!(matches!(err, Error::Overloaded { .. }));
    }
}
