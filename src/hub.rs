//! Minimal client for a Hugging Face style model hub.
//!
//! Covers listing the files of a model repository and fetching individual
//! files from its `main` revision.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::client::error_from_response;
use crate::error::{Error, Result};
use crate::observability::{HUB_DOWNLOAD_BYTES, HUB_DOWNLOADS};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    siblings: Vec<RepoFile>,
}

#[derive(Debug, Deserialize)]
struct RepoFile {
    rfilename: String,
}

/// Outcome of [`HubClient::fetch_model`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Files written by this run.
    pub downloaded: Vec<String>,
    /// Files already present with a non-zero size.
    pub skipped: Vec<String>,
    /// Bytes written by this run.
    pub bytes: u64,
}

/// Directory name for a model inside a download root.
///
/// `name` wins when given; otherwise the model identifier with `/` replaced by `_`.
pub fn model_dir_name(model_id: &str, name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => model_id.replace('/', "_"),
    }
}

/// Returns true for the small JSON files needed to build prompts.
pub fn is_config_file(filename: &str) -> bool {
    !filename.contains('/') && filename.ends_with(".json")
}

/// Returns true if `filename` stays inside the directory it is joined to.
///
/// Absolute paths, `..`, and `.` components are all refused.
pub fn is_contained(filename: &str) -> bool {
    let path = Path::new(filename);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Where a download is written until it completes.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".incomplete");
    PathBuf::from(name)
}

/// Client for downloading model repository files.
#[derive(Debug, Clone)]
pub struct HubClient {
    client: ReqwestClient,
    endpoint: Url,
    token: Option<String>,
}

impl HubClient {
    /// Create a client for the hub at `endpoint`, authenticating with `token` if given.
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let mut endpoint = Url::parse(endpoint)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let client = ReqwestClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    /// The hub endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// URL of `filename` in the `main` revision of `model_id`.
    pub fn file_url(&self, model_id: &str, filename: &str) -> Result<Url> {
        Ok(self
            .endpoint
            .join(&format!("{model_id}/resolve/main/{filename}"))?)
    }

    /// List the files in a model repository.
    pub async fn list_files(&self, model_id: &str) -> Result<Vec<String>> {
        let url = self.endpoint.join(&format!("api/models/{model_id}"))?;
        let response = self.get(url).await?;
        let info = response.json::<RepoInfo>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse repository listing: {}", e),
                Some(Box::new(e)),
            )
        })?;
        Ok(info.siblings.into_iter().map(|f| f.rfilename).collect())
    }

    /// Fetch a small text file, such as `tokenizer_config.json`.
    pub async fn fetch_text(&self, model_id: &str, filename: &str) -> Result<String> {
        let url = self.file_url(model_id, filename)?;
        let response = self.get(url).await?;
        let text = response.text().await.map_err(|e| {
            Error::http_client(
                format!("Failed to read {filename}: {}", e),
                Some(Box::new(e)),
            )
        })?;
        HUB_DOWNLOADS.click();
        HUB_DOWNLOAD_BYTES.count(text.len() as u64);
        Ok(text)
    }

    /// Download `filename` to `dest`, returning the number of bytes written.
    ///
    /// The body is streamed into `<dest>.incomplete` and renamed once it has
    /// fully arrived; a failed download leaves nothing at `dest`.
    pub async fn download(&self, model_id: &str, filename: &str, dest: &Path) -> Result<u64> {
        let url = self.file_url(model_id, filename)?;
        let response = self.get(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::io(format!("failed to create {}", parent.display()), e)
            })?;
        }
        let partial = partial_path(dest);
        let written = match write_body(response, filename, &partial).await {
            Ok(written) => written,
            Err(err) => {
                if let Err(e) = tokio::fs::remove_file(&partial).await {
                    tracing::debug!(file = %partial.display(), error = %e, "no partial file to remove");
                }
                return Err(err);
            }
        };
        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| Error::io(format!("failed to move {} into place", dest.display()), e))?;

        HUB_DOWNLOADS.click();
        HUB_DOWNLOAD_BYTES.count(written);
        Ok(written)
    }

    /// Download every file of `model_id` into `dest_dir`.
    ///
    /// Files that already exist with a non-zero size are skipped, so an
    /// interrupted run can be resumed. With `config_only` only top-level JSON
    /// files are fetched.
    pub async fn fetch_model(
        &self,
        model_id: &str,
        dest_dir: &Path,
        config_only: bool,
    ) -> Result<FetchSummary> {
        let files = self.list_files(model_id).await?;
        if files.is_empty() {
            return Err(Error::not_found(
                format!("repository {model_id} lists no files"),
                Some(model_id.to_string()),
            ));
        }

        let mut summary = FetchSummary::default();
        for filename in files {
            if config_only && !is_config_file(&filename) {
                continue;
            }
            if !is_contained(&filename) {
                tracing::warn!(file = %filename, "skipping file outside the model directory");
                continue;
            }
            let dest = dest_dir.join(&filename);
            let existing = tokio::fs::metadata(&dest).await.map(|m| m.len()).unwrap_or(0);
            if existing > 0 {
                tracing::debug!(file = %filename, "already downloaded");
                summary.skipped.push(filename);
                continue;
            }
            tracing::info!(file = %filename, "downloading");
            summary.bytes += self.download(model_id, &filename, &dest).await?;
            summary.downloaded.push(filename);
        }
        Ok(summary)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                Error::connection(e.to_string(), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
            }
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status, &body))
    }
}

async fn write_body(mut response: reqwest::Response, filename: &str, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| Error::io(format!("failed to create {}", path.display()), e))?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        Error::http_client(
            format!("Download of {filename} interrupted: {}", e),
            Some(Box::new(e)),
        )
    })? {
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::io(format!("failed to write {}", path.display()), e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| Error::io(format!("failed to write {}", path.display()), e))?;
    Ok(written)
}
