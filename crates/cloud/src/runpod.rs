//! REST client for RunPod serverless endpoints.
//!
//! Wraps the `/run`, `/status`, `/cancel` and `/health` routes of the
//! RunPod v2 API using [`reqwest`]. There are no retries: every failure is
//! returned to the caller, which decides what to record on the job.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use engui_core::mime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default RunPod serverless API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.runpod.ai/v2";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for fetching a worker-hosted result, body included. Replaces
/// [`DEFAULT_TIMEOUT`] for downloads only.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Largest result accepted from a worker URL.
pub const MAX_DOWNLOAD_BYTES: u64 = 1024 * 1024 * 1024;

/// HTTP client for the RunPod serverless API.
#[derive(Clone)]
pub struct RunPodClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    download_timeout: Duration,
    max_download_bytes: u64,
}

impl std::fmt::Debug for RunPodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunPodClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Errors from the RunPod REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum RunPodError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("RunPod request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The request did not complete within the client timeout.
    #[error("RunPod request timed out")]
    Timeout,

    /// RunPod returned a non-2xx status code.
    #[error("RunPod API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A downloaded result exceeded the size limit.
    #[error("RunPod result exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    /// No API key is available for the caller.
    #[error("RunPod API key is not configured")]
    MissingCredentials,
}

impl From<reqwest::Error> for RunPodError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

/// Job status as reported by RunPod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPodStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    /// Any status this client does not know about; treated as still running.
    #[serde(other)]
    Unknown,
}

impl RunPodStatus {
    /// Whether RunPod will not change this job again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }
}

/// Response of `POST /{endpoint}/run`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunResponse {
    pub id: String,
    pub status: RunPodStatus,
}

/// Response of `GET /{endpoint}/status/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: RunPodStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    /// Worker execution time in milliseconds.
    #[serde(default, rename = "executionTime")]
    pub execution_time_ms: Option<i64>,
    /// Queue delay in milliseconds.
    #[serde(default, rename = "delayTime")]
    pub delay_time_ms: Option<i64>,
}

impl StatusResponse {
    /// Human-readable failure reason, if RunPod provided one.
    ///
    /// The `error` field may be a string or a structured object; workers
    /// also sometimes report failures inside `output.error`.
    pub fn error_message(&self) -> Option<String> {
        let from_output = self.output.as_ref().and_then(|o| o.get("error"));
        match self.error.as_ref().or(from_output)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A generated artifact found in a RunPod `output` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RunPodOutput {
    /// The worker uploaded the artifact and returned its URL.
    Url(String),
    /// The artifact was returned inline. `ext` comes from a data-URI MIME
    /// type when present.
    Base64 { data: String, ext: Option<String> },
}

impl RunPodOutput {
    /// Decode an inline payload. Whitespace is ignored.
    pub fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64.decode(compact)
    }
}

/// Keys checked, in order, for an artifact in an output object.
const OUTPUT_KEYS: &[&str] = &[
    "output_url",
    "video_url",
    "image_url",
    "audio_url",
    "url",
    "video",
    "image",
    "audio",
    "result",
];

/// Keys holding a list of artifacts; the first element is used.
const OUTPUT_LIST_KEYS: &[&str] = &["images", "videos", "outputs"];

/// Minimum length for a bare string to be taken as base64 payload.
const MIN_INLINE_LEN: usize = 64;

/// Find the generated artifact in a RunPod `output` value.
///
/// Recognises URLs and base64 strings (optionally `data:` URIs) directly,
/// under the usual keys (`image`, `video`, `audio`, `*_url`, `output_url`),
/// in the first element of `images`-style lists, and one level of nested
/// `output` objects.
pub fn extract_output(output: &Value) -> Option<RunPodOutput> {
    match output {
        Value::String(s) => classify_string(s),
        Value::Array(items) => items.first().and_then(extract_output),
        Value::Object(obj) => {
            for key in OUTPUT_KEYS {
                if let Some(found) = obj.get(*key).and_then(extract_output) {
                    return Some(found);
                }
            }
            for key in OUTPUT_LIST_KEYS {
                if let Some(Value::Array(items)) = obj.get(*key) {
                    if let Some(found) = items.first().and_then(extract_output) {
                        return Some(found);
                    }
                }
            }
            // Some objects in `images` lists carry `data` + `type`.
            if let Some(Value::String(data)) = obj.get("data") {
                let ext = obj
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(|t| {
                        mime::extension_for_mime(t)
                            .or_else(|| mime::mime_for_extension(t).and_then(mime::extension_for_mime))
                    })
                    .map(str::to_string);
                if let Some(RunPodOutput::Base64 { data, ext: uri_ext }) = classify_inline(data) {
                    return Some(RunPodOutput::Base64 { data, ext: uri_ext.or(ext) });
                }
            }
            obj.get("output").and_then(extract_output)
        }
        _ => None,
    }
}

fn classify_string(s: &str) -> Option<RunPodOutput> {
    let s = s.trim();
    if s.starts_with("http://") || s.starts_with("https://") {
        return Some(RunPodOutput::Url(s.to_string()));
    }
    classify_inline(s)
}

fn classify_inline(s: &str) -> Option<RunPodOutput> {
    if let Some(rest) = s.strip_prefix("data:") {
        let (meta, data) = rest.split_once(',')?;
        let mime_type = meta.split(';').next().unwrap_or_default();
        let ext = mime::extension_for_mime(mime_type).map(str::to_string);
        return Some(RunPodOutput::Base64 {
            data: data.to_string(),
            ext,
        });
    }
    let looks_base64 = s.len() >= MIN_INLINE_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'\n' | b'\r'));
    looks_base64.then(|| RunPodOutput::Base64 {
        data: s.to_string(),
        ext: None,
    })
}

impl RunPodClient {
    /// Create a client.
    ///
    /// * `base_url` - API base, normally [`DEFAULT_API_BASE`].
    /// * `api_key` - Bearer token; must be non-empty.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, RunPodError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RunPodError::Request)?;
        Self::with_client(client, base_url, api_key)
    }

    /// Create a client reusing an existing [`reqwest::Client`] (shared
    /// connection pool across requests).
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        api_key: &str,
    ) -> Result<Self, RunPodError> {
        if api_key.trim().is_empty() {
            return Err(RunPodError::MissingCredentials);
        }
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            download_timeout: DOWNLOAD_TIMEOUT,
            max_download_bytes: MAX_DOWNLOAD_BYTES,
        })
    }

    /// Override the timeout and size cap used by [`RunPodClient::download`].
    pub fn with_download_limits(mut self, timeout: Duration, max_bytes: u64) -> Self {
        self.download_timeout = timeout;
        self.max_download_bytes = max_bytes;
        self
    }

    /// Queue a job on an endpoint. Sends `POST /{endpoint}/run` with
    /// `{"input": input}`.
    pub async fn run(&self, endpoint_id: &str, input: &Value) -> Result<RunResponse, RunPodError> {
        let body = serde_json::json!({ "input": input });
        let response = self
            .client
            .post(self.url(endpoint_id, "run"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let run: RunResponse = Self::parse_response(response).await?;
        tracing::debug!(endpoint_id, runpod_job_id = %run.id, status = ?run.status, "RunPod job queued");
        Ok(run)
    }

    /// Fetch the current status of a job.
    pub async fn status(&self, endpoint_id: &str, job_id: &str) -> Result<StatusResponse, RunPodError> {
        let response = self
            .client
            .get(self.url(endpoint_id, &format!("status/{job_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Cancel a queued or running job.
    pub async fn cancel(&self, endpoint_id: &str, job_id: &str) -> Result<(), RunPodError> {
        let response = self
            .client
            .post(self.url(endpoint_id, &format!("cancel/{job_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Endpoint health (worker and job counters) as returned by RunPod.
    pub async fn health(&self, endpoint_id: &str) -> Result<Value, RunPodError> {
        let response = self
            .client
            .get(self.url(endpoint_id, "health"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download a worker-hosted artifact.
    ///
    /// Uses the download timeout instead of the client's, and stops with
    /// [`RunPodError::TooLarge`] as soon as the declared or received size
    /// passes the cap.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, RunPodError> {
        let limit = self.max_download_bytes;
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await?;
        let mut response = Self::ensure_success(response).await?;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(RunPodError::TooLarge { limit });
        }

        let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        while let Some(chunk) = response.chunk().await? {
            if (bytes.len() + chunk.len()) as u64 > limit {
                return Err(RunPodError::TooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    // ---- private helpers ----

    fn url(&self, endpoint_id: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, endpoint_id, path)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`RunPodError::Api`] containing
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RunPodError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RunPodError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RunPodError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
