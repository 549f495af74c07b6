//! REST client for the conversion service's HTTP endpoints.
//!
//! Wraps `GET /` (server info), `GET /formats` and `POST /convert` using
//! [`reqwest`], and maps every transport or HTTP failure into the
//! [`ConversionError`] taxonomy.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use convertkit_core::catalog::RemoteFormats;
use convertkit_core::endpoint::resolve_download_location;
use convertkit_core::validation::UploadLimits;
use convertkit_core::{ConversionError, ConversionRequest};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::upload::{self, UploadProgress};

/// Upper bound on a whole conversion round trip (30 minutes).
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Upper bound on the informational ping.
pub const DEFAULT_INFO_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages reqwest uses when a proxy refuses to open a tunnel.
const REFUSED_TUNNEL_MESSAGES: &[&str] = &["unsuccessful tunnel", "proxy authentication required"];

/// Body returned by `GET /`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub local_ip: Option<String>,
    #[serde(default)]
    pub access_url: Option<String>,
}

/// Body returned by a successful `POST /convert`.
#[derive(Debug, Deserialize)]
pub struct ConvertResponse {
    /// Path (or absolute URL) of the converted artifact.
    pub download_url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
}

/// HTTP client for one conversion service.
#[derive(Debug, Clone)]
pub struct ConversionApi {
    client: reqwest::Client,
    base_url: String,
    submit_timeout: Duration,
    info_timeout: Duration,
}

impl ConversionApi {
    /// Create a client for the service at `base_url`, e.g.
    /// `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            info_timeout: DEFAULT_INFO_TIMEOUT,
        }
    }

    /// Override the budget for a whole `POST /convert` round trip
    /// (upload, conversion and response). Defaults to 30 minutes.
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Override the budget for `GET /` and `GET /formats`. Defaults to
    /// 5 seconds.
    pub fn with_info_timeout(mut self, timeout: Duration) -> Self {
        self.info_timeout = timeout;
        self
    }

    /// The service base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch the service's self-description.
    ///
    /// Purely informational: any failure is logged at debug level and
    /// yields `None`.
    pub async fn server_info(&self) -> Option<ServerInfo> {
        let result = async {
            let response = self
                .client
                .get(format!("{}/", self.base_url))
                .header(reqwest::header::ACCEPT, "application/json")
                .timeout(self.info_timeout)
                .send()
                .await?
                .error_for_status()?;
            response.json::<ServerInfo>().await
        }
        .await;

        match result {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!(base_url = %self.base_url, error = %e, "Server info unavailable");
                None
            }
        }
    }

    /// Fetch the input extensions the service accepts, per category.
    pub async fn formats(&self) -> Result<RemoteFormats, ConversionError> {
        let response = self
            .client
            .get(format!("{}/formats", self.base_url))
            .timeout(self.info_timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, &self.base_url))?;

        let response = Self::ensure_success(response).await?;
        let status = response.status().as_u16();
        response
            .json::<RemoteFormats>()
            .await
            .map_err(|e| classify_body_error(e, status, &self.base_url))
    }

    /// Submit a validated request.
    ///
    /// Uploads the file as multipart field `file` with the target in
    /// `output_format`. The bytes are read and checked against `limits`
    /// before any connection is made, so an oversize payload yields
    /// `FileTooLarge` without a network call. Upload progress is sent on
    /// `upload_progress`. On success returns the absolute download
    /// location of the artifact.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        limits: &UploadLimits,
        upload_progress: mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<String, ConversionError> {
        let bytes = upload::load_content(&request.source, limits).await?;
        let length = bytes.len() as u64;

        let part = reqwest::multipart::Part::stream_with_length(
            upload::progress_body(bytes, upload_progress),
            length,
        )
        .file_name(request.source.name().to_string());

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("output_format", request.target_format.clone());

        tracing::debug!(
            file = request.source.name(),
            size = length,
            target = %request.target_format,
            category = %request.category,
            "Submitting conversion",
        );

        let response = self
            .client
            .post(format!("{}/convert", self.base_url))
            .multipart(form)
            .timeout(self.submit_timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, &self.base_url))?;

        let response = Self::ensure_success(response).await?;
        let status = response.status().as_u16();
        let body: ConvertResponse = response
            .json()
            .await
            .map_err(|e| classify_body_error(e, status, &self.base_url))?;

        if body.success == Some(false) {
            return Err(ConversionError::from_status(500, None));
        }

        Ok(resolve_download_location(&self.base_url, &body.download_url))
    }

    /// Start retrieving an artifact.
    ///
    /// A 404 means the service has already discarded the artifact and
    /// yields `ArtifactExpired`. The returned response has a success
    /// status; its body is left for the caller to stream.
    pub async fn fetch_artifact(&self, location: &str) -> Result<reqwest::Response, ConversionError> {
        let response = self
            .client
            .get(location)
            .timeout(self.submit_timeout)
            .send()
            .await
            .map_err(|e| ConversionError::DownloadFailed(root_cause(&e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ConversionError::ArtifactExpired);
        }
        if !status.is_success() {
            return Err(ConversionError::DownloadFailed(format!("HTTP {status}")));
        }
        Ok(response)
    }

    // ---- private helpers ----

    /// Turn a non-2xx response into the taxonomy, using the JSON `detail`
    /// field of the body as the message when it is a string.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ConversionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string));

        tracing::debug!(status = status.as_u16(), body = %body, "Service returned an error");
        Err(ConversionError::from_status(status.as_u16(), detail))
    }
}

/// Map a transport-level failure (no HTTP response) into the taxonomy.
///
/// A request refused on this machine (see [`is_blocked_locally`]) is
/// reported as `ClientBlocked`, elapsed timers as `Timeout`, and
/// everything else as `NetworkUnreachable`.
pub fn classify_transport_error(err: &reqwest::Error, base_url: &str) -> ConversionError {
    if is_blocked_locally(err) {
        return ConversionError::ClientBlocked {
            base_url: base_url.to_string(),
        };
    }
    if err.is_timeout() {
        return ConversionError::Timeout;
    }
    ConversionError::NetworkUnreachable {
        base_url: base_url.to_string(),
        reason: root_cause(err),
    }
}

/// A body that fails mid-read is a transport problem; one that arrives
/// but does not parse is a service problem.
fn classify_body_error(err: reqwest::Error, status: u16, base_url: &str) -> ConversionError {
    if err.is_decode() {
        return unreadable_response(status, err);
    }
    classify_transport_error(&err, base_url)
}

fn unreadable_response(status: u16, err: reqwest::Error) -> ConversionError {
    tracing::warn!(status, error = %err, "Unreadable response from conversion service");
    ConversionError::ServerError {
        status,
        message: "The conversion service returned an unreadable response".to_string(),
    }
}

/// Whether an error chain shows the request was stopped before it left
/// this machine: the OS denied the socket (`EACCES`/`EPERM` from a
/// firewall or sandbox) or a configured proxy refused the tunnel.
pub fn is_blocked_locally(err: &(dyn StdError + 'static)) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::PermissionDenied {
                return true;
            }
        }
        let message = e.to_string();
        if REFUSED_TUNNEL_MESSAGES.iter().any(|m| message.contains(m)) {
            return true;
        }
        source = e.source();
    }
    false
}

fn root_cause(err: &reqwest::Error) -> String {
    let mut cause: &dyn StdError = err;
    while let Some(next) = cause.source() {
        cause = next;
    }
    cause.to_string()
}
