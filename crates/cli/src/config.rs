use std::path::PathBuf;
use std::time::Duration;

use convertkit_client::ConversionApi;
use convertkit_core::catalog::FormatCatalog;
use convertkit_core::endpoint::{resolve_base_url, PageOrigin};
use convertkit_core::validation::UploadLimits;

/// Default upload ceiling in MiB.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 100;
/// Default conversion round-trip budget in seconds.
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 1800;
/// Default server-info ping budget in seconds.
pub const DEFAULT_INFO_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Client configuration loaded from environment variables.
///
/// Every field has a default suitable for talking to a local service.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Explicit service address; wins over origin-based resolution.
    pub api_url: Option<String>,
    /// Origin the front end is served from, used to derive the address.
    pub page_origin: Option<PageOrigin>,
    pub max_upload_mb: u64,
    pub submit_timeout: Duration,
    pub info_timeout: Duration,
    /// Deployment variant that also converts video.
    pub enable_video: bool,
    /// Where downloaded artifacts are written.
    pub download_dir: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            page_origin: None,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            submit_timeout: Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
            info_timeout: Duration::from_secs(DEFAULT_INFO_TIMEOUT_SECS),
            enable_video: false,
            download_dir: PathBuf::from("."),
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `CONVERTER_API_URL`     | unset   |
    /// | `CONVERTER_PAGE_ORIGIN` | unset   |
    /// | `MAX_UPLOAD_MB`         | `100`   |
    /// | `SUBMIT_TIMEOUT_SECS`   | `1800`  |
    /// | `INFO_TIMEOUT_SECS`     | `5`     |
    /// | `ENABLE_VIDEO`          | `false` |
    /// | `DOWNLOAD_DIR`          | `.`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let page_origin = match get("CONVERTER_PAGE_ORIGIN") {
            Some(value) => Some(PageOrigin::parse(&value).ok_or(ConfigError::Invalid {
                var: "CONVERTER_PAGE_ORIGIN",
                value,
            })?),
            None => None,
        };

        let max_upload_mb = match get("MAX_UPLOAD_MB") {
            Some(value) => parse_u64("MAX_UPLOAD_MB", value)?,
            None => defaults.max_upload_mb,
        };

        let submit_timeout = match get("SUBMIT_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_u64("SUBMIT_TIMEOUT_SECS", value)?),
            None => defaults.submit_timeout,
        };

        let info_timeout = match get("INFO_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_u64("INFO_TIMEOUT_SECS", value)?),
            None => defaults.info_timeout,
        };

        let enable_video = match get("ENABLE_VIDEO") {
            Some(value) => parse_bool("ENABLE_VIDEO", value)?,
            None => defaults.enable_video,
        };

        Ok(Self {
            api_url: get("CONVERTER_API_URL"),
            page_origin,
            max_upload_mb,
            submit_timeout,
            info_timeout,
            enable_video,
            download_dir: get("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
        })
    }

    /// The service address these settings resolve to.
    pub fn base_url(&self) -> String {
        resolve_base_url(self.api_url.as_deref(), self.page_origin.as_ref())
    }

    /// The built-in catalog, with video when `ENABLE_VIDEO` is set.
    pub fn catalog(&self) -> FormatCatalog {
        if self.enable_video {
            FormatCatalog::with_video()
        } else {
            FormatCatalog::default()
        }
    }

    /// Upload ceiling from `MAX_UPLOAD_MB`.
    pub fn limits(&self) -> UploadLimits {
        UploadLimits::from_megabytes(self.max_upload_mb)
    }

    /// A client for [`CliConfig::base_url`] with the configured timeouts.
    pub fn build_api(&self) -> ConversionApi {
        ConversionApi::new(self.base_url())
            .with_submit_timeout(self.submit_timeout)
            .with_info_timeout(self.info_timeout)
    }
}

fn parse_u64(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid { var, value })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}
