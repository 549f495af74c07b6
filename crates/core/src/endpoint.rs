//! Base-address resolution for the conversion service.
//!
//! The service address is a pure function of an optional configured
//! override and the origin the front end is served from. Rules, first
//! match wins:
//!
//! | Condition                           | Base address                     |
//! |-------------------------------------|----------------------------------|
//! | explicit override                   | the override                     |
//! | no origin / `localhost` / loopback  | `http://localhost:8000`          |
//! | known production site host          | [`PRODUCTION_API_BASE`] (https)  |
//! | secure origin                       | `https://api.<registrable domain>` |
//! | IPv4 literal host (LAN access)      | `http://<ip>:8000`               |
//! | anything else                       | `http://localhost:8000`          |

use std::sync::LazyLock;

use regex::Regex;

/// Port the service listens on outside production.
pub const DEFAULT_API_PORT: u16 = 8000;

/// Local development address.
pub const LOCAL_DEFAULT_BASE: &str = "http://localhost:8000";

/// Site hosts that map to the hosted production API.
pub const PRODUCTION_SITE_HOSTS: &[&str] = &["todoconvertir.com", "www.todoconvertir.com"];

/// Hosted production API. Always HTTPS.
pub const PRODUCTION_API_BASE: &str = "https://api.todoconvertir.com";

static IPV4_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("valid regex"));

/// Scheme and host the front end is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrigin {
    pub scheme: String,
    pub host: String,
}

impl PageOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        let scheme: String = scheme.into();
        let host: String = host.into();
        Self {
            scheme: scheme.trim_end_matches(':').to_lowercase(),
            host: host.to_lowercase(),
        }
    }

    /// Parse an origin such as `https://www.example.com:5173/path`.
    ///
    /// Port, path, query and credentials are discarded. Returns `None`
    /// when there is no `scheme://` prefix or the host is empty.
    pub fn parse(origin: &str) -> Option<Self> {
        let (scheme, rest) = origin.trim().split_once("://")?;
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or(authority);

        let host = if let Some(bracketed) = authority.strip_prefix('[') {
            bracketed.split(']').next().unwrap_or_default()
        } else {
            authority.split(':').next().unwrap_or_default()
        };

        if scheme.is_empty() || host.is_empty() {
            return None;
        }
        Some(Self::new(scheme, host))
    }

    /// Whether the page was served over HTTPS.
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    fn is_loopback(&self) -> bool {
        self.host == "localhost" || self.host == "127.0.0.1"
    }
}

/// Resolve the service base address. See the module docs for the rules.
///
/// The result never ends with `/`.
pub fn resolve_base_url(override_url: Option<&str>, origin: Option<&PageOrigin>) -> String {
    if let Some(url) = override_url.map(str::trim).filter(|u| !u.is_empty()) {
        return url.trim_end_matches('/').to_string();
    }

    let Some(origin) = origin else {
        return LOCAL_DEFAULT_BASE.to_string();
    };

    if origin.is_loopback() {
        return LOCAL_DEFAULT_BASE.to_string();
    }

    if PRODUCTION_SITE_HOSTS.contains(&origin.host.as_str()) {
        return PRODUCTION_API_BASE.to_string();
    }

    if origin.is_secure() {
        let parts: Vec<&str> = origin.host.split('.').collect();
        if parts.len() >= 2 {
            let domain = parts[parts.len() - 2..].join(".");
            return format!("https://api.{domain}");
        }
        return format!("https://api.{}", origin.host);
    }

    if IPV4_LITERAL_RE.is_match(&origin.host) {
        return format!("http://{}:{DEFAULT_API_PORT}", origin.host);
    }

    LOCAL_DEFAULT_BASE.to_string()
}

/// Resolve the `download_url` returned by the service against the base
/// address. Absolute URLs are returned unchanged.
pub fn resolve_download_location(base_url: &str, download_url: &str) -> String {
    let download_url = download_url.trim();
    if download_url.starts_with("http://") || download_url.starts_with("https://") {
        return download_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        download_url.trim_start_matches('/')
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
