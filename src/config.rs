use crate::error::{Result, SdError};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_prefix: String,
    /// Applied to the generate call only; inference is slow.
    pub generation_timeout: Duration,
    pub request_timeout: Duration,
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            download_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = env::var("SDGEN_BASE_URL").unwrap_or(defaults.base_url);
        let api_prefix = env::var("SDGEN_API_PREFIX").unwrap_or(defaults.api_prefix);
        let generation_timeout = env::var("SDGEN_GENERATION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.generation_timeout);
        let request_timeout = env::var("SDGEN_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let download_dir = env::var("SDGEN_DOWNLOAD_DIR")
            .ok()
            .map(PathBuf::from)
            .unwrap_or(defaults.download_dir);

        ClientConfig {
            base_url,
            api_prefix,
            generation_timeout,
            request_timeout,
            download_dir,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.origin()?;
        if self.generation_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(SdError::Config("timeouts must be greater than zero".into()));
        }
        Ok(())
    }

    /// Scheme, host and port of the backend. Relative image URLs resolve against it.
    pub fn origin(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| SdError::Config(format!("invalid base URL {:?}: {}", self.base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(SdError::Config(format!(
                "base URL {:?} cannot carry paths",
                self.base_url
            )));
        }
        Url::parse(&url.origin().ascii_serialization())
            .map_err(|e| SdError::Config(e.to_string()))
    }

    /// Full URL of an API route such as `/generate`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Resolve an image URL returned by the backend. Absolute URLs pass through.
    pub fn resolve_image_url(&self, image_url: &str) -> Result<String> {
        if image_url.starts_with("http://") || image_url.starts_with("https://") {
            return Ok(image_url.to_string());
        }
        let origin = self.origin()?;
        let resolved = origin
            .join(image_url)
            .map_err(|e| SdError::Response(format!("invalid image URL {:?}: {}", image_url, e)))?;
        Ok(resolved.to_string())
    }
}
