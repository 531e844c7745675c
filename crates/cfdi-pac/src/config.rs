//! PAC client configuration.
//!
//! Loaded from the environment in deployments, built explicitly in tests.
//! The bearer token is held in a `Zeroizing` buffer and never printed.

use url::Url;
use zeroize::Zeroizing;

/// Default sandbox endpoint of the certification provider.
pub const DEFAULT_BASE_URL: &str = "https://sandbox.pac.example.mx/api/v1";

/// Configuration for [`crate::HttpStampingClient`].
#[derive(Clone)]
pub struct PacConfig {
    pub base_url: Url,
    pub api_token: Zeroizing<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl std::fmt::Debug for PacConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl PacConfig {
    /// Load configuration from environment variables.
    ///
    /// - `PAC_BASE_URL` (default: [`DEFAULT_BASE_URL`])
    /// - `PAC_API_TOKEN` (required)
    /// - `PAC_TIMEOUT_SECS` (default: 30)
    /// - `PAC_USER_AGENT` (default: `cfdi-pac/<version>`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = std::env::var("PAC_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        Ok(Self {
            base_url: env_url("PAC_BASE_URL", DEFAULT_BASE_URL)?,
            api_token: Zeroizing::new(api_token),
            timeout_secs: std::env::var("PAC_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            user_agent: std::env::var("PAC_USER_AGENT").unwrap_or_else(|_| default_user_agent()),
        })
    }

    /// Configuration pointing at a local mock server.
    pub fn local_mock(base: &str, token: &str) -> Result<Self, ConfigError> {
        let base_url =
            Url::parse(base).map_err(|e| ConfigError::InvalidUrl("local mock".to_string(), e.to_string()))?;
        Ok(Self {
            base_url,
            api_token: Zeroizing::new(token.to_string()),
            timeout_secs: 5,
            user_agent: default_user_agent(),
        })
    }

    /// `{base_url}/{path}` without doubling the slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn default_user_agent() -> String {
    format!("cfdi-pac/{}", env!("CARGO_PKG_VERSION"))
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PAC_API_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("API token contains characters not allowed in a header")]
    InvalidToken,
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
