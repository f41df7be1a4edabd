use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_PLUGINS_API_URL: &str = "https://api.wordpress.org/plugins/update-check/1.1/";
pub const DEFAULT_THEMES_API_URL: &str = "https://api.wordpress.org/themes/update-check/1.1/";
pub const DEFAULT_API_VERSION: &str = "1.1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Transport relaxations for local development against self-hosted GlotPress.
///
/// Both switches are off unless explicitly turned on. Production code should
/// never construct anything but `DevOverrides::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevOverrides {
    /// Permit translation servers on localhost or private network addresses
    pub allow_local_destinations: bool,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
}

impl DevOverrides {
    /// Enable every relaxation. Only meant for a development install.
    pub fn development() -> Self {
        Self {
            allow_local_destinations: true,
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Host update-check endpoints
    pub plugins_api_url: String,
    pub themes_api_url: String,

    // Translation service protocol
    pub api_version: String,
    pub request_timeout: Duration,

    // Development
    pub dev: DevOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugins_api_url: DEFAULT_PLUGINS_API_URL.to_string(),
            themes_api_url: DEFAULT_THEMES_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            dev: DevOverrides::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let timeout_secs = match std::env::var("GP_UPDATER_TIMEOUT_SECS") {
            Ok(v) => v
                .parse::<u64>()
                .with_context(|| format!("GP_UPDATER_TIMEOUT_SECS is not a number: {}", v))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        if timeout_secs == 0 {
            anyhow::bail!("GP_UPDATER_TIMEOUT_SECS must be greater than zero");
        }

        let dev = if parse_flag(std::env::var("GP_UPDATER_DEV_MODE").ok().as_deref()) {
            DevOverrides::development()
        } else {
            DevOverrides::default()
        };

        Ok(Self {
            // Host endpoints
            plugins_api_url: std::env::var("GP_UPDATER_PLUGINS_API_URL")
                .unwrap_or_else(|_| DEFAULT_PLUGINS_API_URL.to_string()),
            themes_api_url: std::env::var("GP_UPDATER_THEMES_API_URL")
                .unwrap_or_else(|_| DEFAULT_THEMES_API_URL.to_string()),

            // Translation service
            api_version: std::env::var("GP_UPDATER_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),

            dev,
        })
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}
