//! # Service Configuration
//!
//! One JSON file, one section per concern. Sections or keys missing from the
//! file take their defaults; a section that had to be initialized is logged
//! and written back so the file documents every setting.
//!
//! ## Environment overrides
//!
//! - `LINK_CONFIG`: path of the file (default `./config.json`)
//! - `LINK_ONEBOT_WS_URL`: gateway endpoint
//! - `LINK_HTTP_PORT`: HTTP listen port
//! - `LINK_CAPTCHA_SECRET`: Turnstile secret key

use onebot_bridge::{BridgeConfig, DEFAULT_GATEWAY_URL};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::Uin;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_PATH_ENV: &str = "LINK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Turnstile's documented siteverify endpoint.
pub const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

const DEFAULT_CAPTCHA_SECRET: &str = "0x4AAAAAAAPSqh8HjpWLMG6CL5yw3MCmbbE";

/// Group used to prove that a QQ number belongs to a real member.
const DEFAULT_VERIFICATION_GROUP: Uin = 747121127;

const SECTIONS: [&str; 4] = ["onebot", "captcha", "http", "binding"];

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub onebot: OneBotConfig,
    pub captcha: CaptchaConfig,
    pub http: HttpConfig,
    pub binding: BindingConfig,
}

/// Gateway connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneBotConfig {
    pub ws_url: String,
    pub reconnect_delay_secs: u64,
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_GATEWAY_URL.to_string(),
            reconnect_delay_secs: 5,
        }
    }
}

/// Cloudflare Turnstile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    pub secret: String,
    /// Forward the client's IP to Turnstile.
    pub use_ip: bool,
    pub verify_url: String,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_CAPTCHA_SECRET.to_string(),
            use_ip: false,
            verify_url: TURNSTILE_VERIFY_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

impl HttpConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    pub verification_group_id: Uin,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            verification_group_id: DEFAULT_VERIFICATION_GROUP,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidOverride { key: &'static str, value: String },
    #[error(transparent)]
    Bridge(#[from] onebot_bridge::ConfigError),
}

impl ServiceConfig {
    /// Path from `LINK_CONFIG`, or the default.
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load the file at `path`, creating it with defaults if absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if !path.exists() {
            for section in SECTIONS {
                warn!(section, "Initialized {} config with defaults", section);
            }
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let text = std::fs::read_to_string(path).map_err(io_error)?;
        let parse_error = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let raw: Value = serde_json::from_str(&text).map_err(parse_error)?;
        let missing: Vec<&str> = SECTIONS
            .into_iter()
            .filter(|section| raw.get(section).is_none())
            .collect();
        let config: Self = serde_json::from_value(raw).map_err(parse_error)?;

        if !missing.is_empty() {
            for section in &missing {
                warn!(section, "Initialized {} config with defaults", section);
            }
            config.save(path)?;
        }

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(io_error)
    }

    /// Apply `LINK_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LINK_ONEBOT_WS_URL") {
            info!(url = %url, "Gateway url overridden from environment");
            self.onebot.ws_url = url;
        }
        if let Some(port) = lookup("LINK_HTTP_PORT") {
            self.http.port = port.parse().map_err(|_| ConfigError::InvalidOverride {
                key: "LINK_HTTP_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(secret) = lookup("LINK_CAPTCHA_SECRET") {
            info!("Captcha secret overridden from environment");
            self.captcha.secret = secret;
        }
        Ok(())
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::new(self.onebot.ws_url.clone())
            .with_reconnect_delay(Duration::from_secs(self.onebot.reconnect_delay_secs))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bridge_config().validate()?;
        Ok(())
    }
}
