use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants::*;
use crate::errors::IrcClientError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Account whose channel messages carry the lobby sub-protocol.
    pub bot_account: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            bot_account: BOT_ACCOUNT.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub prefix: String,
    pub raw_command_escape: char,
    pub rate_limit_ms: u64,
    pub debug: bool,
    pub emit_lobby_events: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_COMMAND_PREFIX.to_owned(),
            raw_command_escape: DEFAULT_RAW_COMMAND_ESCAPE,
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            debug: false,
            emit_lobby_events: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    // Optional so the parser doesn't fail when no key is configured.
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_API_URL.to_owned(),
        }
    }
}

impl Config {
    /// Builds a default configuration for the given credentials.
    pub fn new(nickname: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig {
                nickname: nickname.into(),
                password: password.into(),
            },
            client: ClientConfig::default(),
            api: ApiConfig::default(),
        }
    }

    /// Loads and parses the TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IrcClientError> {
        let content =
            fs::read_to_string(path).map_err(|e| IrcClientError::Config(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, IrcClientError> {
        let config: Config =
            toml::from_str(content).map_err(|e| IrcClientError::Config(e.to_string()))?;
        if config.auth.nickname.trim().is_empty() {
            return Err(IrcClientError::Config("auth.nickname is empty".to_owned()));
        }
        Ok(config)
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.client.rate_limit_ms)
    }

    pub fn log_level(&self) -> &'static str {
        if self.client.debug { "debug" } else { "info" }
    }
}
