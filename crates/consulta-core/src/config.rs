use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result, anyhow};

use crate::api::{ChatMeta, ChatOptions, HttpChatClient};
use crate::session::ChatSession;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub const ENV_API_URL: &str = "CONSULTA_API_URL";
pub const ENV_TIMEOUT_MS: &str = "CONSULTA_TIMEOUT_MS";

/// Contents of `~/.config/consulta/config.json`. Every field is optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub api_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub meta: Option<ChatMeta>,
    pub session_id: Option<String>,
    pub bot_id: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(config_path, self.to_pretty_json()?)?;
        Ok(())
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// `~/.config/consulta` (or the platform equivalent).
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("consulta"))
    }
}

/// Effective settings after layering defaults, the config file, the
/// environment and command-line overrides (later wins).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub timeout_ms: u64,
    pub meta: ChatMeta,
    pub session_id: Option<String>,
    pub bot_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            meta: ChatMeta::default(),
            session_id: None,
            bot_id: None,
        }
    }
}

impl Settings {
    /// Defaults, then `config`. The environment is left to the caller.
    pub fn from_config(config: &Config) -> Self {
        let mut settings = Self::default();

        if let Some(url) = &config.api_url {
            settings.api_url = url.clone();
        }
        if let Some(ms) = config.timeout_ms {
            settings.timeout_ms = ms;
        }
        if let Some(meta) = &config.meta {
            settings.meta.merge(meta.clone());
        }
        settings.session_id = config.session_id.clone();
        settings.bot_id = config.bot_id.clone();

        settings
    }

    /// Defaults, then `config`, then the process environment.
    pub fn from_env(config: &Config) -> Result<Self> {
        Self::layered(config, |key| std::env::var(key).ok())
    }

    /// Defaults, then `config`, then whatever `env` returns.
    pub fn layered(config: &Config, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::from_config(config);

        if let Some(url) = env(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            settings.api_url = url;
        }
        if let Some(raw) = env(ENV_TIMEOUT_MS).filter(|v| !v.trim().is_empty()) {
            settings.timeout_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds, got {:?}", ENV_TIMEOUT_MS, raw))?;
        }

        Ok(settings)
    }

    pub fn options(&self) -> ChatOptions {
        ChatOptions::with_timeout_ms(self.timeout_ms)
    }

    pub fn client(&self) -> Result<HttpChatClient> {
        let mut client = HttpChatClient::new(&self.api_url)
            .with_context(|| format!("invalid API URL {:?}", self.api_url))?;
        if let Some(id) = &self.session_id {
            client = client.with_session_id(id.clone());
        }
        if let Some(id) = &self.bot_id {
            client = client.with_bot_id(id.clone());
        }
        Ok(client)
    }

    /// A fresh session talking to the configured backend.
    pub fn session(&self) -> Result<ChatSession> {
        let client = self.client()?;
        Ok(ChatSession::new(Arc::new(client))
            .with_meta(self.meta.clone())
            .with_options(self.options()))
    }

    /// What `config --save` writes back.
    pub fn to_config(&self) -> Config {
        Config {
            api_url: Some(self.api_url.clone()),
            timeout_ms: Some(self.timeout_ms),
            meta: if self.meta.is_empty() { None } else { Some(self.meta.clone()) },
            session_id: self.session_id.clone(),
            bot_id: self.bot_id.clone(),
        }
    }
}
