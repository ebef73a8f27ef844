use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TASKBOT_CONFIG_PATH";
const BACKEND_URL_ENV_VARS: [&str; 2] = ["TODO_BACKEND_URL", "BACKEND_URL"];
const LLM_PROVIDER_ENV_VAR: &str = "LLM_PROVIDER";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8001";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 900;

/// How a create-task request is handled. One mode per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateTaskMode {
    /// Collect title, description and priority over several turns.
    #[default]
    Conversational,
    /// Point the user at the structured creation form.
    Guided,
}

impl CreateTaskMode {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match canonical_key(raw).as_deref() {
            Some("conversational" | "conversation" | "chat" | "multi_turn") => {
                Ok(Self::Conversational)
            }
            Some("guided" | "guided_form" | "form" | "button") => Ok(Self::Guided),
            _ => Err(AppError::invalid_input(format!(
                "unknown create_task_mode '{}', expected conversational or guided",
                raw.trim()
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversational => "conversational",
            Self::Guided => "guided",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub create_task_mode: CreateTaskMode,
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub llm_model: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            create_task_mode: CreateTaskMode::default(),
            session_idle_timeout_secs: DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            bind_address: default_bind_address(),
            llm_provider: None,
            llm_model: None,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_session_idle_timeout_secs() -> u64 {
    DEFAULT_SESSION_IDLE_TIMEOUT_SECS
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BackendUrl,
    RequestTimeoutSecs,
    CreateTaskMode,
    SessionIdleTimeoutSecs,
    BindAddress,
    LlmProvider,
    LlmModel,
}

impl ConfigKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match canonical_key(raw)?.as_str() {
            "backend_url" | "backend" => Some(Self::BackendUrl),
            "request_timeout_secs" | "request_timeout" | "timeout" => {
                Some(Self::RequestTimeoutSecs)
            }
            "create_task_mode" | "create_mode" => Some(Self::CreateTaskMode),
            "session_idle_timeout_secs" | "session_idle_timeout" | "session_timeout" => {
                Some(Self::SessionIdleTimeoutSecs)
            }
            "bind_address" | "bind" => Some(Self::BindAddress),
            "llm_provider" | "provider" => Some(Self::LlmProvider),
            "llm_model" | "model" => Some(Self::LlmModel),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub backend_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub create_task_mode: Option<CreateTaskMode>,
    pub session_idle_timeout_secs: Option<u64>,
    pub bind_address: Option<String>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
}

impl ConfigOverrides {
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), AppError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::invalid_input("override value cannot be empty"));
        }

        match key {
            ConfigKey::BackendUrl => self.backend_url = Some(value.to_string()),
            ConfigKey::RequestTimeoutSecs => {
                self.request_timeout_secs = Some(parse_seconds(value)?);
            }
            ConfigKey::CreateTaskMode => {
                self.create_task_mode = Some(CreateTaskMode::parse(value)?);
            }
            ConfigKey::SessionIdleTimeoutSecs => {
                self.session_idle_timeout_secs = Some(parse_seconds(value)?);
            }
            ConfigKey::BindAddress => self.bind_address = Some(value.to_string()),
            ConfigKey::LlmProvider => self.llm_provider = Some(value.to_ascii_lowercase()),
            ConfigKey::LlmModel => self.llm_model = Some(value.to_string()),
        }
        Ok(())
    }
}

fn parse_seconds(value: &str) -> Result<u64, AppError> {
    value
        .parse::<u64>()
        .map_err(|_| AppError::invalid_input(format!("'{value}' is not a number of seconds")))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("taskbot")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("taskbot")
            .join(CONFIG_FILE_NAME))
    }
}

/// Loads the config file, falling back to defaults, then applies the
/// environment. A broken file is reported in `error` rather than failing.
pub fn load_config_with_fallback() -> ConfigLoad {
    let mut load = match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    };
    load.config = apply_env(load.config, |name| std::env::var(name).ok());
    load
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    Ok(normalize_config(config))
}

fn normalize_config(mut config: Config) -> Config {
    config.backend_url = config.backend_url.trim().trim_end_matches('/').to_string();
    config.llm_provider = config
        .llm_provider
        .map(|provider| provider.trim().to_ascii_lowercase())
        .filter(|provider| !provider.is_empty());
    config
}

fn apply_env<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let backend_url = BACKEND_URL_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.trim().is_empty());
    if let Some(url) = backend_url {
        config.backend_url = url;
    }

    if let Some(provider) = lookup(LLM_PROVIDER_ENV_VAR).filter(|value| !value.trim().is_empty())
    {
        config.llm_provider = Some(provider);
    }

    normalize_config(config)
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(url) = overrides.backend_url.as_ref() {
        merged.backend_url = url.clone();
    }
    if let Some(secs) = overrides.request_timeout_secs {
        merged.request_timeout_secs = secs;
    }
    if let Some(mode) = overrides.create_task_mode {
        merged.create_task_mode = mode;
    }
    if let Some(secs) = overrides.session_idle_timeout_secs {
        merged.session_idle_timeout_secs = secs;
    }
    if let Some(address) = overrides.bind_address.as_ref() {
        merged.bind_address = address.clone();
    }
    if let Some(provider) = overrides.llm_provider.as_ref() {
        merged.llm_provider = Some(provider.clone());
    }
    if let Some(model) = overrides.llm_model.as_ref() {
        merged.llm_model = Some(model.clone());
    }

    normalize_config(merged)
}

/// Lowercases and collapses separators: `"Create-Task Mode"` becomes
/// `"create_task_mode"`.
pub fn canonical_key(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
