use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

/// Instruction every new conversation is seeded with.
pub const DEFAULT_SYSTEM_PROMPT: &str = "你是專業的烘焙師, 我會問你烘焙的問題, 你會用what's app的對話方式回答問題, 而且一次不會回答超過5則訊息";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub line: LineConfig,
    pub storage: StorageConfig,
    pub conversation: ConversationConfig,
    pub system: SystemConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub webhook_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub model: String,
    pub api_base: String,
    /// Request timeout; the transport default applies when unset.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub api_base: String,
    pub data_api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub container: String,
    /// Directory receiving a local copy of every relayed image. Unset disables the copy.
    pub cache_dir: Option<String>,
    pub upload_content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub system_prompt: String,
    pub reply_delimiter: String,
    /// Sent to the user when a turn fails after the webhook was verified.
    pub apology_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub channel_buffer_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            webhook_path: "/api/linewebhook".to_string(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.line.me".to_string(),
            data_api_base: "https://api-data.line.me".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            container: "userimages".to_string(),
            cache_dir: Some(".".to_string()),
            upload_content_type: "image/jpeg".to_string(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reply_delimiter: "\n\n".to_string(),
            apology_message: None,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 32,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn channel_secret() -> Result<String> {
        required_env("CHANNEL_SECRET")
    }

    pub fn channel_access_token() -> Result<String> {
        required_env("CHANNEL_ACCESS_TOKEN")
    }

    pub fn api_key() -> Result<String> {
        required_env("OPENAI_API_KEY")
    }

    /// Azure storage connection string. Image relaying is disabled without it.
    pub fn storage_connection_string() -> Option<String> {
        env::var("AZURE_STORAGE_ACCOUNT_CONNECTION_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

fn required_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable not set", name))
}
