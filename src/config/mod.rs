mod settings;

pub use settings::{
    ConversationConfig, LLMConfig, LineConfig, LoggingConfig, ServerConfig, Settings,
    StorageConfig, SystemConfig, DEFAULT_SYSTEM_PROMPT,
};
