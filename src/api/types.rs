use serde::{Deserialize, Serialize};

/// How a task produces replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Gemini via the configured Google API keys.
    #[default]
    Gemini,
    /// OpenRouter with a per-task model.
    Openrouter,
    /// Canned lines from the backend's pesan.txt cache.
    Pesan,
}

impl ReplyMode {
    pub fn label(self) -> &'static str {
        match self {
            ReplyMode::Gemini => "gemini",
            ReplyMode::Openrouter => "openrouter",
            ReplyMode::Pesan => "pesan.txt",
        }
    }

    /// Cycle order used by the task editor.
    pub fn next(self) -> Self {
        match self {
            ReplyMode::Gemini => ReplyMode::Openrouter,
            ReplyMode::Openrouter => ReplyMode::Pesan,
            ReplyMode::Pesan => ReplyMode::Gemini,
        }
    }

    /// AI modes have a read-delay setting; pesan.txt mode does not.
    pub fn is_ai(self) -> bool {
        matches!(self, ReplyMode::Gemini | ReplyMode::Openrouter)
    }
}

/// The backend's persisted configuration (its `config.json`), sent whole to
/// `/save_config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub discord_tokens: Vec<String>,
    #[serde(default)]
    pub google_api_keys: Vec<String>,
    #[serde(default)]
    pub openrouter_api_keys: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

/// One per-channel reply task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub assigned_token_index: usize,
    #[serde(default)]
    pub mode: ReplyMode,
    /// Kept so older backends that only know this flag keep working; true
    /// exactly when `mode` is gemini.
    #[serde(default)]
    pub use_google_ai: bool,
    #[serde(default = "default_openrouter_model")]
    pub openrouter_model: String,
    /// Seconds to wait before reading new messages (AI modes).
    #[serde(default = "default_read_delay")]
    pub read_delay: u64,
    /// Seconds between sends.
    #[serde(default = "default_delay_interval")]
    pub delay_interval: u64,
    #[serde(default = "default_prompt_language")]
    pub prompt_language: String,
    #[serde(default)]
    pub use_reply: bool,
    /// Delete the bot's reply after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_bot_reply: Option<u64>,
    #[serde(default)]
    pub delete_immediately: bool,
}

fn default_openrouter_model() -> String {
    "openai/gpt-3.5-turbo".to_string()
}

fn default_read_delay() -> u64 {
    10
}

fn default_delay_interval() -> u64 {
    30
}

fn default_prompt_language() -> String {
    "id".to_string()
}

impl TaskConfig {
    pub fn new(id: impl Into<String>, channel_id: impl Into<String>, token_index: usize) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            assigned_token_index: token_index,
            mode: ReplyMode::default(),
            use_google_ai: true,
            openrouter_model: default_openrouter_model(),
            read_delay: default_read_delay(),
            delay_interval: default_delay_interval(),
            prompt_language: default_prompt_language(),
            use_reply: false,
            delete_bot_reply: None,
            delete_immediately: false,
        }
    }

    /// Keep the legacy flag in lockstep with `mode` before saving.
    pub fn sync_compat_flags(&mut self) {
        self.use_google_ai = self.mode == ReplyMode::Gemini;
    }
}

/// Discord tokens contain dots and are long.
pub fn valid_discord_token(token: &str) -> bool {
    let token = token.trim();
    token.contains('.') && token.len() >= 50
}

/// Google API keys start with a fixed prefix.
pub fn valid_google_api_key(key: &str) -> bool {
    key.trim().starts_with("AIzaSy")
}

/// OpenRouter keys start with a fixed prefix.
pub fn valid_openrouter_key(key: &str) -> bool {
    key.trim().starts_with("sk-or-")
}
