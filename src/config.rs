//! Configuration types for the turn engine.

use crate::error::{HarukoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Streaming output filter settings.
    pub filter: FilterConfig,
    /// Directive grammar settings.
    pub directives: DirectiveConfig,
    /// Tool dispatch settings.
    pub tools: ToolsConfig,
    /// Turn controller settings.
    pub turn: TurnConfig,
    /// Generation backends, tried in ascending priority order.
    pub providers: Vec<ProviderConfig>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            directives: DirectiveConfig::default(),
            tools: ToolsConfig::default(),
            turn: TurnConfig::default(),
            providers: vec![ProviderConfig::default()],
        }
    }
}

/// Streaming output filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Characters accumulated before the first flush.
    ///
    /// Directive markup that starts and ends inside this window is
    /// guaranteed never to reach the caller.
    pub buffer_threshold: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            buffer_threshold: 1000,
        }
    }
}

/// Marker literals for embedded directives. Matching is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectiveConfig {
    /// Introduces an action line, e.g. `EXECUTE: timer --minutes 5`.
    pub action_marker: String,
    /// Introduces a search line, e.g. `SEARCH: weather in Osaka`.
    pub search_marker: String,
    /// Head of a bracketed memory tag, e.g. `[MEMORY: likes tea]`.
    pub memory_marker: String,
    /// An unquoted argument is cut at ` - ` when the text after the
    /// delimiter is longer than this many characters.
    pub prose_suffix_len: usize,
}

impl Default for DirectiveConfig {
    fn default() -> Self {
        Self {
            action_marker: "EXECUTE:".to_owned(),
            search_marker: "SEARCH:".to_owned(),
            memory_marker: "MEMORY:".to_owned(),
            prose_suffix_len: 15,
        }
    }
}

/// Tool dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Hard wall-clock limit for the opaque system command fallback.
    pub shell_timeout_secs: u64,
    /// Limit applied to every other handler.
    pub tool_timeout_secs: u64,
    /// Upper bound for the `wait` tool.
    pub max_wait_secs: u64,
    /// Substituted when a handler returns nothing.
    pub empty_output_sentinel: String,
    /// Shell used by the fallback handler (`sh -c` style).
    pub shell: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: 15,
            tool_timeout_secs: 30,
            max_wait_secs: 60,
            empty_output_sentinel: "[NO OUTPUT / SUCCESS]".to_owned(),
            shell: if cfg!(windows) {
                "cmd".to_owned()
            } else {
                "sh".to_owned()
            },
        }
    }
}

impl ToolsConfig {
    /// Fallback command timeout as a [`Duration`].
    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs)
    }

    /// Per-handler timeout as a [`Duration`].
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Turn controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Static persona text placed first in the system message.
    pub persona: String,
    /// Emitted once when a turn is cancelled mid-stream.
    pub cancel_marker: String,
    /// Reply used when every provider fails before streaming.
    pub apology: String,
    /// Utterances that stop the active turn instead of starting one.
    pub stop_phrases: Vec<String>,
    /// Reply to a stop phrase.
    pub stop_reply: String,
    /// Instruction appended to tool results for the second pass.
    pub followup_instruction: String,
    /// Knowledge-base snippets injected into context.
    pub knowledge_top_k: usize,
    /// Web search results requested per query.
    pub search_max_results: usize,
    /// Pause before the single search retry.
    pub search_retry_delay_ms: u64,
    /// Local hour (inclusive) at which the morning briefing window opens.
    pub morning_start_hour: u32,
    /// Local hour (exclusive) at which the morning briefing window closes.
    pub morning_end_hour: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            persona: "You are Haruko, a warm and concise home assistant. \
                      Answer in one or two short sentences."
                .to_owned(),
            cancel_marker: "[CANCELLED]".to_owned(),
            apology: "Sorry, none of my language backends are reachable right now.".to_owned(),
            stop_phrases: [
                "stop", "stop!", "stopp", "halt", "quiet", "be quiet", "shut up", "enough",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
            stop_reply: "Okay.".to_owned(),
            followup_instruction: "Answer the user briefly and in character using this \
                                   result. Do not repeat commands or raw error text."
                .to_owned(),
            knowledge_top_k: 3,
            search_max_results: 3,
            search_retry_delay_ms: 1000,
            morning_start_hour: 5,
            morning_end_hour: 11,
        }
    }
}

impl TurnConfig {
    /// Returns `true` when the utterance is one of the configured stop phrases.
    pub fn is_stop_phrase(&self, text: &str) -> bool {
        let normalized = text.trim().to_lowercase();
        self.stop_phrases
            .iter()
            .any(|p| p.trim().to_lowercase() == normalized)
    }
}

/// Which adapter backs a provider entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions` endpoint.
    #[default]
    OpenAiCompat,
    /// Scripted fragments, used for offline runs.
    Static,
}

/// One generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Unique provider name (appears in logs and events).
    pub name: String,
    /// Lower values are tried first.
    pub priority: u32,
    /// Adapter kind.
    pub kind: ProviderKind,
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Environment variable holding the API key (None = no auth header).
    pub api_key_env: Option<String>,
    /// Whether the backend accepts image attachments.
    pub supports_vision: bool,
    /// Whether the backend streams; otherwise one fragment per pass.
    pub supports_streaming: bool,
    /// Seconds allowed before the first fragment arrives.
    pub first_fragment_timeout_secs: u64,
    /// Seconds allowed between two fragments once streaming.
    pub stall_timeout_secs: u64,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Fragments replayed by a [`ProviderKind::Static`] provider.
    pub fragments: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "local".to_owned(),
            priority: 100,
            kind: ProviderKind::OpenAiCompat,
            base_url: "http://127.0.0.1:11434/v1".to_owned(),
            model: "llama3.2".to_owned(),
            api_key_env: None,
            supports_vision: false,
            supports_streaming: true,
            first_fragment_timeout_secs: 20,
            stall_timeout_secs: 30,
            max_tokens: None,
            temperature: None,
            fragments: Vec::new(),
        }
    }
}

impl ProviderConfig {
    /// First-fragment timeout as a [`Duration`].
    pub fn first_fragment_timeout(&self) -> Duration {
        Duration::from_secs(self.first_fragment_timeout_secs)
    }

    /// Inter-fragment stall timeout as a [`Duration`].
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| HarukoError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HarukoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/haruko/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("haruko").join("config.toml")
        } else if let Some(config) = dirs::config_dir() {
            config.join("haruko").join("config.toml")
        } else {
            PathBuf::from("/tmp/haruko-config/config.toml")
        }
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`HarukoError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.filter.buffer_threshold == 0 {
            return Err(HarukoError::Config(
                "filter.buffer_threshold must be positive".into(),
            ));
        }
        for (field, marker) in [
            ("action_marker", &self.directives.action_marker),
            ("search_marker", &self.directives.search_marker),
            ("memory_marker", &self.directives.memory_marker),
        ] {
            if marker.trim().is_empty() {
                return Err(HarukoError::Config(format!(
                    "directives.{field} must not be empty"
                )));
            }
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.name.as_str()) {
                return Err(HarukoError::Config(format!(
                    "duplicate provider name: {}",
                    provider.name
                )));
            }
        }
        Ok(())
    }
}
