//! Static command table.
//!
//! Built once at startup and read-only afterwards. Lookup is
//! case-insensitive and treats `_` and `-` as the same character. Names that
//! match nothing resolve to the opaque fallback handler.

use super::types::Tool;
use std::collections::HashMap;
use std::sync::Arc;

/// Alternative spellings accepted for built-in commands.
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("tuya-control", "device-control"),
    ("volume", "volume-set"),
    ("media", "media-action"),
    ("launch", "launch-app"),
    ("adb-scroll", "remote-scroll"),
    ("stats", "system-stats"),
    ("memory", "fact-memory"),
    ("wake", "wake-on-lan"),
    ("camera", "camera-view"),
];

/// Normalize a command name for lookup.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

/// Registry of handlers keyed by normalized command name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    aliases: HashMap<String, String>,
    fallback: Arc<dyn Tool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("aliases", &self.aliases.len())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl ToolRegistry {
    /// An empty registry that sends everything to `fallback`.
    pub fn new(fallback: Arc<dyn Tool>) -> Self {
        Self {
            tools: HashMap::new(),
            aliases: HashMap::new(),
            fallback,
        }
    }

    /// Register a tool under its own name. Replaces an existing entry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(normalize_name(tool.name()), tool);
    }

    /// Make `alias` resolve to the tool registered as `target`.
    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases
            .insert(normalize_name(alias), normalize_name(target));
    }

    /// Look up a registered tool, following aliases.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let key = normalize_name(name);
        let key = self.aliases.get(&key).unwrap_or(&key);
        self.tools.get(key).cloned()
    }

    /// The registered tool for `name`, or the fallback handler.
    pub fn resolve(&self, name: &str) -> Arc<dyn Tool> {
        self.get(name).unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Whether `name` resolves to a registered tool.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Canonical names of registered tools, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.values().map(|t| t.name()).collect();
        names.sort_unstable();
        names
    }

    /// Every spelling that resolves to a registered tool, including aliases.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.extend(
            self.aliases
                .iter()
                .filter(|(_, target)| self.tools.contains_key(*target))
                .map(|(alias, _)| alias.clone()),
        );
        names.sort_unstable();
        names
    }

    /// Usage lines of registered tools, sorted by name.
    pub fn usage_lines(&self) -> Vec<&str> {
        let mut tools: Vec<&Arc<dyn Tool>> = self.tools.values().collect();
        tools.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        tools.into_iter().map(|t| t.usage()).collect()
    }
}
