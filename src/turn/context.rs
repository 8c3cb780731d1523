//! System context assembly.
//!
//! Blocks are concatenated in a fixed order: persona, tool instructions,
//! home status, controllable devices, home mode, stored facts,
//! knowledge-base matches, situational hints. A collaborator that is
//! absent, fails, or returns nothing contributes no block.

use crate::collaborators::Collaborators;
use crate::config::{DirectiveConfig, TurnConfig};
use crate::conversation::Message;
use crate::tools::ToolRegistry;
use chrono::{DateTime, Local, Timelike};

/// Memory Sink key recording the date of the last morning briefing.
pub const LAST_BRIEFING_KEY: &str = "last_briefing_date";

const MORNING_HINT: &str = "It is morning and you have not briefed the user today. \
     Greet them and offer a short briefing: weather, alarms and anything notable at home.";

/// Builds the system message for a turn.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    persona: String,
    tool_instructions: String,
    knowledge_top_k: usize,
    morning_hours: (u32, u32),
    collaborators: Collaborators,
}

impl ContextBuilder {
    /// Create a builder. Tool instructions are rendered once from the
    /// registry and the directive markers.
    pub fn new(
        turn: &TurnConfig,
        directives: &DirectiveConfig,
        registry: &ToolRegistry,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            persona: turn.persona.clone(),
            tool_instructions: tool_instructions(directives, registry),
            knowledge_top_k: turn.knowledge_top_k,
            morning_hours: (turn.morning_start_hour, turn.morning_end_hour),
            collaborators,
        }
    }

    /// Rendered tool instructions.
    pub fn tool_instructions(&self) -> &str {
        &self.tool_instructions
    }

    /// System content for a turn whose user message is `user`.
    pub async fn system_content(&self, user: &Message) -> String {
        self.system_content_at(user, Local::now()).await
    }

    /// [`system_content`](Self::system_content) with an explicit clock.
    pub async fn system_content_at(&self, user: &Message, now: DateTime<Local>) -> String {
        let mut blocks: Vec<String> = vec![self.persona.clone(), self.tool_instructions.clone()];
        let c = &self.collaborators;

        if let Some(home) = &c.home {
            match home.status_summary().await {
                Ok(status) => push_block(&mut blocks, "Home status:", status),
                Err(e) => tracing::warn!(error = %e, "home status unavailable"),
            }
            match home.controllable_devices().await {
                Ok(devices) => push_block(&mut blocks, "Controllable devices:", devices),
                Err(e) => tracing::warn!(error = %e, "device list unavailable"),
            }
            blocks.push(format!("Home mode: {}", home.current_mode().await));
        }

        match c.memory.facts() {
            Ok(facts) => push_list(&mut blocks, "Known facts about the user:", &facts),
            Err(e) => tracing::warn!(error = %e, "facts unavailable"),
        }

        if let Some(knowledge) = &c.knowledge
            && self.knowledge_top_k > 0
            && !user.content.trim().is_empty()
        {
            match knowledge.search(&user.content, self.knowledge_top_k).await {
                Ok(snippets) => push_list(&mut blocks, "Relevant knowledge:", &snippets),
                Err(e) => tracing::warn!(error = %e, "knowledge search failed"),
            }
        }

        let mut hints = Vec::new();
        if let (Some(vision), Some(image)) = (&c.vision, user.images.first()) {
            match vision.detect_identities(image).await {
                Ok(names) if !names.is_empty() => {
                    hints.push(format!("People recognized in the image: {}.", names.join(", ")));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "identity detection failed"),
            }
        }
        if self.morning_briefing_due(now) {
            hints.push(MORNING_HINT.to_owned());
        }
        push_list(&mut blocks, "Situational hints:", &hints);

        blocks.join("\n\n")
    }

    /// Whether the morning hint applies at `now`; records today's date
    /// when it does.
    fn morning_briefing_due(&self, now: DateTime<Local>) -> bool {
        let (start, end) = self.morning_hours;
        if !(start..end).contains(&now.hour()) {
            return false;
        }
        let today = now.format("%Y-%m-%d").to_string();
        let memory = &self.collaborators.memory;
        match memory.get(LAST_BRIEFING_KEY) {
            Ok(Some(last)) if last == today => false,
            Ok(_) => {
                if let Err(e) = memory.set(LAST_BRIEFING_KEY, &today) {
                    tracing::warn!(error = %e, "cannot record briefing date");
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot read briefing date");
                false
            }
        }
    }
}

fn push_block(blocks: &mut Vec<String>, heading: &str, body: String) {
    let body = body.trim();
    if !body.is_empty() {
        blocks.push(format!("{heading}\n{body}"));
    }
}

fn push_list(blocks: &mut Vec<String>, heading: &str, items: &[String]) {
    let lines: Vec<String> = items
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .map(|i| format!("- {i}"))
        .collect();
    if !lines.is_empty() {
        blocks.push(format!("{heading}\n{}", lines.join("\n")));
    }
}

fn tool_instructions(directives: &DirectiveConfig, registry: &ToolRegistry) -> String {
    let mut text = format!(
        "To act, write one command per line as `{} <command> --key value`. \
         Quote values that contain spaces. Available commands:",
        directives.action_marker
    );
    for usage in registry.usage_lines() {
        text.push_str("\n- ");
        text.push_str(usage);
    }
    text.push_str(&format!(
        "\nTo look something up online, write `{} <query>` on its own line and nothing else.\
         \nTo remember a fact about the user, write `[{} <fact>]`.",
        directives.search_marker, directives.memory_marker
    ));
    text
}
