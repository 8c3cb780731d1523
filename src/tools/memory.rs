//! Fact and note storage tools.

use super::types::{Tool, ToolError};
use crate::collaborators::MemorySink;
use crate::directive::Action;
use async_trait::async_trait;
use std::sync::Arc;

const FACT_USAGE: &str = "fact-memory --add TEXT | --delete TEXT | --read";
const NOTE_USAGE: &str = "note --add TEXT | --read";

fn bullet_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_owned();
    }
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `fact-memory`: add, delete or read long-term facts.
pub struct FactMemoryTool {
    memory: Arc<dyn MemorySink>,
}

impl FactMemoryTool {
    /// Create the tool.
    pub fn new(memory: Arc<dyn MemorySink>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for FactMemoryTool {
    fn name(&self) -> &str {
        "fact-memory"
    }

    fn usage(&self) -> &str {
        FACT_USAGE
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        if let Some(fact) = action.non_empty_arg("add") {
            self.memory.add_fact(fact)?;
            return Ok(format!("Remembered: {fact}"));
        }
        if let Some(needle) = action.non_empty_arg("delete") {
            let removed = self.memory.delete_fact(needle)?;
            return Ok(match removed {
                0 => format!("No stored fact matches '{needle}'."),
                1 => "Forgot 1 fact.".to_owned(),
                n => format!("Forgot {n} facts."),
            });
        }
        if action.has_arg("read") || action.arguments.is_empty() {
            return Ok(bullet_list(&self.memory.facts()?, "No facts stored yet."));
        }
        Err(ToolError::MissingArgument {
            arg: "add",
            usage: FACT_USAGE,
        })
    }
}

/// `note`: add or read free-form notes.
pub struct NoteTool {
    memory: Arc<dyn MemorySink>,
}

impl NoteTool {
    /// Create the tool.
    pub fn new(memory: Arc<dyn MemorySink>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for NoteTool {
    fn name(&self) -> &str {
        "note"
    }

    fn usage(&self) -> &str {
        NOTE_USAGE
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        if let Some(note) = action.non_empty_arg("add").or_else(|| action.non_empty_arg("_")) {
            self.memory.add_note(note)?;
            return Ok("Note saved.".to_owned());
        }
        if action.has_arg("read") || action.arguments.is_empty() {
            return Ok(bullet_list(&self.memory.notes()?, "There are no notes."));
        }
        Err(ToolError::MissingArgument {
            arg: "add",
            usage: NOTE_USAGE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemorySink;

    #[tokio::test]
    async fn fact_lifecycle() {
        let memory = Arc::new(InMemorySink::new());
        let tool = FactMemoryTool::new(memory.clone());
        let added = tool
            .execute(&Action::new("fact-memory", [("add", "likes tea")]))
            .await;
        assert!(matches!(added, Ok(ref s) if s == "Remembered: likes tea"));

        let read = tool.execute(&Action::new("fact-memory", [("read", "")])).await;
        assert!(matches!(read, Ok(ref s) if s == "- likes tea"));

        let deleted = tool
            .execute(&Action::new("fact-memory", [("delete", "tea")]))
            .await;
        assert!(matches!(deleted, Ok(ref s) if s == "Forgot 1 fact."));
        assert!(memory.facts().is_ok_and(|f| f.is_empty()));
    }

    #[tokio::test]
    async fn empty_add_is_missing() {
        let tool = FactMemoryTool::new(Arc::new(InMemorySink::new()));
        let out = tool.execute(&Action::new("fact-memory", [("add", "")])).await;
        assert!(matches!(out, Err(ToolError::MissingArgument { arg: "add", .. })));
    }

    #[tokio::test]
    async fn notes_add_and_read() {
        let tool = NoteTool::new(Arc::new(InMemorySink::new()));
        let empty = tool.execute(&Action::new("note", [("read", "")])).await;
        assert!(matches!(empty, Ok(ref s) if s == "There are no notes."));
        let saved = tool
            .execute(&Action::new("note", [("add", "buy milk")]))
            .await;
        assert!(matches!(saved, Ok(ref s) if s == "Note saved."));
        let read = tool.execute(&Action::new("note", [("read", "")])).await;
        assert!(matches!(read, Ok(ref s) if s == "- buy milk"));
    }
}
