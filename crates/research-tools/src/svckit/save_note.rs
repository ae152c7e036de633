//! Save Note Tool
//!
//! Records a research note in the shared `NoteStore`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use agent_core::{ParamType, ParameterSchema, Result as CoreResult, Tool, ToolArgs, ToolSchema};

use crate::notes::NoteStore;

pub struct SaveNoteTool {
    store: Arc<NoteStore>,
}

impl SaveNoteTool {
    pub fn new(store: Arc<NoteStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct SaveNoteArgs {
    title: String,
    content: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[async_trait]
impl Tool for SaveNoteTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "save_note".into(),
            description: "Save a research note with a title, content and optional tags. Every call creates a new note.".into(),
            parameters: vec![
                ParameterSchema::required("title", ParamType::String, "Short title for the note"),
                ParameterSchema::required("content", ParamType::String, "Body of the note"),
                ParameterSchema::optional("tags", ParamType::Array, "List of tag strings")
                    .with_default(json!([])),
            ],
            category: Some("notes".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, args: ToolArgs) -> CoreResult<Value> {
        let args: SaveNoteArgs = args.parse()?;
        let note = self.store.save(&args.title, &args.content, args.tags).await?;

        Ok(json!({
            "id": note.id,
            "title": note.title,
            "tags": note.tags,
            "created_at": note.created_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use agent_core::{ToolCall, ToolRegistry};

    use super::*;

    fn registry(store: Arc<NoteStore>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(SaveNoteTool::new(store)).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_save_note_returns_id() {
        let store = Arc::new(NoteStore::in_memory());
        let registry = registry(store.clone());

        let call = ToolCall::new(
            "save_note",
            json!({"title": "Transformers", "content": "Attention is all you need", "tags": ["ml", "ml"]}),
        );
        let result = registry.execute(&call).await.unwrap();

        assert!(result.is_success());
        let data = result.data().unwrap();
        assert!(data["id"].as_str().is_some());
        assert_eq!(data["tags"], json!(["ml"]));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_tags_must_be_strings() {
        let registry = registry(Arc::new(NoteStore::in_memory()));
        let call = ToolCall::new("save_note", json!({"title": "t", "content": "c", "tags": [1, 2]}));

        let result = registry.execute(&call).await.unwrap();
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_blank_title_is_a_failed_result() {
        let registry = registry(Arc::new(NoteStore::in_memory()));
        let call = ToolCall::new("save_note", json!({"title": " ", "content": "c"}));

        let result = registry.execute(&call).await.unwrap();
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("title"));
    }
}
