//! # research-tools
//!
//! Tools and document analysis for the research assistant.
//!
//! ## Tools
//!
//! | Tool | Backed by | Side effects |
//! |---|---|---|
//! | `save_note` | [`NoteStore`] (memory + optional JSON-lines file) | appends a note |
//! | `web_search` | a [`SearchBackend`] (DuckDuckGo, or Brave with a key) | none |
//! | `explain_concept` | the LLM provider | none |
//!
//! ## Wiring
//!
//! ```text
//! ┌───────────────┐   register    ┌──────────────┐   Arc    ┌─────────────────┐
//! │ svckit tools  │──────────────▶│ ToolRegistry │────────▶│ ReasoningEngine │
//! └───────────────┘               └──────────────┘          └─────────────────┘
//!                                                                    ▲
//!                                              ┌──────────────────┐  │
//!                                              │ DocumentAnalyzer │──┘
//!                                              └──────────────────┘
//! ```

pub mod document;
pub mod error;
pub mod model;
pub mod notes;
pub mod search;
pub mod svckit;

use std::sync::Arc;

use agent_core::{GenerationOptions, LlmProvider, ToolRegistry};

pub use document::{AnalysisMode, AnalysisOutcome, DocumentAnalyzer};
pub use error::{ResearchError, Result};
pub use model::{ExplainLevel, Note, SearchHit};
pub use notes::NoteStore;
pub use search::SearchBackend;

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{ExplainConceptTool, SaveNoteTool, WebSearchTool};
}

/// Register the three research tools.
///
/// Fails with `DuplicateTool` if any name is already taken.
pub fn register_research_tools(
    registry: &mut ToolRegistry,
    notes: Arc<NoteStore>,
    search: Arc<dyn SearchBackend>,
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
) -> agent_core::Result<()> {
    registry.register(tools::SaveNoteTool::new(notes))?;
    registry.register(tools::WebSearchTool::new(search))?;
    registry.register(tools::ExplainConceptTool::new(provider, options))?;
    Ok(())
}

/// System prompt for the research assistant
pub const RESEARCH_ASSISTANT_PROMPT: &str = r"You are SynthesisTalk, a collaborative research assistant.

## How You Work

1. Build on earlier turns of the conversation; refer back to documents and findings already discussed
2. Separate what sources say from your own inference
3. Say plainly when you are unsure or when information may be out of date

## Tools Available

- `web_search` - Find current information on the web
- `explain_concept` - Produce an explanation pitched at a given level
- `save_note` - Record a finding the user wants to keep

Search before answering questions about recent events. Save a note only when the user asks for it or confirms it.";
