//! Service Kit - Agent Tools
//!
//! Research tools that implement `agent_core::Tool`.

mod explain_concept;
mod save_note;
mod web_search;

pub use explain_concept::ExplainConceptTool;
pub use save_note::SaveNoteTool;
pub use web_search::WebSearchTool;
