//! # agent-runtime
//!
//! LLM transports for the research agent.
//!
//! ## Providers
//!
//! - **OpenAI-compatible** (default): any `/chat/completions` server.
//!   `MODEL_SERVER` selects the profile (`GROQ` or `NGU`).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OpenAiCompatProvider;
//!
//! let provider = OpenAiCompatProvider::from_env()?;
//! let engine = EngineBuilder::new()
//!     .provider(Arc::new(provider))
//!     .tools(Arc::new(registry))
//!     .build()?;
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAiCompatProvider, ProviderConfig};

// Re-export core types for convenience
pub use agent_core::{
    AgentError, LlmProvider, Message, ReasoningEngine, Result, Role, Session, Tool, ToolRegistry,
};
