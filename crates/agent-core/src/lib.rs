//! # agent-core
//!
//! Core orchestration for the research assistant: conversation state,
//! reasoning strategies, and a typed tool registry behind a
//! provider-agnostic LLM abstraction.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ReasoningEngine                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ direct / CoT │  │ ToolRegistry │  │   LlmProvider      │  │
//! │  │ ReAct loop   │──│  (envelope)  │──│   (Strategy)       │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! │          │                                                    │
//! │  ┌──────────────┐                                             │
//! │  │ Conversation │  append-only, one per Session               │
//! │  └──────────────┘                                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between OpenAI-compatible
//! servers, or a scripted fake in tests, without changing engine logic.

pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{
    EngineBuilder, EngineConfig, ReasoningEngine, ReasoningRequest, ReasoningResult,
    ReasoningType, ToolAccess, TraceStep,
};
pub use session::{Session, SessionId, SessionManager};
pub use tool::{ParamType, ParameterSchema, Tool, ToolArgs, ToolCall, ToolRegistry, ToolResult, ToolSchema};
