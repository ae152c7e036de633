//! Application State

use std::sync::Arc;

use agent_core::{
    EngineBuilder, GenerationOptions, LlmProvider, ReasoningEngine, Result, SessionManager, ToolRegistry,
};
use research_tools::{
    DocumentAnalyzer, NoteStore, RESEARCH_ASSISTANT_PROMPT, SearchBackend,
    register_research_tools,
};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LLM provider (Groq or another OpenAI-compatible server)
    pub provider: Arc<dyn LlmProvider>,

    /// Closed registry with the research tools
    pub tools: Arc<ToolRegistry>,

    pub engine: Arc<ReasoningEngine>,

    pub analyzer: Arc<DocumentAnalyzer>,

    pub notes: Arc<NoteStore>,

    /// One conversation per session id
    pub sessions: Arc<SessionManager>,

    pub config: Arc<ServerConfig>,

    /// Model name reported by `/health`
    pub model: String,
}

impl AppState {
    /// Wire the note store, tools, engine and analyzer together.
    ///
    /// Fails if a tool name is registered twice.
    pub async fn assemble(
        config: ServerConfig,
        provider: Arc<dyn LlmProvider>,
        model: String,
        search: Arc<dyn SearchBackend>,
    ) -> Result<Self> {
        let notes = Arc::new(match &config.notes_file {
            Some(path) => NoteStore::open(path).await?,
            None => NoteStore::in_memory(),
        });

        let engine_builder = EngineBuilder::new()
            .provider(provider.clone())
            .system_prompt(RESEARCH_ASSISTANT_PROMPT)
            .model(model.clone())
            .max_react_rounds(config.react_max_rounds)
            .tool_access(config.tool_access);

        let mut tools = ToolRegistry::new().with_call_timeout(config.tool_timeout);
        register_research_tools(
            &mut tools,
            notes.clone(),
            search,
            provider.clone(),
            GenerationOptions {
                model: model.clone(),
                ..Default::default()
            },
        )?;
        let tools = Arc::new(tools);

        let engine = Arc::new(engine_builder.tools(tools.clone()).build()?);
        let analyzer = Arc::new(
            DocumentAnalyzer::new(engine.clone()).with_max_chars(config.max_document_chars),
        );

        Ok(Self {
            provider,
            tools,
            engine,
            analyzer,
            notes,
            sessions: Arc::new(SessionManager::new()),
            config: Arc::new(config),
            model,
        })
    }
}
