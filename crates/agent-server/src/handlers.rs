//! HTTP Handlers
//!
//! Thin mappings from routes onto engine, registry, analyzer and session
//! operations.

use std::collections::HashMap;
use std::path::Path as FsPath;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use agent_core::{
    AgentError, Message, ReasoningRequest, ReasoningType, SessionId, ToolCall, ToolResult,
    ToolSchema, TraceStep,
};
use research_tools::{AnalysisOutcome, Note};

use crate::state::AppState;

/// Session used when a request carries no `session_id`
const DEFAULT_SESSION: &str = "default";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error returned by handlers, rendered as `ErrorResponse`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: code.into(),
            },
        }
    }

    fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", error)
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let (status, code) = match &err {
            AgentError::UnsupportedStrategy(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_STRATEGY"),
            AgentError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AgentError::UnknownTool(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_TOOL"),
            AgentError::Extraction(_) => (StatusCode::UNPROCESSABLE_ENTITY, "EXTRACTION_ERROR"),
            AgentError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            AgentError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            AgentError::ProviderUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_UNAVAILABLE"),
            e if e.is_transport() => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "Request failed");
        } else {
            tracing::debug!(error = %err, "Request rejected");
        }
        Self::new(status, code, err.user_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_server: String,
    pub model: String,
    pub provider_connected: bool,
    pub tools: usize,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_use_tools")]
    pub use_tools: bool,
    #[serde(default)]
    pub reasoning_type: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_use_tools() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub tool_results: Vec<ToolResult>,
    pub reasoning_type: ReasoningType,
    pub trace: Vec<TraceStep>,
    pub incomplete: bool,
    pub context: HashMap<String, Value>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub success: bool,
    pub note: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotesResponse {
    pub notes: Vec<Note>,
    pub count: usize,
    pub markdown: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_num_results")]
    pub num_results: i64,
}

fn default_num_results() -> i64 {
    5
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
}

fn default_analysis_type() -> String {
    "summary".into()
}

#[derive(Debug, Deserialize)]
pub struct SessionParam {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub filename: String,
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<Message>,
    pub context: HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub messages: usize,
    pub updated_at: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Research assistant API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_server: state.provider.name().to_string(),
        model: state.model.clone(),
        provider_connected,
        tools: state.tools.len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Run one reasoning turn in the caller's session
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let request = ReasoningRequest::from_parts(
        payload.message,
        payload.reasoning_type.as_deref(),
        payload.use_tools,
    )?;

    let session_id = SessionId::from_string(
        payload.session_id.as_deref().unwrap_or(DEFAULT_SESSION),
    );
    let handle = state.sessions.get_or_create(&session_id).await;
    // Held for the whole turn; same-session requests queue here
    let mut session = handle.lock().await;

    let result = state.engine.reason(&mut session.conversation, &request).await;
    session.touch();
    let result = result?;

    Ok(Json(ChatResponse {
        response: result.response,
        tool_results: result.tool_invocations.into_iter().map(|t| t.result).collect(),
        reasoning_type: result.reasoning_type,
        trace: result.trace,
        incomplete: result.incomplete,
        context: session.conversation.context().clone(),
        session_id: payload.session_id,
    }))
}

/// Registered tool schemas
pub async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    let tools: Vec<ToolSchema> = state.tools.schemas();
    Json(json!({ "count": tools.len(), "tools": tools }))
}

pub async fn save_note(
    State(state): State<AppState>,
    Json(payload): Json<NoteRequest>,
) -> ApiResult<NoteResponse> {
    let call = ToolCall::new(
        "save_note",
        json!({"title": payload.title, "content": payload.content, "tags": payload.tags}),
    );
    let result = state.tools.execute(&call).await?;

    Ok(Json(NoteResponse {
        success: result.is_success(),
        note: result.data().cloned(),
        error: result.error().map(str::to_string),
    }))
}

pub async fn list_notes(State(state): State<AppState>) -> Json<NotesResponse> {
    let notes = state.notes.list().await;
    Json(NotesResponse {
        count: notes.len(),
        notes,
        markdown: state.notes.export_markdown().await,
    })
}

pub async fn web_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Value> {
    let call = ToolCall::new(
        "web_search",
        json!({"query": params.query, "num_results": params.num_results}),
    );
    let result = state.tools.execute(&call).await?;

    Ok(Json(json!({
        "success": result.is_success(),
        "results": result.data().cloned().unwrap_or_else(|| json!([])),
        "error": result.error(),
        "metadata": result.metadata(),
    })))
}

/// Analyze a file already present in the upload directory
pub async fn analyze_document(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(params): Query<SessionParam>,
    Json(payload): Json<AnalysisRequest>,
) -> ApiResult<AnalysisResponse> {
    if !is_plain_filename(&filename) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_FILENAME",
            format!("Invalid filename: {filename}"),
        ));
    }

    let path = state.config.upload_dir.join(&filename);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ApiError::not_found(format!("File not found: {filename}")));
    }

    let outcome = match &params.session_id {
        Some(id) => {
            let handle = state.sessions.get_or_create(&SessionId::from_string(id)).await;
            let mut session = handle.lock().await;
            let outcome = state
                .analyzer
                .analyze_into(&mut session.conversation, &path, &payload.analysis_type)
                .await;
            session.touch();
            outcome
        }
        None => state.analyzer.analyze(&path, &payload.analysis_type).await,
    };

    Ok(Json(AnalysisResponse {
        filename,
        outcome,
        session_id: params.session_id,
    }))
}

/// Single path component, no traversal
fn is_plain_filename(name: &str) -> bool {
    let mut components = FsPath::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let Some(handle) = state.sessions.get(&SessionId::from_string(session_id)).await else {
        return Json(HistoryResponse {
            messages: Vec::new(),
            context: HashMap::new(),
        });
    };

    let session = handle.lock().await;
    Json(HistoryResponse {
        messages: session.conversation.history().to_vec(),
        context: session.conversation.context().clone(),
    })
}

pub async fn clear_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Value> {
    if let Some(handle) = state.sessions.get(&SessionId::from_string(&session_id)).await {
        handle.lock().await.reset();
    }
    Json(json!({ "message": format!("Conversation history cleared for session {session_id}") }))
}

pub async fn list_sessions(State(state): State<AppState>) -> Json<Value> {
    let mut sessions = Vec::new();
    for id in state.sessions.list().await {
        if let Some(handle) = state.sessions.get(&id).await {
            let session = handle.lock().await;
            sessions.push(SessionSummary {
                id: id.to_string(),
                title: session.title(),
                messages: session.message_count(),
                updated_at: session.updated_at.to_rfc3339(),
            });
        }
    }
    Json(json!({ "count": sessions.len(), "sessions": sessions }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.sessions.remove(&SessionId::from_string(&session_id)).await {
        Ok(Json(json!({ "message": format!("Session {session_id} deleted") })))
    } else {
        Err(ApiError::not_found(format!("Session {session_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use agent_core::{Completion, GenerationOptions, LlmProvider, Result as CoreResult};
    use research_tools::search::FixedSearchBackend;

    use super::*;
    use crate::config::ServerConfig;

    struct ScriptedProvider {
        script: Mutex<VecDeque<Completion>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> CoreResult<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolSchema]>,
            options: &GenerationOptions,
        ) -> CoreResult<Completion> {
            let next = self.script.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| Completion::text("Fallback reply.", &options.model)))
        }
    }

    async fn app(script: Vec<Completion>, upload_dir: &FsPath) -> axum::Router {
        let provider = Arc::new(ScriptedProvider {
            script: Mutex::new(script.into()),
        });
        let config = ServerConfig {
            upload_dir: upload_dir.to_path_buf(),
            ..ServerConfig::default()
        };
        let state = AppState::assemble(
            config,
            provider,
            "test-model".into(),
            Arc::new(FixedSearchBackend::numbered(4)),
        )
        .await
        .unwrap();
        crate::router(state)
    }

    async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_chat_records_session_history() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(vec![Completion::text("Hello! How can I help?", "m")], dir.path()).await;

        let (status, body) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({"message": "Hello", "reasoning_type": "direct", "session_id": "s1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Hello! How can I help?");
        assert_eq!(body["reasoning_type"], "direct");
        assert_eq!(body["session_id"], "s1");
        assert_eq!(body["context"]["turns"], 1);

        let (_, history) = send(&app, "GET", "/conversation-history/s1", None).await;
        let roles: Vec<&str> = history["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "assistant"]);

        send(&app, "DELETE", "/conversation-history/s1", None).await;
        let (_, history) = send(&app, "GET", "/conversation-history/s1", None).await;
        assert!(history["messages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_reasoning_type_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(Vec::new(), dir.path()).await;

        let (status, body) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({"message": "Hi", "reasoning_type": "telepathy"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "UNSUPPORTED_STRATEGY");
    }

    #[tokio::test]
    async fn test_notes_and_search_routes() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(Vec::new(), dir.path()).await;

        let (status, body) = send(
            &app,
            "POST",
            "/save-note",
            Some(json!({"title": "Lead", "content": "Check the 2017 paper", "tags": ["papers"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["note"]["id"].is_string());

        let (_, notes) = send(&app, "GET", "/notes", None).await;
        assert_eq!(notes["count"], 1);
        assert!(notes["markdown"].as_str().unwrap().contains("## Lead"));

        let (_, search) = send(&app, "POST", "/search?query=transformers&num_results=2", None).await;
        assert_eq!(search["success"], true);
        assert_eq!(search["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_analyze_document_route() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("paper.txt"), "Transformers use attention.")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("empty.txt"), "").await.unwrap();
        let app = app(vec![Completion::text("A paper about attention.", "m")], dir.path()).await;

        let (status, body) = send(
            &app,
            "POST",
            "/analyze-document/paper.txt",
            Some(json!({"analysis_type": "summary"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["content"], "A paper about attention.");
        assert_eq!(body["metadata"]["strategy"], "direct");

        let (status, body) = send(&app, "POST", "/analyze-document/empty.txt", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, "POST", "/analyze-document/missing.txt", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sessions_listing_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(Vec::new(), dir.path()).await;

        send(&app, "POST", "/chat", Some(json!({"message": "Hi", "session_id": "abc"}))).await;
        let (_, sessions) = send(&app, "GET", "/sessions", None).await;
        assert_eq!(sessions["count"], 1);
        assert_eq!(sessions["sessions"][0]["id"], "abc");

        let (status, _) = send(&app, "DELETE", "/sessions/abc", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "DELETE", "/sessions/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[test]
    fn test_plain_filename() {
        assert!(is_plain_filename("paper.pdf"));
        assert!(!is_plain_filename("../secrets.txt"));
        assert!(!is_plain_filename("nested/paper.txt"));
        assert!(!is_plain_filename("/etc/passwd"));
        assert!(!is_plain_filename(""));
    }
}
