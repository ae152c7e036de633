//! Document Analyzer
//!
//! Extracts text from a document on disk and hands it to the reasoning
//! engine with mode-specific instructions. Analysis never uses tools and
//! never uses `react`. Extraction problems are reported as a failed
//! outcome before the engine is involved.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use agent_core::{Conversation, ReasoningEngine, ReasoningRequest, ReasoningType};

use crate::error::{ResearchError, Result};

/// Characters of document text sent to the model
pub const DEFAULT_MAX_CHARS: usize = 12_000;

/// Kind of analysis to run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Summary,
    KeyPoints,
    Qa,
}

impl AnalysisMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisMode::Summary => "summary",
            AnalysisMode::KeyPoints => "key_points",
            AnalysisMode::Qa => "qa",
        }
    }

    pub fn strategy(self) -> ReasoningType {
        match self {
            AnalysisMode::Summary => ReasoningType::Direct,
            AnalysisMode::KeyPoints | AnalysisMode::Qa => ReasoningType::ChainOfThought,
        }
    }

    fn instructions(self) -> &'static str {
        match self {
            AnalysisMode::Summary => {
                "Summarize the following document. Cover its purpose, main arguments and \
                 conclusions in a few short paragraphs."
            }
            AnalysisMode::KeyPoints => {
                "Extract the key points of the following document. Identify the central \
                 claims, the supporting evidence and any open issues, then list the key \
                 points as bullets."
            }
            AnalysisMode::Qa => {
                "Write five question and answer pairs that test understanding of the \
                 following document. Answers must be grounded in the document text."
            }
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(AnalysisMode::Summary),
            "key_points" | "key-points" | "keypoints" => Ok(AnalysisMode::KeyPoints),
            "qa" | "q&a" => Ok(AnalysisMode::Qa),
            other => Err(ResearchError::InvalidInput(format!(
                "unknown analysis type '{other}', use summary, key_points or qa"
            ))),
        }
    }
}

/// Result of an analysis: either `content` or `error`, never both
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisOutcome {
    success: bool,
    content: Option<String>,
    error: Option<String>,
    metadata: HashMap<String, Value>,
}

impl AnalysisOutcome {
    fn success(content: String, metadata: HashMap<String, Value>) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
            metadata,
        }
    }

    fn failure(error: impl Into<String>, metadata: HashMap<String, Value>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
            metadata,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }
}

pub struct DocumentAnalyzer {
    engine: Arc<ReasoningEngine>,
    max_chars: usize,
}

impl DocumentAnalyzer {
    pub fn new(engine: Arc<ReasoningEngine>) -> Self {
        Self {
            engine,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    /// Analyze in a throwaway conversation
    pub async fn analyze(&self, path: impl AsRef<Path>, mode: &str) -> AnalysisOutcome {
        let mut conversation = Conversation::new();
        self.analyze_into(&mut conversation, path, mode).await
    }

    /// Analyze and record the exchange in `conversation`
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display(), mode))]
    pub async fn analyze_into(
        &self,
        conversation: &mut Conversation,
        path: impl AsRef<Path>,
        mode: &str,
    ) -> AnalysisOutcome {
        let path = path.as_ref();
        let source = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let mut metadata = HashMap::from([("source".to_string(), json!(source))]);

        let mode = match AnalysisMode::from_str(mode) {
            Ok(mode) => mode,
            Err(e) => return AnalysisOutcome::failure(e.to_string(), metadata),
        };
        metadata.insert("mode".into(), json!(mode));
        metadata.insert("strategy".into(), json!(mode.strategy()));

        let text = match extract_text(path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Document extraction failed");
                return AnalysisOutcome::failure(e.to_string(), metadata);
            }
        };

        let characters = text.chars().count();
        let (excerpt, truncated) = truncate_chars(&text, self.max_chars);
        metadata.insert("characters".into(), json!(characters));
        metadata.insert("truncated".into(), json!(truncated));

        let mut prompt = format!(
            "{}\n\nDocument: {source}\n\n---\n{excerpt}\n---",
            mode.instructions()
        );
        if truncated {
            prompt.push_str(&format!(
                "\n\n(Only the first {} characters of the document are shown.)",
                self.max_chars
            ));
        }

        let request = ReasoningRequest::new(prompt, mode.strategy()).with_tools(false);
        match self.engine.reason(conversation, &request).await {
            Ok(result) => {
                record_document(conversation, &source, mode);
                tracing::info!(characters, truncated, rounds = result.rounds, "Document analyzed");
                AnalysisOutcome::success(result.response, metadata)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Document analysis failed");
                AnalysisOutcome::failure(e.user_message(), metadata)
            }
        }
    }
}

/// Append to the conversation's `analyzed_documents` context list
fn record_document(conversation: &mut Conversation, source: &str, mode: AnalysisMode) {
    let mut documents = conversation
        .context()
        .get("analyzed_documents")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    documents.push(json!({"source": source, "mode": mode}));
    conversation.set_context("analyzed_documents", Value::Array(documents));
}

/// Read a document's text. Empty or binary content is an extraction error.
pub async fn extract_text(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let text = match extension.as_str() {
        "" | "txt" | "md" | "markdown" | "csv" => {
            let bytes = read_document(path).await?;
            if bytes.contains(&0) {
                return Err(ResearchError::Extraction("file is not a text document".into()));
            }
            String::from_utf8_lossy(&bytes).into_owned()
        }
        "pdf" => {
            let bytes = read_document(path).await?;
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| ResearchError::Extraction(format!("PDF reader crashed: {e}")))?
                .map_err(|e| ResearchError::Extraction(format!("unreadable PDF: {e}")))?
        }
        other => return Err(ResearchError::UnsupportedFormat(format!(".{other}"))),
    };

    if text.trim().is_empty() {
        return Err(ResearchError::Extraction("document contains no text".into()));
    }
    Ok(text)
}

async fn read_document(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ResearchError::Extraction(format!("cannot read {}: {e}", path.display())))
}

/// Cut `text` to at most `max_chars` characters
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use agent_core::{
        AgentError, Completion, EngineBuilder, GenerationOptions, LlmProvider, Message,
        Result as CoreResult, Role, ToolSchema,
    };
    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingProvider {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn health_check(&self) -> CoreResult<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            tools: Option<&[ToolSchema]>,
            _options: &GenerationOptions,
        ) -> CoreResult<Completion> {
            assert!(tools.is_none());
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            Ok(Completion::text(
                "Step 1: read it.\nFinal Answer: A short summary.",
                "test-model",
            ))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn health_check(&self) -> CoreResult<bool> {
            Ok(false)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolSchema]>,
            _options: &GenerationOptions,
        ) -> CoreResult<Completion> {
            Err(AgentError::Auth("invalid key".into()))
        }
    }

    fn analyzer(provider: Arc<dyn LlmProvider>) -> DocumentAnalyzer {
        let engine = EngineBuilder::new().provider(provider).build().unwrap();
        DocumentAnalyzer::new(Arc::new(engine))
    }

    #[test]
    fn test_mode_parsing_and_strategy() {
        assert_eq!("Summary".parse::<AnalysisMode>().unwrap(), AnalysisMode::Summary);
        assert_eq!("key-points".parse::<AnalysisMode>().unwrap(), AnalysisMode::KeyPoints);
        assert_eq!(AnalysisMode::Summary.strategy(), ReasoningType::Direct);
        assert_eq!(AnalysisMode::Qa.strategy(), ReasoningType::ChainOfThought);
        assert!("translate".parse::<AnalysisMode>().is_err());
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("héllo", 5), ("héllo", false));
    }

    #[tokio::test]
    async fn test_summary_of_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.txt");
        tokio::fs::write(&path, "Attention lets models weigh tokens.").await.unwrap();

        let provider = Arc::new(RecordingProvider::default());
        let outcome = analyzer(provider.clone()).analyze(&path, "summary").await;

        assert!(outcome.is_success());
        assert!(outcome.error().is_none());
        assert_eq!(outcome.metadata()["source"], "paper.txt");
        assert_eq!(outcome.metadata()["strategy"], "direct");
        assert_eq!(outcome.metadata()["truncated"], false);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(provider.prompts.lock().unwrap()[0].contains("Attention lets models"));
    }

    #[tokio::test]
    async fn test_long_document_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.md");
        tokio::fs::write(&path, "a".repeat(500)).await.unwrap();

        let provider = Arc::new(RecordingProvider::default());
        let outcome = analyzer(provider.clone())
            .with_max_chars(100)
            .analyze(&path, "key_points")
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.metadata()["characters"], 500);
        assert_eq!(outcome.metadata()["truncated"], true);
        let prompt = provider.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains(&"a".repeat(100)));
        assert!(!prompt.contains(&"a".repeat(101)));
    }

    #[tokio::test]
    async fn test_unreadable_inputs_never_reach_engine() {
        let dir = tempfile::tempdir().unwrap();
        let blank = dir.path().join("blank.txt");
        tokio::fs::write(&blank, "  \n\t ").await.unwrap();
        let binary = dir.path().join("blob.txt");
        tokio::fs::write(&binary, [0u8, 159, 146, 150]).await.unwrap();
        let image = dir.path().join("photo.png");
        tokio::fs::write(&image, "not really").await.unwrap();
        let bad_pdf = dir.path().join("broken.pdf");
        tokio::fs::write(&bad_pdf, "this is not a pdf").await.unwrap();
        let missing = dir.path().join("missing.txt");

        let provider = Arc::new(RecordingProvider::default());
        let analyzer = analyzer(provider.clone());

        for path in [&blank, &binary, &image, &bad_pdf, &missing] {
            let outcome = analyzer.analyze(path, "summary").await;
            assert!(!outcome.is_success(), "{} should fail", path.display());
            assert!(outcome.content().is_none());
            assert!(outcome.error().is_some());
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_mode_is_failed_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        tokio::fs::write(&path, "content").await.unwrap();

        let provider = Arc::new(RecordingProvider::default());
        let outcome = analyzer(provider.clone()).analyze(&path, "translate").await;

        assert!(!outcome.is_success());
        assert!(outcome.error().unwrap().contains("translate"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["success"], serde_json::json!(false));
        assert_eq!(body["content"], Value::Null);
        assert!(body.as_object().unwrap().contains_key("content"));
    }

    #[tokio::test]
    async fn test_analyze_into_records_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        tokio::fs::write(&path, "# Notes\nSome findings.").await.unwrap();

        let analyzer = analyzer(Arc::new(RecordingProvider::default()));
        let mut conversation = Conversation::new();
        let outcome = analyzer.analyze_into(&mut conversation, &path, "qa").await;

        assert!(outcome.is_success());
        assert_eq!(outcome.content(), Some("Step 1: read it.\nFinal Answer: A short summary."));
        let roles: Vec<Role> = conversation.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(
            conversation.context()["analyzed_documents"],
            json!([{"source": "notes.md", "mode": "qa"}])
        );
    }

    #[tokio::test]
    async fn test_engine_failure_is_failed_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        tokio::fs::write(&path, "content").await.unwrap();

        let outcome = analyzer(Arc::new(FailingProvider)).analyze(&path, "summary").await;
        assert!(!outcome.is_success());
        assert!(outcome.error().unwrap().contains("Authentication failed"));
    }
}
