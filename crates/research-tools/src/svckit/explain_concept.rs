//! Explain Concept Tool
//!
//! Asks the model for an explanation pitched at a chosen level.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use agent_core::{
    AgentError, GenerationOptions, LlmProvider, Message, ParamType, ParameterSchema,
    Result as CoreResult, Tool, ToolArgs, ToolSchema,
};

use crate::error::ResearchError;
use crate::model::ExplainLevel;

const EXPLAINER_PROMPT: &str = "You are a patient tutor. Explain the requested concept \
accurately. Structure the answer with a one-sentence definition, the key ideas, and an example.";

pub struct ExplainConceptTool {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
}

impl ExplainConceptTool {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self { provider, options }
    }
}

#[derive(Deserialize)]
struct ExplainArgs {
    concept: String,
    #[serde(default)]
    level: ExplainLevel,
}

#[async_trait]
impl Tool for ExplainConceptTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "explain_concept".into(),
            description: "Explain a concept at a beginner, intermediate or advanced level.".into(),
            parameters: vec![
                ParameterSchema::required("concept", ParamType::String, "Concept to explain"),
                ParameterSchema::optional("level", ParamType::String, "Audience level")
                    .with_default(json!(ExplainLevel::default().as_str()))
                    .with_enum(ExplainLevel::ALL.iter().map(|l| json!(l.as_str())).collect()),
            ],
            category: Some("research".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, args: ToolArgs) -> CoreResult<Value> {
        let args: ExplainArgs = args.parse()?;
        let concept = args.concept.trim();
        if concept.is_empty() {
            return Err(ResearchError::InvalidInput("concept must not be empty".into()).into());
        }

        let messages = [
            Message::system(format!("{EXPLAINER_PROMPT}\n\n{}", args.level.guidance())),
            Message::user(format!("Explain \"{concept}\" for a {} audience.", args.level)),
        ];
        let completion = self.provider.complete(&messages, None, &self.options).await?;

        let explanation = completion.content.trim();
        if explanation.is_empty() {
            return Err(AgentError::ToolExecution("the model returned no explanation".into()));
        }

        Ok(json!({
            "concept": concept,
            "level": args.level,
            "explanation": explanation,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use agent_core::{Completion, ToolCall, ToolRegistry};

    use super::*;

    /// Echoes the user prompt back so tests can see what was asked
    struct EchoProvider {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn health_check(&self) -> CoreResult<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            _tools: Option<&[ToolSchema]>,
            options: &GenerationOptions,
        ) -> CoreResult<Completion> {
            let system = messages[0].content.clone();
            self.prompts.lock().unwrap().push(system);
            Ok(Completion::text(messages[1].content.clone(), &options.model))
        }
    }

    struct DownProvider;

    #[async_trait]
    impl LlmProvider for DownProvider {
        fn name(&self) -> &str {
            "down"
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
            Err(AgentError::ProviderUnavailable("connection refused".into()))
        }
    }

    fn registry(provider: Arc<dyn LlmProvider>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(ExplainConceptTool::new(provider, GenerationOptions::default()))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_default_level_is_intermediate() {
        let provider = Arc::new(EchoProvider {
            prompts: Mutex::new(Vec::new()),
        });
        let registry = registry(provider.clone());

        let result = registry
            .execute(&ToolCall::new("explain_concept", json!({"concept": "backpropagation"})))
            .await
            .unwrap();

        assert!(result.is_success());
        let data = result.data().unwrap();
        assert_eq!(data["level"], "intermediate");
        assert!(data["explanation"].as_str().unwrap().contains("backpropagation"));
        assert!(provider.prompts.lock().unwrap()[0].contains("general technical literacy"));
    }

    #[tokio::test]
    async fn test_unknown_level_rejected_before_handler() {
        let provider = Arc::new(EchoProvider {
            prompts: Mutex::new(Vec::new()),
        });
        let registry = registry(provider.clone());

        let err = registry
            .execute(&ToolCall::new(
                "explain_concept",
                json!({"concept": "entropy", "level": "expert"}),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Validation(_)));
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_a_failed_result() {
        let registry = registry(Arc::new(DownProvider));
        let result = registry
            .execute(&ToolCall::new("explain_concept", json!({"concept": "entropy", "level": "advanced"})))
            .await
            .unwrap();

        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("unavailable"));
    }
}
