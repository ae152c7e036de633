//! Domain Models

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ResearchError;

/// A saved research note
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Deduplicated and sorted
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub(crate) fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        tags: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            tags: tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            created_at: Utc::now(),
        }
    }

    /// Render as a markdown section
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {}\n\n*{}*",
            self.title,
            self.created_at.format("%Y-%m-%d %H:%M UTC")
        );
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(|t| format!("`{t}`")).collect();
            out.push_str(&format!(" · {}", tags.join(" ")));
        }
        out.push_str("\n\n");
        out.push_str(self.content.trim());
        out.push('\n');
        out
    }
}

/// One web search result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    /// Result URL
    pub source: String,
}

impl SearchHit {
    pub fn new(
        title: impl Into<String>,
        snippet: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            source: source.into(),
        }
    }
}

/// Audience level for `explain_concept`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl ExplainLevel {
    pub const ALL: [ExplainLevel; 3] = [
        ExplainLevel::Beginner,
        ExplainLevel::Intermediate,
        ExplainLevel::Advanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExplainLevel::Beginner => "beginner",
            ExplainLevel::Intermediate => "intermediate",
            ExplainLevel::Advanced => "advanced",
        }
    }

    /// How the explanation should be pitched
    pub fn guidance(self) -> &'static str {
        match self {
            ExplainLevel::Beginner => {
                "Assume no background. Use plain language, an everyday analogy and one simple example."
            }
            ExplainLevel::Intermediate => {
                "Assume general technical literacy. Cover the core mechanism, common uses and one worked example."
            }
            ExplainLevel::Advanced => {
                "Assume domain expertise. Be precise, cover edge cases, trade-offs and related research."
            }
        }
    }
}

impl fmt::Display for ExplainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExplainLevel {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(ExplainLevel::Beginner),
            "intermediate" => Ok(ExplainLevel::Intermediate),
            "advanced" => Ok(ExplainLevel::Advanced),
            other => Err(ResearchError::InvalidInput(format!("unknown level: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_tags_are_normalized() {
        let note = Note::new(
            "t",
            "c",
            vec!["rust".to_string(), " rust ".to_string(), String::new(), "ai".to_string()],
        );
        let tags: Vec<&str> = note.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["ai", "rust"]);
    }

    #[test]
    fn test_note_markdown() {
        let note = Note::new("Findings", "LLMs hallucinate.\n", vec!["ai".to_string()]);
        let md = note.to_markdown();
        assert!(md.starts_with("## Findings"));
        assert!(md.contains("`ai`"));
        assert!(md.ends_with("LLMs hallucinate.\n"));
    }

    #[test]
    fn test_explain_level_parsing() {
        assert_eq!("Beginner".parse::<ExplainLevel>().unwrap(), ExplainLevel::Beginner);
        assert_eq!(ExplainLevel::default(), ExplainLevel::Intermediate);
        assert!("expert".parse::<ExplainLevel>().is_err());
    }
}
