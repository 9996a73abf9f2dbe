//! Structured output expected back from the reasoning capability.
//!
//! ```json
//! {
//!   "summary": "required, non-empty",
//!   "artifacts": [{"type": "code", "content": "...", "metadata": {}}],
//!   "decisions": [{"context": "...", "chosen_option": "...", "options_considered": [],
//!                  "rationale": "...", "impact": "medium", "reversible": true}],
//!   "open_questions": [], "assumptions": [], "recommendations": [],
//!   "narrative_note": "",
//!   "next_agent": null,
//!   "terminal": false
//! }
//! ```
//!
//! Unknown fields are ignored; unknown enum tags are rejected.

use serde::{Deserialize, Serialize};
use spine_core::{AgentName, ArtifactType, Impact, Metadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDraft {
    /// Defaults to the role's artifact type.
    #[serde(rename = "type", default)]
    pub artifact_type: Option<ArtifactType>,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDraft {
    pub context: String,
    #[serde(default)]
    pub options_considered: Vec<String>,
    pub chosen_option: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default = "default_true")]
    pub reversible: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningOutput {
    pub summary: String,
    pub artifacts: Vec<ArtifactDraft>,
    pub decisions: Vec<DecisionDraft>,
    pub open_questions: Vec<String>,
    pub assumptions: Vec<String>,
    pub recommendations: Vec<String>,
    pub narrative_note: String,
    /// Must be one of the agent's downstream neighbours.
    pub next_agent: Option<AgentName>,
    /// End the chain here.
    pub terminal: bool,
}

impl ReasoningOutput {
    /// Parse and check a raw reply. The error is a human-readable detail.
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err(format!("expected a JSON object, got {}", kind_of(&value)));
        }
        let output: Self = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if output.summary.trim().is_empty() {
            return Err("'summary' is missing or empty".into());
        }
        if let Some(i) = output.artifacts.iter().position(|a| a.content.trim().is_empty()) {
            return Err(format!("artifact #{i} has empty content"));
        }
        if let Some(i) = output
            .decisions
            .iter()
            .position(|d| d.chosen_option.trim().is_empty())
        {
            return Err(format!("decision #{i} has no chosen_option"));
        }
        Ok(output)
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
