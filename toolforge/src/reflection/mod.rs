//! Reflection records and the structured contract a reflection must meet.

pub mod engine;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::gateway::extract::extract_json_object;

pub use engine::{ReflectionEngine, ReflectionError, ReflectionHistory};

pub const DEFAULT_CATEGORY: &str = "utility";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("reflection schema error: {0}")]
pub struct SchemaError(pub String);

/// The single tool a reflection asks to build next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRecommendation {
    pub name: String,
    pub purpose: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub implementation_notes: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl ToolRecommendation {
    pub fn new(name: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            purpose: purpose.into(),
            category: default_category(),
            implementation_notes: String::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionRecord {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub missing_capabilities: Vec<String>,
    #[serde(default)]
    pub patterns_observed: Vec<String>,
    #[serde(default)]
    pub improvement_priority: String,
    pub next_tool_recommendation: ToolRecommendation,
    #[serde(default)]
    pub internal_monologue: String,
    pub timestamp: DateTime<Utc>,
}

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

pub fn is_valid_tool_name(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name) && !PYTHON_KEYWORDS.contains(&name)
}

/// Lists may arrive as a single string; anything else counts as empty.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Parse a model response into a reflection stamped with `timestamp`.
pub fn parse_reflection(text: &str, timestamp: DateTime<Utc>) -> Result<ReflectionRecord, SchemaError> {
    let object = extract_json_object(text)
        .ok_or_else(|| SchemaError("response contains no JSON object".to_string()))?;

    let recommendation = object
        .get("next_tool_recommendation")
        .filter(|v| v.is_object())
        .ok_or_else(|| SchemaError("missing next_tool_recommendation".to_string()))?;

    let name = text_field(recommendation.get("name"));
    if name.is_empty() {
        return Err(SchemaError("next_tool_recommendation.name is empty".to_string()));
    }
    if !is_valid_tool_name(&name) {
        return Err(SchemaError(format!(
            "next_tool_recommendation.name '{}' is not a valid identifier",
            name
        )));
    }
    let purpose = text_field(recommendation.get("purpose"));
    if purpose.is_empty() {
        return Err(SchemaError("next_tool_recommendation.purpose is empty".to_string()));
    }
    let category = text_field(recommendation.get("category"));

    Ok(ReflectionRecord {
        strengths: string_list(object.get("strengths")),
        weaknesses: string_list(object.get("weaknesses")),
        missing_capabilities: string_list(object.get("missing_capabilities")),
        patterns_observed: string_list(object.get("patterns_observed")),
        improvement_priority: text_field(object.get("improvement_priority")),
        next_tool_recommendation: ToolRecommendation {
            name,
            purpose,
            category: if category.is_empty() {
                default_category()
            } else {
                category
            },
            implementation_notes: text_field(recommendation.get("implementation_notes")),
        },
        internal_monologue: text_field(object.get("internal_monologue")),
        timestamp,
    })
}
