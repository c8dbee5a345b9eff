//! Tool Registry: durable, append-only `name -> ToolRecord` map.
//!
//! Records are immutable once registered. A registration is written to the
//! backing store before it becomes visible, so a failed write leaves the
//! registry exactly as it was.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{DocumentStore, StoreError};
use crate::synthesis::CaseOutcome;
use crate::types::{Parameter, TypeTag};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateName(String),
    #[error("tool '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An accepted tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub purpose: String,
    pub parameters: Vec<Parameter>,
    pub return_type: TypeTag,
    pub source: String,
    pub documentation: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub test_outcomes: Vec<CaseOutcome>,
    #[serde(default = "default_attempts")]
    pub validation_attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl ToolRecord {
    /// `name(a: int) -> str`
    pub fn signature(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.declared_type.python_name()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({}) -> {}", self.name, params, self.return_type.python_name())
    }

    pub fn summary(&self) -> ToolSummary {
        let description = self
            .documentation
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or(self.purpose.as_str())
            .to_string();
        ToolSummary {
            name: self.name.clone(),
            category: self.category.clone(),
            signature: self.signature(),
            description,
        }
    }
}

/// Brief description of a tool, as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub category: String,
    pub signature: String,
    pub description: String,
}

pub struct ToolRegistry {
    tools: IndexMap<String, ToolRecord>,
    store: Box<dyn DocumentStore<ToolRecord>>,
}

impl ToolRegistry {
    /// Open a registry over `store`, loading everything it holds.
    pub fn open(store: Box<dyn DocumentStore<ToolRecord>>) -> Result<Self, RegistryError> {
        let mut tools = IndexMap::new();
        for record in store.load()? {
            if tools.contains_key(&record.name) {
                tracing::warn!(tool = %record.name, "duplicate tool in store; keeping the first");
                continue;
            }
            tools.insert(record.name.clone(), record);
        }
        tracing::info!(count = tools.len(), store = %store.describe(), "tool registry loaded");
        Ok(Self { tools, store })
    }

    pub fn register(&mut self, record: ToolRecord) -> Result<(), RegistryError> {
        if self.tools.contains_key(&record.name) {
            return Err(RegistryError::DuplicateName(record.name));
        }
        let mut snapshot: Vec<ToolRecord> = self.tools.values().cloned().collect();
        snapshot.push(record.clone());
        self.store.save(&snapshot)?;

        tracing::info!(tool = %record.name, category = %record.category, "tool registered");
        self.tools.insert(record.name.clone(), record);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolRecord, RegistryError> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Insertion-ordered snapshot.
    pub fn all(&self) -> Vec<ToolRecord> {
        self.tools.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolRecord> {
        self.tools.values()
    }

    pub fn summaries(&self) -> Vec<ToolSummary> {
        self.tools.values().map(ToolRecord::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Rewrite the store from memory.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.store.save(&self.all())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use std::sync::Arc;

    pub(crate) fn record(name: &str, category: &str) -> ToolRecord {
        ToolRecord {
            name: name.to_string(),
            category: category.to_string(),
            purpose: format!("{} purpose", name),
            parameters: vec![Parameter::new("text", TypeTag::String)],
            return_type: TypeTag::String,
            source: format!("def {}(text: str) -> str:\n    return text\n", name),
            documentation: format!("Docs for {}.", name),
            created_at: Utc::now(),
            test_outcomes: Vec::new(),
            validation_attempts: 1,
        }
    }

    #[test]
    fn duplicate_names_are_rejected_and_first_record_kept() {
        let mut registry = ToolRegistry::open(Box::new(InMemoryStore::<ToolRecord>::new())).unwrap();
        registry.register(record("echo", "text")).unwrap();
        let mut second = record("echo", "other");
        second.documentation = "Replacement.".into();
        let err = registry.register(second).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(ref n) if n == "echo"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("echo").unwrap().category, "text");
    }

    #[test]
    fn failed_persistence_leaves_registry_unchanged() {
        let store: Arc<InMemoryStore<ToolRecord>> = Arc::new(InMemoryStore::new());
        let mut registry = ToolRegistry::open(Box::new(store.clone())).unwrap();
        registry.register(record("first", "text")).unwrap();
        store.set_fail_writes(true);
        assert!(matches!(
            registry.register(record("second", "text")),
            Err(RegistryError::Store(_))
        ));
        assert!(!registry.contains("second"));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn all_preserves_insertion_order_and_lookup_reports_missing() {
        let mut registry = ToolRegistry::open(Box::new(InMemoryStore::<ToolRecord>::new())).unwrap();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(record(name, "text")).unwrap();
        }
        let names: Vec<String> = registry.all().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(matches!(registry.lookup("nope"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn summary_uses_first_doc_line_and_signature() {
        let summary = record("echo", "text").summary();
        assert_eq!(summary.signature, "echo(text: str) -> str");
        assert_eq!(summary.description, "Docs for echo.");
    }
}
