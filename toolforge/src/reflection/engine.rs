//! Reflection engine and its append-only history.

use chrono::Utc;
use thiserror::Error;

use super::{parse_reflection, ReflectionRecord, SchemaError};
use crate::gateway::{GatewayError, ModelGateway};
use crate::registry::ToolSummary;
use crate::storage::{DocumentStore, StoreError};

/// How many past reflections are shown to the model.
pub const RECENT_WINDOW: usize = 3;

#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("reflection request failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("reflection history: {0}")]
    Store(#[from] StoreError),
}

/// Ordered, append-only list of reflections backed by a document store.
pub struct ReflectionHistory {
    records: Vec<ReflectionRecord>,
    store: Box<dyn DocumentStore<ReflectionRecord>>,
}

impl ReflectionHistory {
    pub fn open(store: Box<dyn DocumentStore<ReflectionRecord>>) -> Result<Self, StoreError> {
        let records = store.load()?;
        tracing::info!(count = records.len(), store = %store.describe(), "reflection history loaded");
        Ok(Self { records, store })
    }

    /// Persist, then append. On a failed write the history is unchanged.
    pub fn append(&mut self, record: ReflectionRecord) -> Result<(), StoreError> {
        self.records.push(record);
        if let Err(err) = self.store.save(&self.records) {
            self.records.pop();
            return Err(err);
        }
        Ok(())
    }

    pub fn recent(&self, n: usize) -> &[ReflectionRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    pub fn all(&self) -> &[ReflectionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.store.save(&self.records)
    }
}

pub struct ReflectionEngine {
    gateway: ModelGateway,
    history: ReflectionHistory,
}

impl ReflectionEngine {
    pub fn new(gateway: ModelGateway, history: ReflectionHistory) -> Self {
        Self { gateway, history }
    }

    pub fn history(&self) -> &ReflectionHistory {
        &self.history
    }

    /// Ask for a reflection over `tools`, validate it and record it.
    pub async fn reflect(&mut self, tools: &[ToolSummary]) -> Result<ReflectionRecord, ReflectionError> {
        let raw = self
            .gateway
            .request_reflection(tools, self.history.recent(RECENT_WINDOW))
            .await?;
        let record = parse_reflection(&raw, Utc::now())?;
        self.history.append(record.clone())?;
        tracing::info!(
            next_tool = %record.next_tool_recommendation.name,
            category = %record.next_tool_recommendation.category,
            priority = %record.improvement_priority,
            "reflection recorded"
        );
        Ok(record)
    }
}
