//! Bounded in-memory log of HTTP interactions, for diagnostics only

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::completions::{CompletionRequest, CompletionResponse};

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub request_path: String,
    pub request_method: String,
    pub request: CompletionRequest,
    pub response: CompletionResponse,
    pub processing_time_ms: u64,
    pub additional_info: Map<String, Value>,
}

/// Everything about an interaction except the identity assigned on record.
#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub client_ip: Option<String>,
    pub request_path: String,
    pub request_method: String,
    pub request: CompletionRequest,
    pub response: CompletionResponse,
    pub processing_time_ms: u64,
    pub additional_info: Map<String, Value>,
}

#[derive(Debug)]
pub struct InteractionLog {
    capacity: usize,
    entries: RwLock<VecDeque<Interaction>>,
}

impl InteractionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::new()),
        }
    }

    /// Stores the interaction and returns its id, evicting the oldest entries
    /// once the log is over capacity.
    pub fn record(&self, interaction: NewInteraction) -> String {
        let id = Uuid::new_v4().to_string();
        let entry = Interaction {
            id: id.clone(),
            timestamp: Utc::now(),
            client_ip: interaction.client_ip,
            request_path: interaction.request_path,
            request_method: interaction.request_method,
            request: interaction.request,
            response: interaction.response,
            processing_time_ms: interaction.processing_time_ms,
            additional_info: interaction.additional_info,
        };

        let mut entries = self.entries.write();
        entries.push_back(entry);
        let overflow = entries.len().saturating_sub(self.capacity);
        if overflow > 0 {
            entries.drain(..overflow);
            debug!(evicted = overflow, "trimmed oldest interactions");
        }
        debug!(id = %id, "recorded interaction");
        id
    }

    /// All retained interactions, newest first.
    pub fn all(&self) -> Vec<Interaction> {
        self.entries.read().iter().rev().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Interaction> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        info!("cleared all interactions");
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for InteractionLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
