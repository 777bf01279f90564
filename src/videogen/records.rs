use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use super::types::GenerationOutcome;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Completed,
    Failed,
}

/// One finished generation. Records are never modified once stored.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub prompt: String,
    pub video_url: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

impl GenerationRecord {
    /// `None` for progress events, which are never recorded
    pub fn from_outcome(prompt: &str, outcome: &GenerationOutcome) -> Option<Self> {
        let (video_url, status) = match outcome {
            GenerationOutcome::Progress { .. } => return None,
            GenerationOutcome::Completed { video_url, .. } => {
                (Some(video_url.clone()), RecordStatus::Completed)
            }
            GenerationOutcome::Failed { .. } => (None, RecordStatus::Failed),
        };

        Some(Self {
            id: Uuid::new_v4(),
            prompt: prompt.to_string(),
            video_url,
            status,
            created_at: Utc::now(),
        })
    }
}

/// In-memory log of finished generations.
///
/// Records are only ever appended. Once `capacity` is reached the oldest one
/// is evicted; nothing survives a restart.
#[derive(Clone)]
pub struct RecordStore {
    records: Arc<RwLock<VecDeque<GenerationRecord>>>,
    capacity: usize,
}

impl RecordStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Stores the outcome if it is terminal
    pub async fn record(&self, prompt: &str, outcome: &GenerationOutcome) {
        let Some(record) = GenerationRecord::from_outcome(prompt, outcome) else {
            return;
        };
        if self.capacity == 0 {
            return;
        }

        let mut records = self.records.write().await;
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// All retained records, newest first
    pub async fn list(&self) -> Vec<GenerationRecord> {
        self.records.read().await.iter().rev().cloned().collect()
    }
}
