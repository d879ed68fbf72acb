use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One classified NDJSON record from the condenser stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    LlmChunk {
        message_id: Option<String>,
        node: Option<String>,
        text: String,
    },
    StateUpdate {
        stage: String,
        payload: serde_json::Value,
    },
    Interrupt(InterruptRequest),
    SubgraphMessage {
        path: Vec<String>,
        message: SubgraphMessage,
    },
    Error {
        message: String,
    },
    End,
    Unknown(serde_json::Value),
}

impl StreamRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LlmChunk { .. } => "llm_chunk",
            Self::StateUpdate { .. } => "state_update",
            Self::Interrupt(_) => "interrupt",
            Self::SubgraphMessage { .. } => "subgraph_message",
            Self::Error { .. } => "error",
            Self::End => "end",
            Self::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptRequest {
    pub id: Option<String>,
    pub value: serde_json::Value,
    pub resumable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphMessage {
    pub id: Option<String>,
    pub role: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    NotStarted,
    Streaming,
    Paused { interrupt: InterruptRequest },
    Completed,
    Failed { reason: String },
}

impl SessionPhase {
    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Streaming => "streaming",
            Self::Paused { .. } => "paused",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        };
        f.write_str(name)
    }
}

/// Latest snapshot for one workflow stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub stage: String,
    pub payload: serde_json::Value,
    pub revision: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub seq: u64,
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: TimelineKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineKind {
    Message {
        message_id: Option<String>,
        node: Option<String>,
        text: String,
    },
    Stage {
        stage: String,
        payload: serde_json::Value,
        revision: u32,
    },
    Subgraph {
        path: Vec<String>,
        messages: Vec<SubgraphMessage>,
    },
    Interrupt {
        interrupt_id: Option<String>,
        value: serde_json::Value,
    },
    Resumed {
        value: serde_json::Value,
    },
    Error {
        message: String,
    },
}

impl TimelineKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Stage { .. } => "stage",
            Self::Subgraph { .. } => "subgraph",
            Self::Interrupt { .. } => "interrupt",
            Self::Resumed { .. } => "resumed",
            Self::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub records_seen: u64,
    pub records_skipped: u64,
    pub duplicates_dropped: u64,
    pub unknown_records: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub thread_id: String,
    pub phase: SessionPhase,
    pub stages: Vec<StageSnapshot>,
    pub streaming_text: Option<String>,
    pub timeline: Vec<TimelineEntry>,
    pub stats: StreamStats,
}

impl ViewState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            phase: SessionPhase::NotStarted,
            stages: Vec::new(),
            streaming_text: None,
            timeline: Vec::new(),
            stats: StreamStats::default(),
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageSnapshot> {
        self.stages.iter().find(|s| s.stage == name)
    }
}
