use crate::domain::model::{
    InterruptRequest, SessionPhase, StageSnapshot, StreamRecord, SubgraphMessage, TimelineEntry,
    TimelineKind, ViewState,
};
use crate::utils::error::{CondenserError, Result};
use chrono::Utc;

/// Folds classified records into a [`ViewState`].
///
/// Chunks belonging to one LLM message are merged into a single timeline
/// entry, repeated stage snapshots and sub-workflow messages are dropped, and
/// consecutive sub-workflow messages on the same path share one card.
#[derive(Debug)]
pub struct ViewReducer {
    state: ViewState,
    next_seq: u64,
    open_message: Option<OpenMessage>,
    saw_error: Option<String>,
}

/// Index of the timeline entry currently receiving LLM chunks.
#[derive(Debug)]
struct OpenMessage {
    entry: usize,
    key: Option<String>,
}

impl ViewReducer {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            state: ViewState::new(thread_id),
            next_seq: 1,
            open_message: None,
            saw_error: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn into_state(self) -> ViewState {
        self.state
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.state.phase
    }

    pub fn begin(&mut self) -> Result<()> {
        match self.state.phase {
            SessionPhase::NotStarted
            | SessionPhase::Paused { .. }
            | SessionPhase::Completed
            | SessionPhase::Failed { .. } => {
                self.close_message();
                self.state.phase = SessionPhase::Streaming;
                self.saw_error = None;
                Ok(())
            }
            _ => Err(self.invalid("start a run")),
        }
    }

    /// Treat a fresh view as paused on an interrupt seen by an earlier process.
    pub fn attach_paused(&mut self) -> Result<()> {
        if !matches!(self.state.phase, SessionPhase::NotStarted) {
            return Err(self.invalid("attach to a paused thread"));
        }
        self.state.phase = SessionPhase::Paused {
            interrupt: InterruptRequest {
                id: None,
                value: serde_json::Value::Null,
                resumable: true,
            },
        };
        Ok(())
    }

    pub fn resume(&mut self, value: serde_json::Value) -> Result<()> {
        if !self.state.phase.is_paused() {
            return Err(self.invalid("resume"));
        }
        self.push(TimelineKind::Resumed { value });
        // 上一段的錯誤留在時間軸上，不影響恢復後的結果
        self.saw_error = None;
        self.state.phase = SessionPhase::Streaming;
        Ok(())
    }

    pub fn apply(&mut self, record: StreamRecord) {
        self.state.stats.records_seen += 1;

        match record {
            StreamRecord::LlmChunk {
                message_id,
                node,
                text,
            } => self.apply_chunk(message_id, node, text),
            StreamRecord::StateUpdate { stage, payload } => {
                self.close_message();
                self.apply_stage(stage, payload);
            }
            StreamRecord::SubgraphMessage { path, message } => {
                self.close_message();
                self.apply_subgraph(path, message);
            }
            StreamRecord::Interrupt(request) => {
                self.close_message();
                self.apply_interrupt(request);
            }
            StreamRecord::Error { message } => {
                self.close_message();
                tracing::warn!("Backend reported an error: {}", message);
                self.saw_error = Some(message.clone());
                self.push(TimelineKind::Error { message });
            }
            StreamRecord::End => {
                self.close_message();
                if matches!(self.state.phase, SessionPhase::Streaming) && self.saw_error.is_none() {
                    self.state.phase = SessionPhase::Completed;
                }
            }
            StreamRecord::Unknown(value) => {
                tracing::debug!("Ignoring unclassified record: {}", value);
                self.state.stats.unknown_records += 1;
            }
        }
    }

    /// Count a line that could not be parsed at all.
    pub fn record_skipped(&mut self) {
        self.state.stats.records_skipped += 1;
    }

    /// The response body ended. An error record fails the run even when it
    /// arrived after the end marker.
    pub fn finish(&mut self) {
        self.close_message();
        if matches!(
            self.state.phase,
            SessionPhase::Streaming | SessionPhase::Completed
        ) {
            self.state.phase = match self.saw_error.take() {
                Some(reason) => SessionPhase::Failed { reason },
                None => SessionPhase::Completed,
            };
        }
    }

    /// Drop everything and return to the initial not-started view.
    pub fn reset(&mut self) {
        let thread_id = std::mem::take(&mut self.state.thread_id);
        *self = Self::new(thread_id);
    }

    fn apply_chunk(&mut self, message_id: Option<String>, node: Option<String>, text: String) {
        if text.is_empty() {
            return;
        }

        let key = message_id.clone().or_else(|| node.clone());
        let continues_open = self
            .open_message
            .as_ref()
            .is_some_and(|open| open.key == key);

        if continues_open {
            if let Some(open) = &self.open_message {
                if let Some(TimelineKind::Message { text: buf, .. }) =
                    self.state.timeline.get_mut(open.entry).map(|e| &mut e.kind)
                {
                    buf.push_str(&text);
                }
            }
            if let Some(streaming) = self.state.streaming_text.as_mut() {
                streaming.push_str(&text);
            }
            return;
        }

        self.close_message();
        self.state.streaming_text = Some(text.clone());
        let entry = self.push(TimelineKind::Message {
            message_id,
            node,
            text,
        });
        self.open_message = Some(OpenMessage { entry, key });
    }

    fn close_message(&mut self) {
        self.open_message = None;
        self.state.streaming_text = None;
    }

    fn apply_stage(&mut self, stage: String, payload: serde_json::Value) {
        let revision = match self.state.stages.iter_mut().find(|s| s.stage == stage) {
            Some(existing) if existing.payload == payload => {
                tracing::debug!("Duplicate snapshot for stage '{}' dropped", stage);
                self.state.stats.duplicates_dropped += 1;
                return;
            }
            Some(existing) => {
                existing.revision += 1;
                existing.payload = payload.clone();
                existing.revision
            }
            None => {
                self.state.stages.push(StageSnapshot {
                    stage: stage.clone(),
                    payload: payload.clone(),
                    revision: 1,
                });
                1
            }
        };

        self.push(TimelineKind::Stage {
            stage,
            payload,
            revision,
        });
    }

    fn apply_subgraph(&mut self, path: Vec<String>, message: SubgraphMessage) {
        if let Some(id) = message.id.as_deref() {
            let seen = self.state.timeline.iter().any(|entry| match &entry.kind {
                TimelineKind::Subgraph { path: p, messages } => {
                    *p == path && messages.iter().any(|m| m.id.as_deref() == Some(id))
                }
                _ => false,
            });
            if seen {
                tracing::debug!("Duplicate sub-workflow message '{}' dropped", id);
                self.state.stats.duplicates_dropped += 1;
                return;
            }
        }

        if let Some(TimelineKind::Subgraph { path: p, messages }) =
            self.state.timeline.last_mut().map(|e| &mut e.kind)
        {
            if *p == path {
                messages.push(message);
                return;
            }
        }

        self.push(TimelineKind::Subgraph {
            path,
            messages: vec![message],
        });
    }

    fn apply_interrupt(&mut self, request: InterruptRequest) {
        if let SessionPhase::Paused { interrupt } = &self.state.phase {
            if request.id.is_some() && interrupt.id == request.id {
                self.state.stats.duplicates_dropped += 1;
                return;
            }
        }

        self.push(TimelineKind::Interrupt {
            interrupt_id: request.id.clone(),
            value: request.value.clone(),
        });

        if request.resumable {
            tracing::info!("⏸️  Workflow paused waiting for input");
            self.state.phase = SessionPhase::Paused { interrupt: request };
        }
    }

    fn push(&mut self, kind: TimelineKind) -> usize {
        self.state.timeline.push(TimelineEntry {
            seq: self.next_seq,
            received_at: Utc::now(),
            kind,
        });
        self.next_seq += 1;
        self.state.timeline.len() - 1
    }

    fn invalid(&self, action: &str) -> CondenserError {
        CondenserError::InvalidTransition {
            action: action.to_string(),
            phase: self.state.phase.to_string(),
        }
    }
}
