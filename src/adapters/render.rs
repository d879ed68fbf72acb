use crate::domain::model::{
    SessionPhase, StreamRecord, SubgraphMessage, TimelineEntry, TimelineKind, ViewState,
};
use crate::domain::ports::SessionObserver;
use serde_json::Value;
use std::io::Write;

const PAYLOAD_PREVIEW_CHARS: usize = 160;
const MAX_EVENT_LINES: usize = 10;

/// Prints timeline cards to a terminal as the view changes.
///
/// LLM text is echoed as it streams; every other entry is printed once, when
/// it first appears. Messages appended to an existing sub-workflow card are
/// printed under the card that is already on screen.
pub struct TimelineRenderer {
    out: Box<dyn Write + Send>,
    printed_seq: u64,
    open_message: Option<(u64, usize)>,
    subgraph_shown: Option<(u64, usize)>,
}

impl TimelineRenderer {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            printed_seq: 0,
            open_message: None,
            subgraph_shown: None,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn emit(&mut self, text: &str) {
        // 終端機寫入失敗時沒有更好的處理方式，只記錄下來
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::debug!("Failed to write timeline output: {}", e);
        }
    }

    fn end_message_line(&mut self) {
        if self.open_message.take().is_some() {
            self.emit("\n");
        }
    }

    fn stream_message(&mut self, view: &ViewState) {
        let Some(entry) = view.timeline.last() else {
            return;
        };
        let TimelineKind::Message { node, text, .. } = &entry.kind else {
            return;
        };

        match self.open_message {
            Some((seq, shown)) if seq == entry.seq => {
                let delta = text.get(shown..).unwrap_or_default().to_string();
                self.emit(&delta);
                self.open_message = Some((seq, text.len()));
            }
            _ => {
                self.end_message_line();
                let header = format!("\n💬 {}\n", node.as_deref().unwrap_or("assistant"));
                self.emit(&header);
                self.emit(text);
                self.open_message = Some((entry.seq, text.len()));
                self.printed_seq = entry.seq;
            }
        }
    }

    fn print_new_entries(&mut self, view: &ViewState) {
        for entry in &view.timeline {
            if entry.seq <= self.printed_seq {
                if let (TimelineKind::Subgraph { messages, .. }, Some((seq, shown))) =
                    (&entry.kind, self.subgraph_shown)
                {
                    if seq == entry.seq && messages.len() > shown {
                        let lines: String = messages[shown..].iter().map(format_subgraph_line).collect();
                        self.emit(&lines);
                        self.subgraph_shown = Some((seq, messages.len()));
                    }
                }
                continue;
            }

            let card = format_entry(entry);
            self.emit(&card);
            self.printed_seq = entry.seq;
            if let TimelineKind::Subgraph { messages, .. } = &entry.kind {
                self.subgraph_shown = Some((entry.seq, messages.len()));
            }
        }
    }
}

impl SessionObserver for TimelineRenderer {
    fn on_record(&mut self, record: &StreamRecord, view: &ViewState) {
        match record {
            StreamRecord::LlmChunk { .. } => self.stream_message(view),
            _ => {
                self.end_message_line();
                self.print_new_entries(view);
            }
        }
    }

    fn on_stream_end(&mut self, view: &ViewState) {
        self.end_message_line();
        self.print_new_entries(view);
    }
}

pub fn format_entry(entry: &TimelineEntry) -> String {
    let time = entry.received_at.format("%H:%M:%S");
    match &entry.kind {
        TimelineKind::Message { node, text, .. } => format!(
            "\n💬 {} [{}]\n{}\n",
            node.as_deref().unwrap_or("assistant"),
            time,
            text
        ),
        TimelineKind::Stage {
            stage,
            payload,
            revision,
        } => format!(
            "\n📋 {} (rev {}) [{}]\n{}",
            stage,
            revision,
            time,
            summarize_payload(payload)
        ),
        TimelineKind::Subgraph { path, messages } => {
            let lines: String = messages.iter().map(format_subgraph_line).collect();
            format!("\n🧩 {} [{}]\n{}", path.join(" › "), time, lines)
        }
        TimelineKind::Interrupt { value, .. } => {
            format!("\n⏸️  Input requested [{}]\n   {}\n", time, preview(value))
        }
        TimelineKind::Resumed { value } => format!("\n▶️  Resumed with {}\n", preview(value)),
        TimelineKind::Error { message } => format!("\n❌ {}\n", message),
    }
}

fn format_subgraph_line(message: &SubgraphMessage) -> String {
    format!(
        "   {}: {}\n",
        message.role.as_deref().unwrap_or("message"),
        message.content
    )
}

/// Calendar payloads get one line per event; anything else a JSON preview.
pub fn summarize_payload(payload: &Value) -> String {
    let events = match payload {
        Value::Array(items) => Some(items),
        Value::Object(fields) => fields.get("events").and_then(Value::as_array),
        _ => None,
    };

    if let Some(events) = events.filter(|items| !items.is_empty() && items.iter().all(is_event)) {
        let mut lines: String = events
            .iter()
            .take(MAX_EVENT_LINES)
            .map(|event| format!("   • {}\n", format_event(event)))
            .collect();
        if events.len() > MAX_EVENT_LINES {
            lines.push_str(&format!("   … {} more\n", events.len() - MAX_EVENT_LINES));
        }
        return lines;
    }

    format!("   {}\n", preview(payload))
}

fn is_event(value: &Value) -> bool {
    value.is_object()
        && (value.get("title").is_some() || value.get("summary").is_some())
        && value.get("start").is_some()
}

fn format_event(event: &Value) -> String {
    let title = event
        .get("title")
        .or_else(|| event.get("summary"))
        .and_then(Value::as_str)
        .unwrap_or("(untitled)");
    let start = time_field(event.get("start"));
    match time_field(event.get("end")) {
        end if end.is_empty() => format!("{} @ {}", title, start),
        end => format!("{} @ {} → {}", title, start, end),
    }
}

/// Times arrive either as strings or as `{"dateTime": ..}` objects.
fn time_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(fields)) => fields
            .get("dateTime")
            .or_else(|| fields.get("date"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn preview(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match text.char_indices().nth(PAYLOAD_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text,
    }
}

pub fn format_summary(view: &ViewState) -> String {
    let mut out = format!("\n── Thread {} ──\n", view.thread_id);
    let phase = match &view.phase {
        SessionPhase::Paused { interrupt } => format!("paused ({})", preview(&interrupt.value)),
        SessionPhase::Failed { reason } => format!("failed: {}", reason),
        other => other.to_string(),
    };
    out.push_str(&format!("Status:   {}\n", phase));
    out.push_str(&format!(
        "Timeline: {} entries ({} records, {} skipped, {} duplicates dropped)\n",
        view.timeline.len(),
        view.stats.records_seen,
        view.stats.records_skipped,
        view.stats.duplicates_dropped
    ));
    if !view.stages.is_empty() {
        out.push_str("Stages:\n");
        for stage in &view.stages {
            out.push_str(&format!("   {} (rev {})\n", stage.stage, stage.revision));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reducer::ViewReducer;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn feed(reducer: &mut ViewReducer, renderer: &mut TimelineRenderer, record: StreamRecord) {
        reducer.apply(record.clone());
        renderer.on_record(&record, reducer.state());
    }

    #[test]
    fn test_streams_message_then_cards() {
        let buf = SharedBuf::default();
        let mut renderer = TimelineRenderer::new(Box::new(buf.clone()));
        let mut reducer = ViewReducer::new("t");
        reducer.begin().unwrap();

        for text in ["Looking at ", "your week"] {
            feed(
                &mut reducer,
                &mut renderer,
                StreamRecord::LlmChunk {
                    message_id: Some("m1".to_string()),
                    node: Some("planner".to_string()),
                    text: text.to_string(),
                },
            );
        }
        feed(
            &mut reducer,
            &mut renderer,
            StreamRecord::StateUpdate {
                stage: "load_calendar".to_string(),
                payload: json!({"events": [
                    {"title": "Standup", "start": {"dateTime": "2024-06-03T09:00"}, "end": "2024-06-03T09:15"}
                ]}),
            },
        );
        for id in ["s1", "s2"] {
            feed(
                &mut reducer,
                &mut renderer,
                StreamRecord::SubgraphMessage {
                    path: vec!["negotiate".to_string()],
                    message: SubgraphMessage {
                        id: Some(id.to_string()),
                        role: Some("ai".to_string()),
                        content: format!("note {}", id),
                    },
                },
            );
        }
        renderer.on_stream_end(reducer.state());

        let text = buf.text();
        assert!(text.contains("💬 planner\nLooking at your week\n"));
        assert!(text.contains("📋 load_calendar (rev 1)"));
        assert!(text.contains("• Standup @ 2024-06-03T09:00 → 2024-06-03T09:15"));
        assert_eq!(text.matches("🧩 negotiate").count(), 1);
        assert!(text.contains("ai: note s1\n   ai: note s2\n"));
    }

    #[test]
    fn test_summarize_plain_payload() {
        assert_eq!(summarize_payload(&json!({"conflicts": 2})), "   {\"conflicts\":2}\n");
        assert_eq!(summarize_payload(&json!("done")), "   done\n");
    }

    #[test]
    fn test_summarize_truncates_event_list() {
        let events: Vec<Value> = (0..12)
            .map(|i| json!({"summary": format!("e{}", i), "start": "09:00"}))
            .collect();
        let text = summarize_payload(&Value::Array(events));
        assert_eq!(text.matches('•').count(), MAX_EVENT_LINES);
        assert!(text.ends_with("… 2 more\n"));
    }

    #[test]
    fn test_summary_mentions_pause() {
        let mut reducer = ViewReducer::new("abc");
        reducer.begin().unwrap();
        reducer.apply(StreamRecord::Interrupt(crate::domain::model::InterruptRequest {
            id: None,
            value: json!("Approve the move?"),
            resumable: true,
        }));
        let summary = format_summary(reducer.state());
        assert!(summary.contains("Thread abc"));
        assert!(summary.contains("paused (Approve the move?)"));
    }
}
