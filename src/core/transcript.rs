use crate::domain::model::{TimelineEntry, TimelineKind, ViewState};
use crate::domain::ports::Storage;
use crate::utils::error::{CondenserError, Result};

/// Writes the final view of a thread as `<thread>.json` and `<thread>.csv`.
pub struct TranscriptWriter<S: Storage> {
    storage: S,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptFiles {
    pub json: String,
    pub csv: String,
}

impl<S: Storage> TranscriptWriter<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn write(&self, view: &ViewState) -> Result<TranscriptFiles> {
        let files = TranscriptFiles {
            json: format!("{}.json", view.thread_id),
            csv: format!("{}.csv", view.thread_id),
        };

        let json_data = serde_json::to_vec_pretty(view)?;
        tracing::debug!("Writing {} ({} bytes)", files.json, json_data.len());
        self.storage.write_file(&files.json, &json_data).await?;

        let csv_data = timeline_csv(&view.timeline)?;
        tracing::debug!("Writing {} ({} bytes)", files.csv, csv_data.len());
        self.storage.write_file(&files.csv, &csv_data).await?;

        Ok(files)
    }

    pub async fn read_view(&self, thread_id: &str) -> Result<ViewState> {
        let data = self.storage.read_file(&format!("{}.json", thread_id)).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

pub fn timeline_csv(timeline: &[TimelineEntry]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["seq", "received_at", "kind", "label", "detail"])?;

    for entry in timeline {
        let (label, detail) = row_fields(&entry.kind);
        writer.write_record([
            entry.seq.to_string(),
            entry.received_at.to_rfc3339(),
            entry.kind.name().to_string(),
            label,
            detail,
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| CondenserError::IoError(e.into_error()))
}

fn row_fields(kind: &TimelineKind) -> (String, String) {
    match kind {
        TimelineKind::Message { node, text, .. } => {
            (node.clone().unwrap_or_default(), text.clone())
        }
        TimelineKind::Stage {
            stage,
            payload,
            revision,
        } => (format!("{}#{}", stage, revision), payload.to_string()),
        TimelineKind::Subgraph { path, messages } => (
            path.join("/"),
            messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        TimelineKind::Interrupt {
            interrupt_id,
            value,
        } => (interrupt_id.clone().unwrap_or_default(), value.to_string()),
        TimelineKind::Resumed { value } => (String::new(), value.to_string()),
        TimelineKind::Error { message } => (String::new(), message.clone()),
    }
}
