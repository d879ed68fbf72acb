use crate::core::classifier::{classify, parse_line};
use crate::core::ndjson::LineDecoder;
use crate::core::reducer::ViewReducer;
use crate::domain::model::{SessionPhase, ViewState};
use crate::domain::ports::{SessionObserver, StreamSource};
use crate::utils::error::Result;
use futures::StreamExt;
use serde_json::json;

/// One conversation thread with the condenser backend.
///
/// Each call to [`start`](Self::start) or [`resume`](Self::resume) opens a
/// single streaming POST and reads it until the body ends. Records keep
/// folding into the same [`ViewReducer`], so a resumed run continues the
/// timeline left by the paused one.
pub struct StreamSession<S: StreamSource> {
    source: S,
    reducer: ViewReducer,
    observer: Option<Box<dyn SessionObserver>>,
}

impl<S: StreamSource> StreamSession<S> {
    pub fn new(source: S, thread_id: impl Into<String>) -> Self {
        Self {
            source,
            reducer: ViewReducer::new(thread_id),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn view(&self) -> &ViewState {
        self.reducer.state()
    }

    pub fn phase(&self) -> &SessionPhase {
        self.reducer.phase()
    }

    pub fn into_view(self) -> ViewState {
        self.reducer.into_state()
    }

    pub async fn start(&mut self, input: serde_json::Value) -> Result<&SessionPhase> {
        self.reducer.begin()?;
        tracing::info!("🚀 Starting run on thread {}", self.view().thread_id);
        self.run(json!({ "input": input })).await
    }

    pub async fn resume(&mut self, value: serde_json::Value) -> Result<&SessionPhase> {
        self.reducer.resume(value.clone())?;
        tracing::info!("▶️  Resuming thread {}", self.view().thread_id);
        self.run(json!({ "command": { "resume": value } })).await
    }

    /// Resume a thread paused by an earlier process.
    pub async fn resume_existing(&mut self, value: serde_json::Value) -> Result<&SessionPhase> {
        self.reducer.attach_paused()?;
        self.resume(value).await
    }

    async fn run(&mut self, body: serde_json::Value) -> Result<&SessionPhase> {
        match self.read_stream(body).await {
            Ok(()) => {
                self.reducer.finish();
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_stream_end(self.reducer.state());
                }
                let stats = &self.reducer.state().stats;
                tracing::info!(
                    "✅ Stream ended ({}): {} records, {} skipped, {} duplicates",
                    self.reducer.phase(),
                    stats.records_seen,
                    stats.records_skipped,
                    stats.duplicates_dropped
                );
                Ok(self.reducer.phase())
            }
            Err(e) => {
                tracing::error!("❌ Stream failed, resetting view: {}", e);
                self.reducer.reset();
                Err(e)
            }
        }
    }

    async fn read_stream(&mut self, body: serde_json::Value) -> Result<()> {
        let mut chunks = self.source.open(body).await?;
        let mut decoder = LineDecoder::new();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            for line in decoder.push(&chunk) {
                self.handle_line(&line);
            }
        }

        if decoder.pending_bytes() > 0 {
            tracing::debug!(
                "Body ended without a trailing newline, flushing {} bytes",
                decoder.pending_bytes()
            );
        }
        if let Some(line) = decoder.finish() {
            self.handle_line(&line);
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) {
        let value = match parse_line(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Skipping malformed line ({}): {}", e, truncate(line, 120));
                self.reducer.record_skipped();
                return;
            }
        };

        for record in classify(value) {
            tracing::debug!("Record: {}", record.kind());
            let observed = self.observer.is_some().then(|| record.clone());
            self.reducer.apply(record);
            if let (Some(observer), Some(record)) = (self.observer.as_mut(), observed) {
                observer.on_record(&record, self.reducer.state());
            }
        }
    }
}

fn truncate(line: &str, max_chars: usize) -> String {
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &line[..idx]),
        None => line.to_string(),
    }
}
