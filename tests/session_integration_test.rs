use anyhow::Result;
use condenser_view::domain::model::{SessionPhase, TimelineKind};
use condenser_view::{
    CondenserError, HttpStreamSource, LocalStorage, SessionConfig, StreamSession,
    TranscriptWriter,
};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

const NDJSON: &str = "application/x-ndjson";

fn config_for(server: &MockServer, thread_id: &str) -> SessionConfig {
    SessionConfig {
        base_url: server.base_url(),
        thread_id: thread_id.to_string(),
        ..SessionConfig::default()
    }
}

fn stream_path(thread_id: &str) -> String {
    format!("/api/v1/graphs/default/threads/{}/stream", thread_id)
}

#[tokio::test]
async fn test_end_to_end_run_with_transcript() -> Result<()> {
    let server = MockServer::start();
    let body = [
        r#"{"type":"llm_chunk","id":"m1","node":"summarize","content":"You have "}"#,
        r#"{"type":"llm_chunk","id":"m1","node":"summarize","content":"3 meetings."}"#,
        r#"{"$.load_calendar":{"events":[{"title":"Standup","start":"09:00","end":"09:15"}]}}"#,
        r#"{"$.load_calendar":{"events":[{"title":"Standup","start":"09:00","end":"09:15"}]}}"#,
        r#"{"broken json"#,
        r#"{"type":"subgraph_message","path":["notify"],"message":{"id":"n1","role":"tool","content":"email queued"}}"#,
        r#"{"type":"end"}"#,
    ]
    .join("\n");

    let stream_mock = server.mock(|when, then| {
        when.method(POST)
            .path(stream_path("e2e"))
            .header("accept", NDJSON)
            .json_body(json!({"input": {"week": "2024-06-03"}}));
        then.status(200).header("content-type", NDJSON).body(body);
    });

    let config = config_for(&server, "e2e");
    let source = HttpStreamSource::from_config(&config)?;
    let mut session = StreamSession::new(source, "e2e");

    let phase = session.start(json!({"week": "2024-06-03"})).await?.clone();
    stream_mock.assert();
    assert_eq!(phase, SessionPhase::Completed);

    let view = session.into_view();
    let kinds: Vec<&str> = view.timeline.iter().map(|e| e.kind.name()).collect();
    assert_eq!(kinds, vec!["message", "stage", "subgraph"]);
    match &view.timeline[0].kind {
        TimelineKind::Message { text, .. } => assert_eq!(text, "You have 3 meetings."),
        other => panic!("unexpected entry {:?}", other),
    }
    assert_eq!(view.stats.records_skipped, 1);
    assert_eq!(view.stats.duplicates_dropped, 1);

    let temp_dir = TempDir::new()?;
    let output_dir = temp_dir.path().to_string_lossy().to_string();
    let writer = TranscriptWriter::new(LocalStorage::new(output_dir));
    let files = writer.write(&view).await?;

    let csv = tokio::fs::read_to_string(temp_dir.path().join(&files.csv)).await?;
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("subgraph,notify,email queued"));

    let restored = writer.read_view("e2e").await?;
    assert_eq!(restored.timeline, view.timeline);
    Ok(())
}

#[tokio::test]
async fn test_interrupt_and_resume_over_http() {
    let server = MockServer::start();

    let start_mock = server.mock(|when, then| {
        when.method(POST)
            .path(stream_path("hitl"))
            .json_body(json!({"input": {}}));
        then.status(200).body(concat!(
            "{\"$.proposal\":{\"move\":\"1:1 to Thursday\"}}\n",
            "{\"__interrupt__\":[{\"value\":{\"question\":\"Send the reschedule email?\"},\"resumable\":true}]}\n"
        ));
    });
    let resume_mock = server.mock(|when, then| {
        when.method(POST)
            .path(stream_path("hitl"))
            .json_body(json!({"command": {"resume": {"approved": true}}}));
        then.status(200).body(concat!(
            "{\"type\":\"llm_chunk\",\"content\":\"Email sent.\"}\n",
            "{\"$.proposal\":{\"move\":\"1:1 to Thursday\",\"status\":\"sent\"}}\n",
        ));
    });

    let config = config_for(&server, "hitl");
    let mut session = StreamSession::new(HttpStreamSource::from_config(&config).unwrap(), "hitl");

    match session.start(json!({})).await.unwrap() {
        SessionPhase::Paused { interrupt } => {
            assert_eq!(interrupt.value["question"], "Send the reschedule email?");
        }
        other => panic!("expected pause, got {:?}", other),
    }
    start_mock.assert();

    let phase = session.resume(json!({"approved": true})).await.unwrap();
    assert_eq!(phase, &SessionPhase::Completed);
    resume_mock.assert();

    let view = session.view();
    let kinds: Vec<&str> = view.timeline.iter().map(|e| e.kind.name()).collect();
    assert_eq!(kinds, vec!["stage", "interrupt", "resumed", "message", "stage"]);
    assert_eq!(view.stage("proposal").unwrap().payload["status"], "sent");
}

#[tokio::test]
async fn test_resume_existing_thread() {
    let server = MockServer::start();
    let resume_mock = server.mock(|when, then| {
        when.method(POST)
            .path(stream_path("earlier"))
            .json_body(json!({"command": {"resume": "yes"}}));
        then.status(200).body("{\"type\":\"done\"}\n");
    });

    let config = config_for(&server, "earlier");
    let mut session =
        StreamSession::new(HttpStreamSource::from_config(&config).unwrap(), "earlier");

    let phase = session.resume_existing(json!("yes")).await.unwrap();
    assert_eq!(phase, &SessionPhase::Completed);
    resume_mock.assert();
}

#[tokio::test]
async fn test_backend_error_status_resets_view() {
    let server = MockServer::start();
    let stream_mock = server.mock(|when, then| {
        when.method(POST).path(stream_path("broken"));
        then.status(503).body("graph unavailable");
    });

    let config = config_for(&server, "broken");
    let mut session =
        StreamSession::new(HttpStreamSource::from_config(&config).unwrap(), "broken");

    let err = session.start(json!({})).await.unwrap_err();
    stream_mock.assert();
    match err {
        CondenserError::BackendStatusError { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "graph unavailable");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(session.phase(), &SessionPhase::NotStarted);
    assert!(session.view().timeline.is_empty());
}

#[tokio::test]
async fn test_connection_refused_resets_view() {
    let config = SessionConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        thread_id: "offline".to_string(),
        timeout_seconds: 2,
        ..SessionConfig::default()
    };
    let mut session =
        StreamSession::new(HttpStreamSource::from_config(&config).unwrap(), "offline");

    let err = session.start(json!({})).await.unwrap_err();
    assert!(matches!(err, CondenserError::HttpError(_)));
    assert_eq!(session.phase(), &SessionPhase::NotStarted);
}

#[tokio::test]
async fn test_auth_and_custom_headers_sent() {
    let server = MockServer::start();
    let stream_mock = server.mock(|when, then| {
        when.method(POST)
            .path(stream_path("secure"))
            .header("authorization", "Bearer tok-123")
            .header("x-tenant", "acme");
        then.status(200).body("{\"type\":\"end\"}\n");
    });

    let config = SessionConfig {
        api_token: Some("tok-123".to_string()),
        headers: vec![("X-Tenant".to_string(), "acme".to_string())],
        ..config_for(&server, "secure")
    };
    let mut session =
        StreamSession::new(HttpStreamSource::from_config(&config).unwrap(), "secure");

    session.start(json!({})).await.unwrap();
    stream_mock.assert();
}

#[test]
fn test_invalid_header_rejected() {
    let config = SessionConfig {
        headers: vec![("bad header".to_string(), "x".to_string())],
        ..SessionConfig::default()
    };
    assert!(matches!(
        HttpStreamSource::from_config(&config),
        Err(CondenserError::InvalidConfigValueError { .. })
    ));
}
