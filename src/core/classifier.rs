//! Shape-based classification of stream records.
//!
//! The backend mixes records with a `type` tag, `$.<stage>` keyed snapshots
//! and `__interrupt__` envelopes on the same stream, so classification looks
//! at the shape of each object rather than one discriminator.

use crate::domain::model::{InterruptRequest, StreamRecord, SubgraphMessage};
use crate::utils::error::Result;
use serde_json::{Map, Value};

const STAGE_PREFIX: &str = "$.";
const INTERRUPT_KEY: &str = "__interrupt__";

pub fn parse_line(line: &str) -> Result<Value> {
    Ok(serde_json::from_str(line)?)
}

pub fn classify(value: Value) -> Vec<StreamRecord> {
    let obj = match value {
        Value::Object(obj) => obj,
        other => return vec![StreamRecord::Unknown(other)],
    };

    if let Some(kind) = obj.get("type").and_then(Value::as_str) {
        if let Some(record) = classify_typed(kind, &obj) {
            return vec![record];
        }
    }

    if let Some(raw) = obj.get(INTERRUPT_KEY) {
        return classify_interrupts(raw);
    }

    let stages: Vec<StreamRecord> = obj
        .iter()
        .filter_map(|(key, payload)| {
            let stage = key.strip_prefix(STAGE_PREFIX)?;
            if stage.is_empty() {
                return None;
            }
            Some(StreamRecord::StateUpdate {
                stage: stage.to_string(),
                payload: payload.clone(),
            })
        })
        .collect();
    if !stages.is_empty() {
        return stages;
    }

    vec![StreamRecord::Unknown(Value::Object(obj))]
}

fn classify_typed(kind: &str, obj: &Map<String, Value>) -> Option<StreamRecord> {
    let record = match kind {
        "llm_chunk" | "token" | "message_chunk" => StreamRecord::LlmChunk {
            message_id: string_field(obj, &["id", "message_id", "run_id"]),
            node: string_field(obj, &["node", "langgraph_node"]),
            text: text_field(obj, &["content", "text", "chunk"]),
        },
        "interrupt" => {
            let mut records = classify_interrupts(&Value::Object(obj.clone()));
            return records.pop();
        }
        "subgraph_message" | "subgraph" => {
            let message = obj.get("message").unwrap_or(&Value::Null);
            StreamRecord::SubgraphMessage {
                path: path_field(obj.get("path").or_else(|| obj.get("namespace"))),
                message: subgraph_message(message, obj),
            }
        }
        "error" => StreamRecord::Error {
            message: string_field(obj, &["message", "error", "detail"])
                .unwrap_or_else(|| "unknown backend error".to_string()),
        },
        "end" | "done" | "complete" => StreamRecord::End,
        other => {
            tracing::debug!("Unrecognised record type '{}'", other);
            return None;
        }
    };
    Some(record)
}

fn classify_interrupts(raw: &Value) -> Vec<StreamRecord> {
    let items: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    items
        .into_iter()
        .map(|item| {
            let request = match item {
                Value::Object(fields) => InterruptRequest {
                    id: string_field(fields, &["id", "interrupt_id"]),
                    value: fields.get("value").cloned().unwrap_or(Value::Null),
                    resumable: fields
                        .get("resumable")
                        .and_then(Value::as_bool)
                        .unwrap_or(true),
                },
                other => InterruptRequest {
                    id: None,
                    value: other.clone(),
                    resumable: true,
                },
            };
            StreamRecord::Interrupt(request)
        })
        .collect()
}

fn subgraph_message(message: &Value, envelope: &Map<String, Value>) -> SubgraphMessage {
    match message {
        Value::Object(fields) => SubgraphMessage {
            id: string_field(fields, &["id"]),
            role: string_field(fields, &["role", "type", "name"]),
            content: text_field(fields, &["content", "text"]),
        },
        Value::String(text) => SubgraphMessage {
            id: string_field(envelope, &["id", "message_id"]),
            role: string_field(envelope, &["role"]),
            content: text.clone(),
        },
        _ => SubgraphMessage {
            id: string_field(envelope, &["id", "message_id"]),
            role: string_field(envelope, &["role"]),
            content: text_field(envelope, &["content", "text"]),
        },
    }
}

fn path_field(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.as_str().map(str::to_string))
            .collect(),
        // "outer|inner" 和 "outer/inner" 兩種寫法都看過
        Some(Value::String(joined)) => joined
            .split(['|', '/'])
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Content may be a plain string or a list of `{"type":"text","text":..}` parts.
fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match obj.get(*key)? {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => Some(
                parts
                    .iter()
                    .filter_map(|part| match part {
                        Value::String(s) => Some(s.as_str()),
                        Value::Object(p) => p.get("text").and_then(Value::as_str),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .unwrap_or_default()
}
