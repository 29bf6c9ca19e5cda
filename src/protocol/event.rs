use serde_json::{json, Map, Value};

const MISSING_REQUEST_ID: &str = "0";
const MISSING_REQUEST_TYPE: &str = "REQUEST_TYPE_MISSING";
const MISSING_MESSAGE: &str = "MESSAGE_MISSING";

/// An audit event published to the log aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// Tied to one request by its correlation id.
    Correlated {
        request_id: String,
        request_type: String,
        message: String,
    },
    Plain(String),
}

impl LogEvent {
    pub fn correlated(
        request_id: impl Into<String>,
        request_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LogEvent::Correlated {
            request_id: request_id.into(),
            request_type: request_type.into(),
            message: message.into(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        LogEvent::Plain(text.into())
    }

    /// Payload carried after the topic on the fan-out channel.
    pub fn to_payload(&self) -> String {
        match self {
            LogEvent::Correlated {
                request_id,
                request_type,
                message,
            } => json!({
                "requestId": request_id,
                "requestType": request_type,
                "message": message,
            })
            .to_string(),
            LogEvent::Plain(text) => text.clone(),
        }
    }

    /// Interpret a received payload. JSON objects are correlated events with
    /// missing fields defaulted; anything else is plain text.
    pub fn parse(payload: &str) -> Self {
        match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(fields)) => LogEvent::Correlated {
                request_id: field_text(&fields, "requestId", MISSING_REQUEST_ID),
                request_type: field_text(&fields, "requestType", MISSING_REQUEST_TYPE),
                message: field_text(&fields, "message", MISSING_MESSAGE),
            },
            _ => LogEvent::Plain(payload.to_string()),
        }
    }
}

fn field_text(fields: &Map<String, Value>, name: &str, missing: &str) -> String {
    match fields.get(name) {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => missing.to_string(),
    }
}
