//! Correlation id minting and attachment.
//!
//! Ids are minted per gateway instance, start at 1 and are never reused.
//! They reset when the process restarts.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

/// Monotonic source of request ids.
#[derive(Debug, Default)]
pub struct RequestCounter {
    last: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next id. The first call returns 1.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// A payload ready to forward with its id attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    pub request_type: String,
    pub payload: Vec<u8>,
}

/// Set `requestId` on a JSON object payload that names a string
/// `requestType`.
///
/// Returns `None` for anything else; such payloads are forwarded unchanged.
pub fn attach_request_id(raw: &[u8], request_id: u64) -> Option<Tagged> {
    let Ok(Value::Object(mut fields)) = serde_json::from_slice::<Value>(raw) else {
        return None;
    };
    let request_type = fields.get("requestType")?.as_str()?.to_string();
    fields.insert("requestId".to_string(), Value::String(request_id.to_string()));

    let payload = serde_json::to_vec(&Value::Object(fields)).ok()?;
    Some(Tagged {
        request_type,
        payload,
    })
}
