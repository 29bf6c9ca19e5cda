//! In-band control commands.
//!
//! Commands are matched exactly. A payload that only contains a command
//! somewhere inside it is ordinary data.

use serde_json::Value;

/// Stops the log aggregator.
pub const TERMINATE_LOGGER: &str = "TERMINATE_LOGGER";

/// Rotates the log aggregator's file.
pub const ARCHIVE_LOG_FILE: &str = "ARCHIVE_LOG_FILE";

/// Reserved top-level request field for structured control.
pub const CONTROL_FIELD: &str = "control";

/// Value of [`CONTROL_FIELD`] that terminates a worker.
pub const CONTROL_TERMINATE: &str = "terminate";

/// Lifecycle command understood by the log aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerCommand {
    Archive,
    Terminate,
}

impl LoggerCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggerCommand::Archive => ARCHIVE_LOG_FILE,
            LoggerCommand::Terminate => TERMINATE_LOGGER,
        }
    }

    /// Match a topic-stripped payload against the command vocabulary.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            ARCHIVE_LOG_FILE => Some(LoggerCommand::Archive),
            TERMINATE_LOGGER => Some(LoggerCommand::Terminate),
            _ => None,
        }
    }
}

/// Upper snake case form of a service display name.
///
/// `HelloService` becomes `HELLO_SERVICE`, `HTTPGateway` becomes
/// `HTTP_GATEWAY`. Non-alphanumeric characters become underscores.
pub fn control_name(service_name: &str) -> String {
    let chars: Vec<char> = service_name.chars().collect();
    let mut name = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !name.is_empty() && !name.ends_with('_') {
                name.push('_');
            }
            continue;
        }

        if c.is_uppercase() && i > 0 && !name.ends_with('_') {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                name.push('_');
            }
        }
        name.extend(c.to_uppercase());
    }

    name.trim_end_matches('_').to_string()
}

/// The `TERMINATE_<NAME>` command for a service.
pub fn terminate_command(service_name: &str) -> String {
    format!("TERMINATE_{}", control_name(service_name))
}

/// Whether a raw worker payload is a terminate command.
///
/// Either the trimmed payload equals `command`, or it is a JSON object whose
/// reserved `control` field is `"terminate"`.
pub fn is_terminate(raw: &[u8], command: &str) -> bool {
    let Ok(text) = std::str::from_utf8(raw) else {
        return false;
    };
    if text.trim() == command {
        return true;
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(fields)) => {
            fields.get(CONTROL_FIELD).and_then(Value::as_str) == Some(CONTROL_TERMINATE)
        }
        _ => false,
    }
}
