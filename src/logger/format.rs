//! Log line layout.

use std::borrow::Cow;

use chrono::{DateTime, Local};

use crate::protocol::LogEvent;

/// Fixed-width, lexically sortable line timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Filesystem-safe timestamp used in archive names.
pub const ARCHIVE_STAMP_FORMAT: &str = "%Y-%m-%dT%H.%M.%S%.3f";

pub fn timestamp(now: &DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// `<ts>:<requestId>:<requestType>:<message>` or `<ts>:<text>`.
///
/// Line breaks inside fields are escaped, so every line starts with a
/// timestamp.
pub fn format_line(now: &DateTime<Local>, event: &LogEvent) -> String {
    let ts = timestamp(now);
    match event {
        LogEvent::Correlated {
            request_id,
            request_type,
            message,
        } => format!(
            "{}:{}:{}:{}",
            ts,
            single_line(request_id),
            single_line(request_type),
            single_line(message)
        ),
        LogEvent::Plain(text) => format!("{}:{}", ts, single_line(text)),
    }
}

fn single_line(field: &str) -> Cow<'_, str> {
    if !field.contains(['\n', '\r']) {
        return Cow::Borrowed(field);
    }
    Cow::Owned(field.replace('\r', "\\r").replace('\n', "\\n"))
}
