//! `Event`: an ordered `key=value` field list rendered to the format in
//! spec.md §6: `time=<RFC3339> event=<name> <k=v>...` with values
//! double-quoted iff they contain whitespace or `=`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single structured event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Event name, e.g. `policy.update`, `http.request`.
    pub name: String,
    /// Ordered `key=value` fields.
    pub fields: Vec<(String, String)>,
}

impl Event {
    /// Start building a new event with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { timestamp: Utc::now(), name: name.into(), fields: Vec::new() }
    }

    /// Append a field, builder-style.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Append a field only when `value` is `Some`.
    #[must_use]
    pub fn maybe_field(self, key: impl Into<String>, value: Option<impl std::fmt::Display>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// Render this event as a single append-only log line, per spec.md §6.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = format!("time={} event={}", self.timestamp.to_rfc3339(), quote_if_needed(&self.name));
        for (key, value) in &self.fields {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(&quote_if_needed(value));
        }
        line
    }
}

fn quote_if_needed(value: &str) -> String {
    if value.chars().any(char::is_whitespace) || value.contains('=') {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_values_with_whitespace_or_equals() {
        let event = Event::new("http.request").field("addr", "host:port=8080").field("method", "GET");
        let line = event.to_line();
        assert!(line.contains("addr=\"host:port=8080\""));
        assert!(line.contains("method=GET"));
    }

    #[test]
    fn maybe_field_omits_none() {
        let event = Event::new("test").maybe_field("present", Some("x")).maybe_field("absent", None::<String>);
        assert_eq!(event.fields.len(), 1);
        assert_eq!(event.fields[0].0, "present");
    }
}
