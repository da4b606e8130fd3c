//! Trace event structure routed through channels.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::Level;

/// A single trace entry bound for a named channel.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity (ERROR, WARN, INFO, DEBUG, TRACE).
    pub level: Level,
    /// Name of the channel this entry is addressed to.
    pub channel: String,
    /// Identity of the emission call site. The internal emitter stamps its
    /// own module path here; entries routed in from the tracing layer carry
    /// the call site's target. `None` means the origin is unknown.
    pub origin: Option<String>,
    /// The entry message.
    pub message: String,
    /// Additional structured fields attached at emission.
    pub fields: HashMap<String, String>,
}

impl TraceEvent {
    pub fn new(level: Level, channel: impl Into<String>, message: String) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            channel: channel.into(),
            origin: None,
            message,
            fields: HashMap::new(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_fields(mut self, fields: HashMap<String, String>) -> Self {
        self.fields = fields;
        self
    }

    /// Render the fully formatted message text: the message itself, plus any
    /// fields as a sorted `{k=v, ...}` suffix. This is the form custom filter
    /// rules and the sink encoder see.
    pub fn formatted(&self) -> String {
        if self.fields.is_empty() {
            return self.message.clone();
        }

        let mut fields: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        fields.sort();

        format!("{} {{{}}}", self.message, fields.join(", "))
    }
}
