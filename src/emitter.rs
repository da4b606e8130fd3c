//! The designated internal emission path for trace entries.

use std::{collections::HashMap, sync::Arc};

use tracing::Level;

use crate::{
    channel::{global_registry, ChannelRegistry},
    event::TraceEvent,
};

/// Origin tag stamped on every entry produced here. The built-in chain gate
/// only admits entries carrying this tag or no tag at all, which keeps
/// arbitrary application code from writing straight into a channel's file.
pub const ORIGIN: &str = module_path!();

/// Handle for emitting trace entries into one named channel.
///
/// The channel is created on first emission if it does not exist yet.
pub struct TraceEmitter {
    channel: String,
    registry: Arc<ChannelRegistry>,
}

impl TraceEmitter {
    pub fn new(channel: impl Into<String>) -> Self {
        Self::with_registry(channel, global_registry())
    }

    pub fn with_registry(channel: impl Into<String>, registry: Arc<ChannelRegistry>) -> Self {
        Self {
            channel: channel.into(),
            registry,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Emit one formatted trace entry.
    pub fn emit(&self, message: impl Into<String>) {
        self.dispatch(
            TraceEvent::new(Level::INFO, self.channel.as_str(), message.into())
                .with_origin(ORIGIN),
        );
    }

    /// Emit one trace entry with structured fields.
    pub fn emit_with(&self, message: impl Into<String>, fields: HashMap<String, String>) {
        self.dispatch(
            TraceEvent::new(Level::INFO, self.channel.as_str(), message.into())
                .with_origin(ORIGIN)
                .with_fields(fields),
        );
    }

    fn dispatch(&self, event: TraceEvent) {
        self.registry.channel(&self.channel).submit(event);
    }
}
