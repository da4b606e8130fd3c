//! Tracing layer that routes channel-addressed events into the registry.

use std::{collections::HashMap, fmt, sync::Arc};

use tracing::{
    field::{Field, Visit},
    span, Event, Subscriber,
};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

use crate::{channel::ChannelRegistry, event::TraceEvent};

/// Event or span field naming the destination channel.
const CHANNEL_FIELD: &str = "channel";

/// Layer that intercepts tracing events carrying a `channel` field (on the
/// event itself or on an enclosing span) and dispatches them into the
/// channel registry. The event's target is stamped on the entry as its
/// origin, so the filter chain can tell these call sites apart from the
/// internal emitter.
///
/// Constructing the layer marks the registry as attached, which is what
/// lets provisioning bind rolling sinks.
pub struct ChannelLayer {
    registry: Arc<ChannelRegistry>,
}

impl ChannelLayer {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        registry.mark_attached();
        Self { registry }
    }
}

/// Visitor that extracts the message, channel, and fields from an event.
struct EventVisitor {
    message: String,
    channel: Option<String>,
    fields: HashMap<String, String>,
}

impl EventVisitor {
    fn new() -> Self {
        Self {
            message: String::new(),
            channel: None,
            fields: HashMap::new(),
        }
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            CHANNEL_FIELD => self.channel = Some(format!("{:?}", value)),
            name => {
                self.fields.insert(name.to_string(), format!("{:?}", value));
            }
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            CHANNEL_FIELD => self.channel = Some(value.to_string()),
            name => {
                self.fields.insert(name.to_string(), value.to_string());
            }
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), value.to_string());
    }
}

/// Channel identity extracted from a span's fields.
#[derive(Clone, Default)]
struct ChannelContext {
    channel: Option<String>,
}

struct SpanVisitor {
    context: ChannelContext,
}

impl SpanVisitor {
    fn new() -> Self {
        Self {
            context: ChannelContext::default(),
        }
    }
}

impl Visit for SpanVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == CHANNEL_FIELD {
            self.context.channel = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == CHANNEL_FIELD {
            self.context.channel = Some(format!("{:?}", value));
        }
    }
}

impl<S> Layer<S> for ChannelLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let mut visitor = SpanVisitor::new();
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.context);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::new();
        event.record(&mut visitor);

        // Prefer a channel named on the event itself, then the innermost
        // enclosing span that carries one.
        let mut channel = visitor.channel.take();
        if channel.is_none() {
            if let Some(scope) = ctx.event_scope(event) {
                for span in scope {
                    if let Some(stored) = span.extensions().get::<ChannelContext>() {
                        if let Some(name) = &stored.channel {
                            channel = Some(name.clone());
                            break;
                        }
                    }
                }
            }
        }

        let Some(channel) = channel else {
            return;
        };

        let entry = TraceEvent::new(*event.metadata().level(), channel, visitor.message)
            .with_origin(event.metadata().target())
            .with_fields(visitor.fields);

        self.registry.dispatch(entry);
    }
}
