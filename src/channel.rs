//! Channel registry and provisioning of rolling sinks onto named channels.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

use tokio::sync::broadcast;
use tracing::{error, warn, Level};

use crate::{
    error::SpoolError,
    event::TraceEvent,
    filter::{FilterChain, FilterRule, Verdict},
    rolling::{RollingSink, BYTES_PER_KB},
    script,
};

/// Default capacity for per-channel broadcast streams.
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Charset labels the sink encoder accepts. Entries are UTF-8 in memory, so
/// only the UTF-8 family (of which ASCII is a subset) can be honoured.
const SUPPORTED_CHARSETS: [&str; 4] = ["utf-8", "utf8", "us-ascii", "ascii"];

/// Everything needed to materialize one channel's rolling sink.
///
/// `name` doubles as the lookup key into the registry. Filters are evaluated
/// in insertion order, after the built-in origin gate.
#[derive(Clone)]
pub struct ChannelSpec {
    pub name: String,
    pub file_path: PathBuf,
    pub charset: String,
    pub max_history: usize,
    /// Total size allowed for rotated segments, in kilobytes. 0 = uncapped.
    pub total_size_cap_kb: u64,
    pub filters: Vec<Arc<dyn FilterRule>>,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file_path: file_path.into(),
            charset: "UTF-8".to_string(),
            max_history: 7,
            total_size_cap_kb: 0,
            filters: Vec::new(),
        }
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_size_cap_kb(mut self, total_size_cap_kb: u64) -> Self {
        self.total_size_cap_kb = total_size_cap_kb;
        self
    }

    pub fn with_filter(mut self, rule: Arc<dyn FilterRule>) -> Self {
        self.filters.push(rule);
        self
    }
}

pub(crate) struct SinkBinding {
    chain: FilterChain,
    sink: Arc<RollingSink>,
}

impl SinkBinding {
    pub(crate) fn new(chain: FilterChain, sink: Arc<RollingSink>) -> Self {
        Self { chain, sink }
    }
}

/// A named destination for trace entries.
///
/// Every channel fans entries out on its broadcast stream; a provisioned
/// channel additionally carries one rolling sink, guarded by the filter
/// chain. Sink attachment is a single-writer resource: provisioning takes
/// the write lock for the detach/attach swap while concurrent writes hold
/// the read lock.
pub struct Channel {
    name: String,
    tx: broadcast::Sender<TraceEvent>,
    aggregate: broadcast::Sender<TraceEvent>,
    /// Whether entries are mirrored onto the registry-wide aggregate
    /// stream. Provisioning turns this off so entries are not duplicated.
    additive: AtomicBool,
    threshold: RwLock<Level>,
    sink: RwLock<Option<SinkBinding>>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("additive", &self.is_additive())
            .field("threshold", &self.threshold())
            .field("has_sink", &self.has_sink())
            .finish()
    }
}

impl Channel {
    fn new(name: String, capacity: usize, aggregate: broadcast::Sender<TraceEvent>) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            name,
            tx,
            aggregate,
            additive: AtomicBool::new(true),
            threshold: RwLock::new(Level::INFO),
            sink: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe to this channel's live entry stream.
    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.tx.subscribe()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.read().unwrap().is_some()
    }

    pub fn is_additive(&self) -> bool {
        self.additive.load(Ordering::Relaxed)
    }

    pub fn set_additive(&self, additive: bool) {
        self.additive.store(additive, Ordering::Relaxed);
    }

    pub fn threshold(&self) -> Level {
        *self.threshold.read().unwrap()
    }

    pub fn set_threshold(&self, threshold: Level) {
        *self.threshold.write().unwrap() = threshold;
    }

    /// Submit one entry. Entries more verbose than the threshold are
    /// dropped; everything else reaches the broadcast subscribers, and
    /// entries the filter chain accepts also reach the sink. Sink write
    /// failures are reported on the default logging facade and never
    /// propagate to the caller.
    pub fn submit(&self, event: TraceEvent) {
        if event.level > self.threshold() {
            return;
        }

        if self.is_additive() {
            let _ = self.aggregate.send(event.clone());
        }
        let _ = self.tx.send(event.clone());

        let guard = self.sink.read().unwrap();
        if let Some(binding) = guard.as_ref() {
            if binding.chain.decide(&event) == Verdict::Accept {
                if let Err(err) = binding.sink.write(&event.formatted()) {
                    error!(
                        channel = %self.name,
                        error = %err,
                        "failed to write trace entry to rolling sink"
                    );
                }
            }
        }
    }

    /// Detach any previous sink (flushing it) and attach the new one.
    fn attach(&self, binding: SinkBinding) {
        let mut guard = self.sink.write().unwrap();
        if let Some(old) = guard.take() {
            let _ = old.sink.flush();
        }
        *guard = Some(binding);
    }
}

/// Registry of named channels.
///
/// Channels are created on first use and live for the life of the registry.
/// The aggregate stream receives entries from every channel that still has
/// its additive flag set.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    aggregate: broadcast::Sender<TraceEvent>,
    /// Set when a `ChannelLayer` is constructed over this registry, which
    /// is what makes rolling sinks reachable from emission call sites.
    attached: AtomicBool,
    channel_capacity: usize,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (aggregate, _rx) = broadcast::channel(capacity);
        Self {
            channels: RwLock::new(HashMap::new()),
            aggregate,
            attached: AtomicBool::new(false),
            channel_capacity: capacity,
        }
    }

    /// Get or create the channel with the given name.
    pub fn channel(&self, name: &str) -> Arc<Channel> {
        {
            let channels = self.channels.read().unwrap();
            if let Some(channel) = channels.get(name) {
                return channel.clone();
            }
        }

        let mut channels = self.channels.write().unwrap();
        if let Some(channel) = channels.get(name) {
            return channel.clone();
        }

        let channel = Arc::new(Channel::new(
            name.to_string(),
            self.channel_capacity,
            self.aggregate.clone(),
        ));
        channels.insert(name.to_string(), channel.clone());
        channel
    }

    /// Look up an existing channel without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        let channels = self.channels.read().unwrap();
        channels.get(name).cloned()
    }

    /// Route an entry to the channel it names. Returns false when no such
    /// channel exists.
    pub fn dispatch(&self, event: TraceEvent) -> bool {
        let channel = {
            let channels = self.channels.read().unwrap();
            channels.get(&event.channel).cloned()
        };

        match channel {
            Some(channel) => {
                channel.submit(event);
                true
            }
            None => false,
        }
    }

    /// Subscribe to one channel's stream. Returns None if the channel does
    /// not exist yet.
    pub fn subscribe(&self, name: &str) -> Option<broadcast::Receiver<TraceEvent>> {
        self.get(name).map(|channel| channel.subscribe())
    }

    /// Subscribe to the registry-wide aggregate stream.
    pub fn subscribe_all(&self) -> broadcast::Receiver<TraceEvent> {
        self.aggregate.subscribe()
    }

    pub fn channel_names(&self) -> Vec<String> {
        let channels = self.channels.read().unwrap();
        channels.keys().cloned().collect()
    }

    pub(crate) fn mark_attached(&self) {
        self.attached.store(true, Ordering::Relaxed);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Relaxed)
    }

    /// Materialize `spec` into a live, write-ready channel.
    ///
    /// The spec is validated before any side effect; a bad spec leaves the
    /// registry untouched. When no layer fronts this registry the channel
    /// is returned unmodified, still usable through its broadcast stream,
    /// and a single warning is emitted. Otherwise the rolling sink is
    /// built, the filter chain wired in front of it, the previous sink
    /// detached, and the new sink registered for script execution under
    /// the channel name.
    pub fn provision(&self, spec: &ChannelSpec) -> Result<Arc<Channel>, SpoolError> {
        if spec.name.is_empty() {
            return Err(SpoolError::InvalidSpec(
                "channel name can't be empty".to_string(),
            ));
        }
        if spec.file_path.as_os_str().is_empty() {
            return Err(SpoolError::InvalidSpec(
                "channel file path can't be empty".to_string(),
            ));
        }
        let charset = spec.charset.to_ascii_lowercase();
        if !SUPPORTED_CHARSETS.contains(&charset.as_str()) {
            return Err(SpoolError::InvalidSpec(format!(
                "unsupported charset '{}'",
                spec.charset
            )));
        }

        let channel = self.channel(&spec.name);

        if !self.is_attached() {
            warn!(
                process = %process_name(),
                channel = %spec.name,
                "no channel layer is installed in this process, leaving the \
                 channel on its broadcast backend"
            );
            return Ok(channel);
        }

        let sink = Arc::new(RollingSink::open(
            &spec.file_path,
            spec.charset.as_str(),
            spec.max_history,
            spec.total_size_cap_kb * BYTES_PER_KB,
        )?);

        let chain = FilterChain::new(spec.filters.clone());
        channel.attach(SinkBinding::new(chain, sink.clone()));
        channel.set_additive(false);
        channel.set_threshold(Level::TRACE);

        script::register(&spec.name, sink);

        Ok(channel)
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global channel registry instance, used by the emitter and the layer
/// when no explicit registry is supplied.
static GLOBAL_REGISTRY: once_cell::sync::Lazy<Arc<ChannelRegistry>> =
    once_cell::sync::Lazy::new(|| Arc::new(ChannelRegistry::new()));

/// Get the global channel registry.
pub fn global_registry() -> Arc<ChannelRegistry> {
    GLOBAL_REGISTRY.clone()
}

/// Best-effort identity of the running process for diagnostics.
fn process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
