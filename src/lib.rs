//! Named, file-backed trace channels with dynamic reconfiguration.
//!
//! Trace entries are routed to named channels held in a registry. Each
//! channel fans entries out on a broadcast stream and, once provisioned,
//! writes them through a filter chain into a rolling file sink:
//!
//! - Live subscription to a channel's entries (e.g. for streaming)
//! - Per-channel rolling log files with history and size-cap pruning
//! - A built-in origin gate so only the internal emitter reaches disk
//! - Push-based re-provisioning from a remote configuration feed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      tracing Subscriber                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐                             │
//! │  │ Console Layer│  │ ChannelLayer │                             │
//! │  │ (diagnostics)│  │ (per-channel)│                             │
//! │  └──────────────┘  └──────┬───────┘                             │
//! └────────────────────────── │ ────────────────────────────────────┘
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ChannelRegistry: name -> Channel (broadcast + sink binding)    │
//! └────────────────────────── │ ────────────────────────────────────┘
//!                             ▼
//!          origin gate -> custom filter rules -> RollingSink
//! ```
//!
//! `TraceEmitter` is the designated internal emission path; it stamps its
//! origin on each entry and dispatches straight into the registry. Events
//! arriving through `ChannelLayer` carry their call site's target as origin
//! and are denied at the disk gate, so arbitrary application logging can be
//! observed on a channel's stream but never lands in its file.
//!
//! # Usage
//!
//! ## Initialization (in main or runtime setup)
//!
//! ```ignore
//! tracespool::init();
//! ```
//!
//! ## Provisioning a channel
//!
//! ```ignore
//! use tracespool::{global_registry, ChannelSpec};
//!
//! let spec = ChannelSpec::new("invoke-trace", "./logs/invoke-trace.log")
//!     .with_max_history(7)
//!     .with_size_cap_kb(512 * 1024);
//! let channel = global_registry().provision(&spec)?;
//! ```
//!
//! ## Emitting
//!
//! ```ignore
//! use tracespool::TraceEmitter;
//!
//! let emitter = TraceEmitter::new("invoke-trace");
//! emitter.emit("rpc=UserService.get cost=3ms");
//! ```
//!
//! ## Re-provisioning from a config feed
//!
//! ```ignore
//! use tracespool::{config, global_registry, ChannelSpec};
//!
//! config::listen(&feed, |configs: HashMap<String, String>| {
//!     let spec = spec_from(&configs)?;
//!     global_registry().provision(&spec)?;
//!     Ok(())
//! });
//! ```

pub mod channel;
pub mod config;
pub mod emitter;
pub mod error;
pub mod event;
pub mod filter;
pub mod layer;
pub mod rolling;
pub mod script;

pub use channel::{global_registry, Channel, ChannelRegistry, ChannelSpec};
pub use config::{ConfigCallback, ConfigFeed, ConfigHandler, FeedIdentity};
pub use emitter::TraceEmitter;
pub use error::SpoolError;
pub use event::TraceEvent;
pub use filter::{FilterChain, FilterRule, Verdict};
pub use layer::ChannelLayer;
pub use rolling::RollingSink;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system with default configuration.
///
/// This sets up:
/// - A console layer for diagnostics (filtered by RUST_LOG env var)
/// - The ChannelLayer routing channel-addressed events into the global
///   registry
///
/// Call this once at application startup.
pub fn init() {
    init_with_registry(global_registry());
}

/// Initialize the logging system with a custom registry.
pub fn init_with_registry(registry: Arc<ChannelRegistry>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(ChannelLayer::new(registry))
        .init();
}
