//! Push-based configuration listening for channel re-provisioning.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::error::SpoolError;

/// Subscription identity on the remote feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedIdentity {
    pub group: String,
    pub key: String,
}

impl FeedIdentity {
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
        }
    }
}

impl Default for FeedIdentity {
    fn default() -> Self {
        Self::new("config", "properties")
    }
}

/// Callback registered on the feed. The feed invokes it on its own delivery
/// thread with the raw payload; decode failures come back through the
/// result.
pub type ConfigCallback = Box<dyn Fn(&str) -> Result<(), SpoolError> + Send + Sync>;

/// An injected push-configuration transport. The crate never manages the
/// transport itself, it only registers callbacks on it.
pub trait ConfigFeed {
    fn subscribe(&self, identity: FeedIdentity, callback: ConfigCallback);
}

/// Receives decoded configuration updates. Implementations are expected to
/// translate the map into a channel spec and re-provision; errors they
/// return travel back to the feed uncaught.
pub trait ConfigHandler: Send + Sync {
    fn apply(&self, configs: HashMap<String, String>) -> Result<(), SpoolError>;
}

impl<F> ConfigHandler for F
where
    F: Fn(HashMap<String, String>) -> Result<(), SpoolError> + Send + Sync,
{
    fn apply(&self, configs: HashMap<String, String>) -> Result<(), SpoolError> {
        self(configs)
    }
}

/// Subscribe `handler` to the feed under the default `("config",
/// "properties")` identity.
pub fn listen<H>(feed: &dyn ConfigFeed, handler: H)
where
    H: ConfigHandler + 'static,
{
    listen_with(feed, FeedIdentity::default(), handler);
}

/// Subscribe `handler` to the feed under `identity`.
///
/// Each binding carries its own one-shot guard. The very first notification
/// only arms the guard and is discarded without being decoded; every later
/// notification is decoded as a string-to-string map and handed to the
/// handler.
pub fn listen_with<H>(feed: &dyn ConfigFeed, identity: FeedIdentity, handler: H)
where
    H: ConfigHandler + 'static,
{
    let armed = AtomicBool::new(false);

    feed.subscribe(
        identity,
        Box::new(move |payload| {
            // TODO: confirm with the feed owners whether the initial
            // snapshot should be applied rather than discarded.
            if armed
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }

            let configs: HashMap<String, String> = serde_json::from_str(payload)?;
            handler.apply(configs)
        }),
    );
}
