//! Sink handle registry consumed by the script execution subsystem.
//!
//! Script execution needs a name-to-sink handle for every provisioned
//! channel; provisioning registers here and consumers look handles up by
//! channel name. No consumer lives in this crate.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::rolling::RollingSink;

static HANDLES: once_cell::sync::Lazy<RwLock<HashMap<String, Arc<RollingSink>>>> =
    once_cell::sync::Lazy::new(|| RwLock::new(HashMap::new()));

/// Register (or replace) the sink handle for a channel.
pub fn register(name: &str, sink: Arc<RollingSink>) {
    let mut handles = HANDLES.write().unwrap();
    handles.insert(name.to_string(), sink);
}

/// Look up the sink handle registered for a channel.
pub fn handle(name: &str) -> Option<Arc<RollingSink>> {
    let handles = HANDLES.read().unwrap();
    handles.get(name).cloned()
}

/// Names of every channel with a registered sink handle.
pub fn registered() -> Vec<String> {
    let handles = HANDLES.read().unwrap();
    handles.keys().cloned().collect()
}
