//! Process-wide reporting context
//!
//! Holds the identity facts that enrich crash report tags. Before a server
//! has started there is no identity; once a server registers itself the
//! context carries its identifier plus a couple of counters the server keeps
//! up to date. A newer server instance replaces the identity of an older
//! one, but the context never goes back to having none.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Facts published by a running server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFacts {
    /// Opaque `<8 hex>-<sequence>` identifier of the instance
    pub server_id: String,
    /// Number of stores the instance has open
    pub stores: u64,
    /// Number of client connections currently being served
    pub connections: u64,
}

/// Point-in-time copy of the context, taken under a short read lock.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    /// Tag given to `setup_reporter`, empty until then
    pub process_tag: String,
    /// `None` until a server has registered its identity
    pub server: Option<ServerFacts>,
    /// Time since the context was created
    pub uptime: Duration,
}

#[derive(Debug, Default)]
struct ContextState {
    process_tag: String,
    server: Option<ServerFacts>,
}

/// Registry of identity/lifecycle facts, guarded by a reader-writer lock.
#[derive(Debug)]
pub struct ReportingContext {
    state: RwLock<ContextState>,
    created: Instant,
}

impl ReportingContext {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ContextState::default()),
            created: Instant::now(),
        }
    }

    /// Sets the process tag reported as `cmd`.
    pub fn set_process_tag(&self, tag: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.process_tag = tag.to_string();
    }

    /// Records the identity of a freshly started server instance.
    ///
    /// Counters of any previous instance are discarded. Empty identifiers
    /// are ignored.
    pub fn register_server_identity(&self, id: &str) {
        if id.is_empty() {
            warn!("Ignoring empty server identity");
            return;
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = &state.server {
            debug!(previous = %previous.server_id, server_id = %id, "Replacing server identity");
        }
        state.server = Some(ServerFacts {
            server_id: id.to_string(),
            stores: 0,
            connections: 0,
        });
    }

    /// Updates the store counter of server `server_id`.
    pub fn set_store_count(&self, server_id: &str, stores: u64) {
        self.update_server(server_id, |facts| facts.stores = stores);
    }

    /// Updates the connection counter of server `server_id`.
    pub fn set_connection_count(&self, server_id: &str, connections: u64) {
        self.update_server(server_id, |facts| facts.connections = connections);
    }

    /// Only the most recently registered instance may update the counters;
    /// updates from older instances are dropped.
    fn update_server(&self, server_id: &str, update: impl FnOnce(&mut ServerFacts)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.server.as_mut() {
            Some(facts) if facts.server_id == server_id => update(facts),
            Some(_) => debug!(server_id, "Ignoring counter update from a replaced server"),
            None => debug!(server_id, "No server identity registered; ignoring counter update"),
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        ContextSnapshot {
            process_tag: state.process_tag.clone(),
            server: state.server.clone(),
            uptime: self.created.elapsed(),
        }
    }
}

impl Default for ReportingContext {
    fn default() -> Self {
        Self::new()
    }
}
