//! Live sessions by id, plus the reaper that closes abandoned ones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use arena_core::{GameStatus, SessionId};
use serde::Serialize;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::session::SessionHandle;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionListing {
    pub id: SessionId,
    pub status: GameStatus,
    pub clients: usize,
    pub engines: usize,
    pub owned_by_match: bool,
}

#[derive(Default)]
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        // The map stays consistent even if a holder panicked.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.lock().insert(handle.id(), handle);
    }

    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.lock().get(&id).cloned()
    }

    pub fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        self.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn list(&self) -> Vec<SessionListing> {
        let mut out: Vec<SessionListing> = self
            .lock()
            .values()
            .map(|h| {
                let s = h.summary();
                SessionListing {
                    id: h.id(),
                    status: s.status,
                    clients: s.clients,
                    engines: s.engines.len(),
                    owned_by_match: s.owned_by_match,
                }
            })
            .collect();
        out.sort_by_key(|l| l.id);
        out
    }

    /// Removes sessions nobody watches, that are not owned by a match and
    /// have been idle for `idle`. A pending engine move keeps a session;
    /// a running analysis does not. Closed sessions always go.
    pub fn collect_idle(&self, idle: Duration, now: Instant) -> Vec<SessionHandle> {
        let mut sessions = self.lock();
        let stale: Vec<SessionId> = sessions
            .values()
            .filter(|h| {
                let s = h.summary();
                h.is_closed()
                    || (s.clients == 0
                        && (!s.searching || s.analyzing)
                        && !s.owned_by_match
                        && now.saturating_duration_since(s.last_activity) >= idle)
            })
            .map(SessionHandle::id)
            .collect();
        stale.iter().filter_map(|id| sessions.remove(id)).collect()
    }

    /// Runs [`Registry::collect_idle`] every `every` until the registry is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, idle: Duration, every: Duration) {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut tick = interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                for handle in registry.collect_idle(idle, Instant::now()) {
                    tracing::info!(session = %handle.id(), "closing idle session");
                    handle.shutdown().await;
                }
            }
        });
    }

    /// Shuts every session down, used on server exit.
    pub async fn shutdown_all(&self) {
        let handles: Vec<SessionHandle> = self.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}
