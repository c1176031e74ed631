use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};
use uuid::Uuid;

use crate::transcript::Transcript;

pub type SessionId = Uuid;

/// Exclusive access to one session's transcript. Holding the lock serializes every operation
/// on that session.
pub type SessionHandle = Arc<tokio::sync::Mutex<Transcript>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub idle_ttl: Duration,
    pub max_turns: Option<usize>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(3600),
            max_turns: None,
        }
    }
}

struct SessionSlot {
    transcript: SessionHandle,
    last_active: Instant,
}

impl SessionSlot {
    /// A handle held outside the store means a request is using or waiting on the session.
    fn is_busy(&self) -> bool {
        Arc::strong_count(&self.transcript) > 1
    }
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, SessionSlot>>>,
    settings: SessionSettings,
}

impl SessionStore {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::default(),
            settings,
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Returns the session for `session_id`, creating it when absent, and marks it active.
    /// `None` always creates a fresh session under a new id.
    pub fn open(&self, session_id: Option<SessionId>) -> (SessionId, SessionHandle) {
        self.open_at(session_id, Instant::now())
    }

    fn open_at(&self, session_id: Option<SessionId>, now: Instant) -> (SessionId, SessionHandle) {
        let session_id = session_id.unwrap_or_else(Uuid::new_v4);
        let mut sessions = self.lock();

        let slot = sessions.entry(session_id).or_insert_with(|| {
            debug!(session_id = %session_id, "chat session created");
            SessionSlot {
                transcript: Arc::new(tokio::sync::Mutex::new(Transcript::with_max_turns(
                    self.settings.max_turns,
                ))),
                last_active: now,
            }
        });
        slot.last_active = now;

        (session_id, Arc::clone(&slot.transcript))
    }

    /// Looks up an existing session without refreshing its idle timer.
    pub fn get(&self, session_id: SessionId) -> Option<SessionHandle> {
        self.lock()
            .get(&session_id)
            .map(|slot| Arc::clone(&slot.transcript))
    }

    pub fn remove(&self, session_id: SessionId) -> bool {
        self.lock().remove(&session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let idle_ttl = self.settings.idle_ttl;
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, slot| {
            slot.is_busy() || now.saturating_duration_since(slot.last_active) < idle_ttl
        });
        before - sessions.len()
    }

    /// Restarts the idle timer of an existing session. Unknown ids are ignored.
    pub fn touch(&self, session_id: SessionId) {
        self.touch_at(session_id, Instant::now());
    }

    fn touch_at(&self, session_id: SessionId, now: Instant) {
        if let Some(slot) = self.lock().get_mut(&session_id) {
            slot.last_active = now;
        }
    }

    pub fn spawn_purger(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    info!(
                        purged,
                        remaining = store.len(),
                        "expired chat sessions purged"
                    );
                } else {
                    debug!(remaining = store.len(), "chat session purge found nothing idle");
                }
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionSlot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
