//! Timer snapshot persistence keyed by user identity.

use tracing::warn;

use super::engine::CycleState;
use crate::error::Result;
use crate::identity::namespace;
use crate::storage::KvStore;

/// Fixed namespace prefix for every key this app writes.
pub const KEY_PREFIX: &str = "pausas-activas";

/// The persisted record has the same layout as the live snapshot.
pub type PersistedTimerState = CycleState;

/// `pausas-activas:{user|anonymous}:timer-state`
pub fn timer_state_key(user_id: Option<&str>) -> String {
    format!("{KEY_PREFIX}:{}:timer-state", namespace(user_id))
}

pub struct TimerPersistence<S> {
    store: S,
}

impl<S: KvStore> TimerPersistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn save(&self, user_id: Option<&str>, state: &PersistedTimerState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.store.set(&timer_state_key(user_id), &json)
    }

    /// Missing, unreadable and malformed records all come back as `None`.
    pub fn load(&self, user_id: Option<&str>) -> Option<PersistedTimerState> {
        let key = timer_state_key(user_id);
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(%key, error = %e, "timer snapshot unreadable");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(%key, error = %e, "discarding malformed timer snapshot");
                None
            }
        }
    }

    pub fn clear(&self, user_id: Option<&str>) -> Result<()> {
        self.store.remove(&timer_state_key(user_id))
    }
}
