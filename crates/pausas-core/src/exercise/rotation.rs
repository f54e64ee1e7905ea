//! Exercise selection for a break, with recent-history avoidance.
//!
//! One exercise is picked per category, preferring ids not shown in the last
//! [`RECENT_WINDOW`] picks. The window is persisted per user so the rotation
//! survives restarts.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use tracing::{debug, warn};

use super::catalog::{Catalog, Exercise, ExerciseCategory};
use crate::error::CoreError;
use crate::identity::namespace;
use crate::storage::KvStore;
use crate::timer::persistence::KEY_PREFIX;

/// Number of recently shown exercise ids kept, most recent first.
pub const RECENT_WINDOW: usize = 8;

/// Exercises per break when the caller has no preference.
pub const DEFAULT_BREAK_EXERCISES: usize = 4;

/// `pausas-activas:{user|anonymous}:recent-exercises`
pub fn recent_exercises_key(user_id: Option<&str>) -> String {
    format!("{KEY_PREFIX}:{}:recent-exercises", namespace(user_id))
}

pub struct ExerciseRotation<S> {
    catalog: Catalog,
    store: S,
    user_id: Option<String>,
    recent: Vec<String>,
    current: Vec<Exercise>,
    cursor: usize,
    rng: Mcg128Xsl64,
}

impl<S: KvStore> ExerciseRotation<S> {
    pub fn new(catalog: Catalog, store: S, user_id: Option<&str>) -> Self {
        Self::with_rng(catalog, store, user_id, Mcg128Xsl64::from_entropy())
    }

    /// Deterministic selection, for tests and simulations.
    pub fn seeded(catalog: Catalog, store: S, user_id: Option<&str>, seed: u64) -> Self {
        Self::with_rng(catalog, store, user_id, Mcg128Xsl64::seed_from_u64(seed))
    }

    fn with_rng(catalog: Catalog, store: S, user_id: Option<&str>, rng: Mcg128Xsl64) -> Self {
        let mut rotation = Self {
            catalog,
            store,
            user_id: user_id.map(str::to_string),
            recent: Vec::new(),
            current: Vec::new(),
            cursor: 0,
            rng,
        };
        rotation.load_recent();
        rotation
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn recent_ids(&self) -> &[String] {
        &self.recent
    }

    pub fn current_break_exercises(&self) -> &[Exercise] {
        &self.current
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.current.get(self.cursor)
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn total_in_break(&self) -> usize {
        self.current.len()
    }

    pub fn is_last_exercise(&self) -> bool {
        self.cursor + 1 >= self.current.len()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Re-point the recent window at another user's history. No-op when the
    /// user did not change.
    pub fn bind_user(&mut self, user_id: Option<&str>) {
        if self.user_id.as_deref() == user_id {
            return;
        }
        self.user_id = user_id.map(str::to_string);
        self.load_recent();
    }

    pub fn select_exercises_for_break(&mut self, count: usize) -> Vec<Exercise> {
        let mut selected: Vec<Exercise> = Vec::with_capacity(count);

        for category in ExerciseCategory::ALL {
            if selected.len() >= count {
                break;
            }
            if let Some(pick) = self.pick_from(category) {
                selected.push(pick);
            }
        }

        selected.shuffle(&mut self.rng);

        let mut recent: Vec<String> = selected.iter().map(|e| e.id.clone()).collect();
        recent.extend(self.recent.drain(..));
        recent.truncate(RECENT_WINDOW);
        self.recent = recent;
        self.save_recent();

        debug!(
            ids = ?selected.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            "selected break exercises"
        );

        self.current = selected.clone();
        self.cursor = 0;
        selected
    }

    /// Move to the next exercise. Returns false (and stays put) at the end.
    pub fn advance_exercise(&mut self) -> bool {
        if self.cursor + 1 < self.current.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Forget the current break's selection. The recent window is kept.
    pub fn reset(&mut self) {
        self.current.clear();
        self.cursor = 0;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn pick_from(&mut self, category: ExerciseCategory) -> Option<Exercise> {
        let fresh: Vec<&Exercise> = self
            .catalog
            .in_category(category)
            .filter(|e| !self.recent.contains(&e.id))
            .collect();
        if let Some(pick) = fresh.choose(&mut self.rng) {
            return Some((*pick).clone());
        }
        let all: Vec<&Exercise> = self.catalog.in_category(category).collect();
        all.choose(&mut self.rng).map(|pick| (*pick).clone())
    }

    fn load_recent(&mut self) {
        let key = recent_exercises_key(self.user_id.as_deref());
        self.recent = match self.store.get(&key) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
                warn!(%key, error = %e, "discarding malformed recent exercises");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(%key, error = %e, "recent exercises unreadable");
                Vec::new()
            }
        };
        self.recent.truncate(RECENT_WINDOW);
    }

    fn save_recent(&self) {
        let key = recent_exercises_key(self.user_id.as_deref());
        let result = serde_json::to_string(&self.recent)
            .map_err(CoreError::from)
            .and_then(|json| self.store.set(&key, &json));
        if let Err(e) = result {
            warn!(%key, error = %e, "could not persist recent exercises");
        }
    }
}
