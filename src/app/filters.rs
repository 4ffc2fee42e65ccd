// src/app/filters.rs — per-kind filter criteria, mirrored to the store
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{load_json, save_json, Hydrated, KeyValueStore};
use crate::api::{CharacterFilters, EpisodeFilters, LocationFilters, QueryFilters, ResourceKind};
use crate::config::FILTERS_KEY;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSnapshot {
    pub character: CharacterFilters,
    pub episode: EpisodeFilters,
    pub location: LocationFilters,
}

impl Default for FilterSnapshot {
    fn default() -> Self {
        Self {
            character: CharacterFilters::initial(),
            episode: EpisodeFilters::initial(),
            location: LocationFilters::initial(),
        }
    }
}

/// Locates one kind's criteria inside a [`FilterSnapshot`].
pub trait FilterSlot: QueryFilters {
    const KIND: ResourceKind;

    fn slot(snapshot: &FilterSnapshot) -> &Self;
    fn slot_mut(snapshot: &mut FilterSnapshot) -> &mut Self;

    /// No constraints, first page.
    fn initial() -> Self {
        Self::default().with_page(1)
    }
}

impl FilterSlot for CharacterFilters {
    const KIND: ResourceKind = ResourceKind::Character;
    fn slot(s: &FilterSnapshot) -> &Self {
        &s.character
    }
    fn slot_mut(s: &mut FilterSnapshot) -> &mut Self {
        &mut s.character
    }
}

impl FilterSlot for EpisodeFilters {
    const KIND: ResourceKind = ResourceKind::Episode;
    fn slot(s: &FilterSnapshot) -> &Self {
        &s.episode
    }
    fn slot_mut(s: &mut FilterSnapshot) -> &mut Self {
        &mut s.episode
    }
}

impl FilterSlot for LocationFilters {
    const KIND: ResourceKind = ResourceKind::Location;
    fn slot(s: &FilterSnapshot) -> &Self {
        &s.location
    }
    fn slot_mut(s: &mut FilterSnapshot) -> &mut Self {
        &mut s.location
    }
}

/// Stored criteria for one kind, merged over the initial value.
/// A kind that fails to decode is skipped with a warning.
fn restore_kind<F: FilterSlot + DeserializeOwned>(
    map: &serde_json::Map<String, serde_json::Value>,
    out: &mut FilterSnapshot,
) {
    let Some(raw) = map.get(F::KIND.as_str()) else {
        return;
    };
    match serde_json::from_value::<F>(raw.clone()) {
        Ok(stored) => F::slot_mut(out).merge(&stored),
        Err(e) => warn!("Ignoring stored {} filters: {e}", F::KIND.as_str()),
    }
}

fn validate_snapshot(value: serde_json::Value) -> Result<FilterSnapshot, String> {
    let serde_json::Value::Object(map) = value else {
        return Err("expected a JSON object keyed by kind".into());
    };
    let mut snap = FilterSnapshot::default();
    restore_kind::<CharacterFilters>(&map, &mut snap);
    restore_kind::<EpisodeFilters>(&map, &mut snap);
    restore_kind::<LocationFilters>(&map, &mut snap);
    Ok(snap)
}

pub struct FilterState {
    snapshot: FilterSnapshot,
    store: Arc<dyn KeyValueStore>,
    hydrated: bool,
    revision: u64,
}

impl FilterState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            snapshot: FilterSnapshot::default(),
            store,
            hydrated: false,
            revision: 0,
        }
    }

    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let mut state = Self::new(store);
        state.hydrate();
        state
    }

    pub fn hydrate(&mut self) -> bool {
        if self.hydrated {
            return false;
        }
        match load_json(self.store.as_ref(), FILTERS_KEY, validate_snapshot) {
            Hydrated::Loaded(snap) => {
                self.snapshot = snap;
                self.revision += 1;
            }
            Hydrated::Missing => debug!("No stored filters"),
            Hydrated::Invalid(reason) => warn!("Ignoring stored filters ({reason})"),
            Hydrated::Unavailable(reason) => {
                warn!("Filter storage unavailable ({reason}); using defaults")
            }
        }
        self.hydrated = true;
        true
    }

    pub fn snapshot(&self) -> &FilterSnapshot {
        &self.snapshot
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get<F: FilterSlot>(&self) -> &F {
        F::slot(&self.snapshot)
    }

    /// Shallow merge into one kind; other kinds are untouched.
    pub fn update<F: FilterSlot>(&mut self, patch: F) {
        self.update_with(|f: &mut F| f.merge(&patch));
    }

    /// For edits a merge can't express, such as unsetting a field.
    pub fn update_with<F: FilterSlot>(&mut self, edit: impl FnOnce(&mut F)) {
        let slot = F::slot_mut(&mut self.snapshot);
        let before = slot.clone();
        edit(slot);
        if *slot != before {
            self.changed();
        }
    }

    pub fn clear<F: FilterSlot>(&mut self) {
        self.update_with(|f: &mut F| *f = F::initial());
    }

    pub fn clear_all(&mut self) {
        if self.snapshot != FilterSnapshot::default() {
            self.snapshot = FilterSnapshot::default();
            self.changed();
        }
    }

    fn changed(&mut self) {
        self.revision += 1;
        if !self.hydrated {
            debug!("Filters not hydrated yet; skipping write");
            return;
        }
        if let Err(e) = save_json(self.store.as_ref(), FILTERS_KEY, &self.snapshot) {
            warn!("Failed to save filters: {e}");
        }
    }
}
